//! Core value types shared across the engine.
//!
//! - [`Complex32`] - baseband I/Q sample
//! - [`GainRange`] - hardware-reported gain range and the logical 0..1 mapping
//! - [`EngineStatus`] - serializable snapshot of the pipeline state

use crate::demod::Mode;
use serde::{Deserialize, Serialize};

/// Complex baseband sample.
pub type Complex32 = rustfft::num_complex::Complex<f32>;

/// Gain range reported by a front-end driver, in dB.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainRange {
    /// Lowest settable gain
    pub start: f64,
    /// Highest settable gain
    pub stop: f64,
}

impl GainRange {
    pub fn new(start: f64, stop: f64) -> Self {
        Self { start, stop }
    }

    /// A range reporting no settable gain at all.
    pub fn empty() -> Self {
        Self {
            start: 0.0,
            stop: 0.0,
        }
    }

    /// True when the range cannot be used for an explicit gain setting.
    ///
    /// Covers drivers that report nothing (`start == stop`), reversed bounds
    /// and non-finite values.
    pub fn is_degenerate(&self) -> bool {
        !self.start.is_finite() || !self.stop.is_finite() || self.stop <= self.start
    }

    /// Map a logical gain in `[0, 1]` onto the range.
    ///
    /// Returns `None` for a degenerate range. Out-of-range inputs are clamped.
    pub fn map_logical(&self, value: f32) -> Option<f64> {
        if self.is_degenerate() {
            return None;
        }
        let v = if value.is_nan() {
            0.0
        } else {
            f64::from(value.clamp(0.0, 1.0))
        };
        Some(self.start + v * (self.stop - self.start))
    }
}

/// How the front end is currently applying gain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GainSetting {
    /// Explicit gain in dB
    Manual(f64),
    /// Hardware AGC
    Automatic,
}

/// Snapshot of the pipeline for status displays and logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    /// Active mode, `None` until the first `set_mode`
    pub mode: Option<Mode>,
    /// Intermediate channel offset in Hz
    pub carrier_offset: i64,
    /// Frequency requested by the user
    pub desired_frequency: i64,
    /// Frequency the hardware is tuned to
    pub device_frequency: i64,
    /// Spectrum tap state
    pub fft_enabled: bool,
    /// Constellation/RSSI tap state
    pub const_enabled: bool,
    /// Most recent RSSI reading in dB
    pub rssi: Option<f32>,
    /// Whether the processing thread is running
    pub running: bool,
    /// Blocks processed since construction
    pub blocks_processed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_gain_mapping_endpoints() {
        let range = GainRange::new(0.0, 76.0);
        assert_eq!(range.map_logical(0.0), Some(0.0));
        assert_eq!(range.map_logical(1.0), Some(76.0));
        assert_eq!(range.map_logical(0.5), Some(38.0));
    }

    #[test]
    fn test_degenerate_ranges() {
        assert!(GainRange::empty().is_degenerate());
        assert!(GainRange::new(10.0, 5.0).is_degenerate());
        assert!(GainRange::new(f64::NAN, 5.0).is_degenerate());
        assert_eq!(GainRange::empty().map_logical(0.5), None);
    }

    #[test]
    fn test_out_of_range_inputs_clamped() {
        let range = GainRange::new(-10.0, 30.0);
        assert_eq!(range.map_logical(-1.0), Some(-10.0));
        assert_eq!(range.map_logical(7.0), Some(30.0));
        assert_eq!(range.map_logical(f32::NAN), Some(-10.0));
    }

    proptest! {
        #[test]
        fn test_mapped_gain_stays_in_range(
            start in -50.0f64..50.0,
            width in 0.1f64..100.0,
            value in 0.0f32..=1.0
        ) {
            let range = GainRange::new(start, start + width);
            let gain = range.map_logical(value).unwrap();
            prop_assert!(gain >= range.start - 1e-9);
            prop_assert!(gain <= range.stop + 1e-9);
        }
    }
}
