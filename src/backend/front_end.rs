//! FrontEnd trait for the tunable receiver hardware
//!
//! This module provides a common trait for all receiver front ends,
//! enabling both real hardware drivers and the simulated device used in
//! tests and demos. Implementations must be `Send` so the processing thread
//! can pull samples while the control thread retunes.

use crate::config::FrontEndConfig;
use crate::error::Result;
use crate::sync::lock_or_recover;
use crate::types::{Complex32, GainRange, GainSetting};
use std::sync::{Arc, Mutex};

/// Unified interface for receiver front ends
///
/// # Example
///
/// ```ignore
/// fn retune(front_end: &mut dyn FrontEnd, center: f64) -> Result<()> {
///     front_end.set_center_freq(center)?;
///     Ok(())
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait FrontEnd: Send {
    /// Tune the hardware. Returns the frequency actually set.
    fn set_center_freq(&mut self, hz: f64) -> Result<f64>;

    /// Frequency the hardware is currently tuned to
    fn center_freq(&self) -> f64;

    /// Set the ADC sample rate
    fn set_sample_rate(&mut self, rate: f64) -> Result<()>;

    /// Current ADC sample rate
    fn sample_rate(&self) -> f64;

    /// Set the analog filter bandwidth
    fn set_bandwidth(&mut self, hz: f64) -> Result<()>;

    /// Set the reference frequency correction in ppm
    fn set_freq_corr(&mut self, ppm: i32) -> Result<()>;

    /// Select the antenna port
    fn set_antenna(&mut self, name: &str) -> Result<()>;

    /// Gain range reported by the driver
    fn gain_range(&self) -> GainRange;

    /// Switch between hardware AGC (`true`) and manual gain (`false`)
    fn set_gain_mode(&mut self, automatic: bool) -> Result<()>;

    /// Set an explicit gain in dB. Returns the gain actually set.
    fn set_gain(&mut self, gain: f64) -> Result<f64>;

    /// Fill `buf` with samples. Returns the number of samples written.
    ///
    /// Real drivers block until data is available.
    fn read_samples(&mut self, buf: &mut [Complex32]) -> Result<usize>;
}

/// Front end shared between the source node and the control surface.
///
/// Holding the lock for the duration of one block read makes every
/// frequency or gain change land between blocks.
pub type SharedFrontEnd = Arc<Mutex<Box<dyn FrontEnd>>>;

/// Wrap a front end for sharing.
pub fn share(front_end: Box<dyn FrontEnd>) -> SharedFrontEnd {
    Arc::new(Mutex::new(front_end))
}

/// Apply a logical gain in `[0, 1]`.
///
/// A degenerate hardware range falls back to automatic gain; that is
/// logged, never reported as a failure.
pub fn apply_logical_gain(front_end: &mut dyn FrontEnd, value: f32) -> Result<GainSetting> {
    let range = front_end.gain_range();
    match range.map_logical(value) {
        Some(gain) => {
            front_end.set_gain_mode(false)?;
            let actual = front_end.set_gain(gain)?;
            tracing::debug!("Gain {:.3} -> {:.1} dB (range {:?})", value, actual, range);
            Ok(GainSetting::Manual(actual))
        }
        None => {
            tracing::warn!(
                "Front end reported a degenerate gain range {:?}; using automatic gain",
                range
            );
            front_end.set_gain_mode(true)?;
            Ok(GainSetting::Automatic)
        }
    }
}

/// One-time hardware setup performed at construction.
pub fn initialize(
    front_end: &SharedFrontEnd,
    config: &FrontEndConfig,
    device_frequency: i64,
) -> Result<GainSetting> {
    let mut fe = lock_or_recover(front_end, "front end");
    fe.set_center_freq(device_frequency as f64)?;
    fe.set_bandwidth(f64::from(config.bandwidth))?;
    fe.set_sample_rate(f64::from(config.sample_rate))?;
    fe.set_freq_corr(config.freq_corr)?;
    fe.set_gain_mode(false)?;
    fe.set_antenna(&config.antenna)?;
    let gain = apply_logical_gain(fe.as_mut(), config.rf_gain)?;

    tracing::info!(
        "Front end '{}' initialized: {} Hz, {} S/s, antenna {}, gain {:?}",
        config.device_args,
        device_frequency,
        config.sample_rate,
        config.antenna,
        gain
    );
    Ok(gain)
}
