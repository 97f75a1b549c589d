//! FFT analysis for complex baseband blocks
//!
//! Provides the spectrum view's frequency domain computation:
//! - Window functions (Hann, Hamming, Blackman)
//! - Centered power spectrum in dB for complex input
//! - Peak lookup and bin to frequency mapping

use crate::types::Complex32;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Floor applied to empty bins before taking the logarithm
const POWER_FLOOR_DB: f32 = -200.0;

/// Window function type for FFT preprocessing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowFunction {
    /// Rectangular window (no windowing)
    Rectangular,
    /// Hann window (good general purpose)
    #[default]
    Hann,
    /// Hamming window (reduced side lobes)
    Hamming,
    /// Blackman window (very low side lobes)
    Blackman,
}

impl WindowFunction {
    pub fn display_name(&self) -> &'static str {
        match self {
            WindowFunction::Rectangular => "Rectangular",
            WindowFunction::Hann => "Hann",
            WindowFunction::Hamming => "Hamming",
            WindowFunction::Blackman => "Blackman",
        }
    }

    pub fn all() -> &'static [WindowFunction] {
        &[
            WindowFunction::Rectangular,
            WindowFunction::Hann,
            WindowFunction::Hamming,
            WindowFunction::Blackman,
        ]
    }

    /// Compute window coefficient at position i out of n samples
    pub fn coefficient(&self, i: usize, n: usize) -> f32 {
        let n_f = n as f32;
        let i_f = i as f32;

        match self {
            WindowFunction::Rectangular => 1.0,
            WindowFunction::Hann => 0.5 * (1.0 - (2.0 * PI * i_f / n_f).cos()),
            WindowFunction::Hamming => 0.54 - 0.46 * (2.0 * PI * i_f / n_f).cos(),
            WindowFunction::Blackman => {
                // Exactly 0 at the endpoints; rounding can produce -eps.
                (0.42 - 0.5 * (2.0 * PI * i_f / n_f).cos() + 0.08 * (4.0 * PI * i_f / n_f).cos())
                    .max(0.0)
            }
        }
    }

    /// Generate window coefficients for n samples
    pub fn generate(&self, n: usize) -> Vec<f32> {
        (0..n).map(|i| self.coefficient(i, n)).collect()
    }
}

/// One computed spectrum, centered on DC.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    /// Power per bin in dB, bin 0 = -sample_rate/2
    pub bins_db: Vec<f32>,
    /// Sample rate of the analysed block
    pub sample_rate: f64,
}

impl SpectrumFrame {
    /// Frequency resolution (Hz per bin)
    pub fn resolution(&self) -> f64 {
        if self.bins_db.is_empty() {
            0.0
        } else {
            self.sample_rate / self.bins_db.len() as f64
        }
    }

    /// Baseband frequency of `bin`, relative to the center of the band
    pub fn frequency_at(&self, bin: usize) -> Option<f64> {
        if bin >= self.bins_db.len() {
            return None;
        }
        let half = (self.bins_db.len() / 2) as f64;
        Some((bin as f64 - half) * self.resolution())
    }

    /// Strongest bin as (baseband frequency, dB)
    pub fn peak(&self) -> Option<(f64, f32)> {
        let (idx, &db) = self
            .bins_db
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))?;
        Some((self.frequency_at(idx)?, db))
    }
}

/// FFT analyzer for fixed-size complex blocks
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    /// Sum of squared window coefficients, for power normalization
    window_power: f32,
    scratch: Vec<Complex32>,
}

impl SpectrumAnalyzer {
    pub fn new(fft_size: usize, window: WindowFunction) -> Self {
        let fft_size = fft_size.max(2);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let window = window.generate(fft_size);
        let window_power = window.iter().map(|w| w * w).sum::<f32>().max(f32::MIN_POSITIVE);
        Self {
            fft,
            window,
            window_power,
            scratch: Vec::with_capacity(fft_size),
        }
    }

    pub fn fft_size(&self) -> usize {
        self.window.len()
    }

    /// Compute the centered dB spectrum of `block`.
    ///
    /// `block` shorter than the FFT size is zero-padded; longer input is
    /// truncated.
    pub fn compute(&mut self, block: &[Complex32], sample_rate: f64) -> SpectrumFrame {
        let n = self.fft_size();
        self.scratch.clear();
        self.scratch.extend(
            block
                .iter()
                .take(n)
                .zip(&self.window)
                .map(|(s, w)| *s * *w),
        );
        self.scratch.resize(n, Complex32::new(0.0, 0.0));

        self.fft.process(&mut self.scratch);

        // fftshift: negative frequencies first
        let half = n / 2;
        let bins_db = self.scratch[half..]
            .iter()
            .chain(&self.scratch[..half])
            .map(|c| {
                let power = c.norm_sqr() / self.window_power;
                if power > 0.0 {
                    10.0 * power.log10()
                } else {
                    POWER_FLOOR_DB
                }
            })
            .collect();

        SpectrumFrame {
            bins_db,
            sample_rate,
        }
    }
}
