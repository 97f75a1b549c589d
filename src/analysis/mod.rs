//! Analysis module for signal processing
//!
//! This module provides the spectrum computation used by the spectrum view:
//! - Windowed FFT of complex baseband blocks
//! - Power spectral density in dB
//! - Peak detection

pub mod fft;

pub use fft::{SpectrumAnalyzer, SpectrumFrame, WindowFunction};
