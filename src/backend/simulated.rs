//! Simulated front end for tests and demos
//!
//! Generates I/Q samples for a configurable set of RF carriers plus noise,
//! as a real receiver tuned to the current center frequency would see them.
//! Every setter is recorded so tests can inspect what the engine asked the
//! hardware to do.
//!
//! # Example
//!
//! ```ignore
//! use demod_engine::backend::{SimulatedFrontEnd, SimulatedCarrier};
//!
//! let fe = SimulatedFrontEnd::new()
//!     .with_carrier(SimulatedCarrier::tone(434_000_000.0, 0.5))
//!     .with_noise(0.01);
//! ```

use crate::backend::front_end::FrontEnd;
use crate::error::{DemodError, Result};
use crate::types::{Complex32, GainRange};
use std::f64::consts::TAU;
use std::sync::{Arc, Mutex};

/// Modulation applied to a simulated carrier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CarrierModulation {
    /// Unmodulated carrier
    Tone,
    /// Frequency modulation by a sine tone
    Fm { deviation: f64, tone: f64 },
    /// Alternating-phase BPSK at the given symbol rate
    Bpsk { symbol_rate: f64 },
}

/// A transmitter seen by the simulated receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedCarrier {
    /// Absolute RF frequency in Hz
    pub frequency: f64,
    /// Linear amplitude at 0 dB gain
    pub amplitude: f64,
    pub modulation: CarrierModulation,
}

impl SimulatedCarrier {
    pub fn tone(frequency: f64, amplitude: f64) -> Self {
        Self {
            frequency,
            amplitude,
            modulation: CarrierModulation::Tone,
        }
    }

    pub fn with_modulation(mut self, modulation: CarrierModulation) -> Self {
        self.modulation = modulation;
        self
    }
}

/// Everything the engine asked the simulated hardware to do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulatedSettings {
    pub center_freq: f64,
    pub sample_rate: f64,
    pub bandwidth: f64,
    pub freq_corr: i32,
    pub antenna: String,
    pub automatic_gain: bool,
    pub gain: f64,
    /// Every frequency passed to `set_center_freq`, in order
    pub tune_history: Vec<f64>,
    /// Total samples produced
    pub samples_read: u64,
}

/// Simulated receiver front end.
#[derive(Debug)]
pub struct SimulatedFrontEnd {
    carriers: Vec<SimulatedCarrier>,
    noise_amplitude: f64,
    gain_range: GainRange,
    settings: Arc<Mutex<SimulatedSettings>>,
    /// Running sample index, used as the time base
    sample_index: u64,
    noise_seed: u64,
    /// Fail reads after this many samples (fault injection)
    fail_after: Option<u64>,
}

impl Default for SimulatedFrontEnd {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedFrontEnd {
    pub fn new() -> Self {
        Self {
            carriers: Vec::new(),
            noise_amplitude: 0.0,
            gain_range: GainRange::new(0.0, 70.0),
            settings: Arc::new(Mutex::new(SimulatedSettings {
                sample_rate: 1_000_000.0,
                ..Default::default()
            })),
            sample_index: 0,
            noise_seed: 0x2545_F491_4F6C_DD1D,
            fail_after: None,
        }
    }

    /// Add a transmitter
    pub fn with_carrier(mut self, carrier: SimulatedCarrier) -> Self {
        self.carriers.push(carrier);
        self
    }

    /// Add white noise of the given amplitude
    pub fn with_noise(mut self, amplitude: f64) -> Self {
        self.noise_amplitude = amplitude;
        self
    }

    /// Override the reported gain range
    pub fn with_gain_range(mut self, range: GainRange) -> Self {
        self.gain_range = range;
        self
    }

    /// Make `read_samples` fail once `samples` samples have been produced
    pub fn fail_after(mut self, samples: u64) -> Self {
        self.fail_after = Some(samples);
        self
    }

    /// Handle for inspecting the applied settings from another thread
    pub fn settings_handle(&self) -> Arc<Mutex<SimulatedSettings>> {
        Arc::clone(&self.settings)
    }

    fn with_settings<R>(&self, f: impl FnOnce(&mut SimulatedSettings) -> R) -> R {
        let mut guard = crate::sync::lock_or_recover(&self.settings, "simulated settings");
        f(&mut guard)
    }

    /// xorshift64, mapped to [-1, 1)
    fn next_noise(&mut self) -> f64 {
        let mut s = self.noise_seed;
        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;
        self.noise_seed = s;
        (s as f64) / (u64::MAX as f64) * 2.0 - 1.0
    }

    fn carrier_phase(carrier: &SimulatedCarrier, offset_hz: f64, t: f64) -> f64 {
        let base = TAU * offset_hz * t;
        match carrier.modulation {
            CarrierModulation::Tone => base,
            CarrierModulation::Fm { deviation, tone } => {
                base + (deviation / tone) * (TAU * tone * t).sin()
            }
            CarrierModulation::Bpsk { symbol_rate } => {
                let symbol = (t * symbol_rate) as u64;
                if symbol % 2 == 0 {
                    base
                } else {
                    base + std::f64::consts::PI
                }
            }
        }
    }
}

impl FrontEnd for SimulatedFrontEnd {
    fn set_center_freq(&mut self, hz: f64) -> Result<f64> {
        self.with_settings(|s| {
            s.center_freq = hz;
            s.tune_history.push(hz);
        });
        Ok(hz)
    }

    fn center_freq(&self) -> f64 {
        self.with_settings(|s| s.center_freq)
    }

    fn set_sample_rate(&mut self, rate: f64) -> Result<()> {
        if rate <= 0.0 {
            return Err(DemodError::FrontEnd(format!("invalid sample rate {}", rate)));
        }
        self.with_settings(|s| s.sample_rate = rate);
        Ok(())
    }

    fn sample_rate(&self) -> f64 {
        self.with_settings(|s| s.sample_rate)
    }

    fn set_bandwidth(&mut self, hz: f64) -> Result<()> {
        self.with_settings(|s| s.bandwidth = hz);
        Ok(())
    }

    fn set_freq_corr(&mut self, ppm: i32) -> Result<()> {
        self.with_settings(|s| s.freq_corr = ppm);
        Ok(())
    }

    fn set_antenna(&mut self, name: &str) -> Result<()> {
        self.with_settings(|s| s.antenna = name.to_string());
        Ok(())
    }

    fn gain_range(&self) -> GainRange {
        self.gain_range
    }

    fn set_gain_mode(&mut self, automatic: bool) -> Result<()> {
        self.with_settings(|s| s.automatic_gain = automatic);
        Ok(())
    }

    fn set_gain(&mut self, gain: f64) -> Result<f64> {
        let clamped = gain.clamp(self.gain_range.start, self.gain_range.stop);
        self.with_settings(|s| s.gain = clamped);
        Ok(clamped)
    }

    fn read_samples(&mut self, buf: &mut [Complex32]) -> Result<usize> {
        if let Some(limit) = self.fail_after {
            if self.sample_index >= limit {
                return Err(DemodError::FrontEnd("simulated device lost".to_string()));
            }
        }

        let (center, rate, gain_db, agc) =
            self.with_settings(|s| (s.center_freq, s.sample_rate, s.gain, s.automatic_gain));
        let gain = if agc {
            1.0
        } else {
            10f64.powf(gain_db / 20.0) / 10f64.powf(self.gain_range.stop / 20.0)
        };

        let carriers = self.carriers.clone();
        for out in buf.iter_mut() {
            let t = self.sample_index as f64 / rate;
            let mut re = 0.0;
            let mut im = 0.0;
            for c in &carriers {
                let phase = Self::carrier_phase(c, c.frequency - center, t);
                re += c.amplitude * phase.cos();
                im += c.amplitude * phase.sin();
            }
            if self.noise_amplitude > 0.0 {
                re += self.noise_amplitude * self.next_noise();
                im += self.noise_amplitude * self.next_noise();
            }
            *out = Complex32::new((re * gain) as f32, (im * gain) as f32);
            self.sample_index += 1;
        }

        let produced = buf.len();
        self.with_settings(|s| s.samples_read += produced as u64);
        Ok(produced)
    }
}
