//! MixerNode - shifts the intermediate channel down to baseband.
//!
//! Multiplies every input sample by a complex exponential from the local
//! oscillator. The coordinator sets the oscillator to `-carrier_offset` so the
//! channel the front end was tuned below lands at 0 Hz.

use crate::pipeline::buffer::ConfigValue;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::node::{NodeContext, NodePlugin};
use crate::pipeline::port::{ItemType, PortDescriptor};
use crate::types::Complex32;
use std::f64::consts::TAU;

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in", ItemType::Complex),
    PortDescriptor::output("out", ItemType::Complex),
];

/// Numerically controlled oscillator with f64 phase accumulation.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalOscillator {
    frequency: f64,
    sample_rate: f64,
    phase: f64,
    phase_step: f64,
}

impl LocalOscillator {
    pub fn new(frequency: f64, sample_rate: f64) -> Self {
        let mut lo = Self {
            frequency,
            sample_rate,
            phase: 0.0,
            phase_step: 0.0,
        };
        lo.update_step();
        lo
    }

    fn update_step(&mut self) {
        self.phase_step = if self.sample_rate > 0.0 {
            TAU * self.frequency / self.sample_rate
        } else {
            0.0
        };
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Phase stays continuous across frequency changes.
    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
        self.update_step();
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.update_step();
    }

    /// Write `input * lo` into `out` (appending).
    pub fn mix(&mut self, input: &[Complex32], out: &mut Vec<Complex32>) {
        out.reserve(input.len());
        for s in input {
            let (sin, cos) = self.phase.sin_cos();
            out.push(*s * Complex32::new(cos as f32, sin as f32));
            self.phase = (self.phase + self.phase_step).rem_euclid(TAU);
        }
    }
}

pub struct MixerNode {
    lo: LocalOscillator,
}

impl MixerNode {
    pub fn new(frequency: f64, sample_rate: f64) -> Self {
        Self {
            lo: LocalOscillator::new(frequency, sample_rate),
        }
    }

    pub fn oscillator(&self) -> &LocalOscillator {
        &self.lo
    }
}

impl NodePlugin for MixerNode {
    fn name(&self) -> &str {
        "Mixer"
    }

    fn ports(&self) -> &[PortDescriptor] {
        PORTS
    }

    fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        let input = ctx.complex_input(0)?;
        let out = ctx.complex_output(0)?;
        self.lo.mix(input, out);
        Ok(())
    }

    fn on_config_change(&mut self, key: &str, value: &ConfigValue, _ctx: &mut NodeContext) {
        match (key, value.as_float()) {
            ("frequency", Some(f)) => self.lo.set_frequency(f),
            ("sample_rate", Some(r)) if r > 0.0 => self.lo.set_sample_rate(r),
            _ => tracing::debug!("Mixer ignoring config key '{}'", key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f64, rate: f64, n: usize) -> Vec<Complex32> {
        (0..n)
            .map(|i| {
                let p = TAU * freq * i as f64 / rate;
                Complex32::new(p.cos() as f32, p.sin() as f32)
            })
            .collect()
    }

    #[test]
    fn test_shifts_offset_tone_to_dc() {
        let rate = 1_000_000.0;
        let input = tone(25_000.0, rate, 2000);
        let mut lo = LocalOscillator::new(-25_000.0, rate);
        let mut out = Vec::new();
        lo.mix(&input, &mut out);

        // DC: consecutive samples have no phase rotation
        for pair in out.windows(2).skip(1000) {
            let step = (pair[1] * pair[0].conj()).arg();
            assert!(step.abs() < 1e-3, "residual rotation {}", step);
        }
    }

    #[test]
    fn test_phase_continuous_across_blocks() {
        let rate = 1_000_000.0;
        let input = tone(0.0, rate, 100);
        let mut split = LocalOscillator::new(10_000.0, rate);
        let mut whole = split.clone();

        let mut a = Vec::new();
        split.mix(&input[..40], &mut a);
        split.mix(&input[40..], &mut a);
        let mut b = Vec::new();
        whole.mix(&input, &mut b);

        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).norm() < 1e-5);
        }
    }

    #[test]
    fn test_config_keys() {
        let mut node = MixerNode::new(-25_000.0, 1_000_000.0);
        let mut ctx = NodeContext {
            node_id: crate::pipeline::id::NodeId(1),
            inputs: &[],
            outputs: &mut [],
            tick: 0,
        };
        node.on_config_change("frequency", &ConfigValue::Float(-250_000.0), &mut ctx);
        node.on_config_change("sample_rate", &ConfigValue::Int(2_000_000), &mut ctx);
        node.on_config_change("sample_rate", &ConfigValue::Float(0.0), &mut ctx);
        assert_eq!(node.oscillator().frequency(), -250_000.0);
        assert_eq!(node.oscillator().sample_rate(), 2_000_000.0);
    }
}
