//! Monitoring display sinks.
//!
//! Each display keeps only its newest result behind a [`Latest`] handle that
//! the control surface reads without touching the flowgraph lock.

use crate::analysis::{SpectrumAnalyzer, SpectrumFrame, WindowFunction};
use crate::pipeline::buffer::ConfigValue;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::node::{NodeContext, NodePlugin};
use crate::pipeline::port::{ItemType, PortDescriptor};
use crate::sync::lock_or_recover;
use crate::types::Complex32;
use std::sync::{Arc, Mutex};

static COMPLEX_IN: &[PortDescriptor] = &[PortDescriptor::input("in", ItemType::Complex)];
static FLOAT_IN: &[PortDescriptor] = &[PortDescriptor::input("in", ItemType::Float)];

/// Newest value published by a display; no history.
#[derive(Debug)]
pub struct Latest<T> {
    inner: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for Latest<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Latest<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }
}

impl<T: Clone> Latest<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: T) {
        *lock_or_recover(&self.inner, "display value") = Some(value);
    }

    pub fn get(&self) -> Option<T> {
        lock_or_recover(&self.inner, "display value").clone()
    }

    pub fn clear(&self) {
        *lock_or_recover(&self.inner, "display value") = None;
    }
}

// ─── Spectrum ───

/// Accumulates mixer output into FFT frames and keeps the newest spectrum.
pub struct SpectrumDisplayNode {
    analyzer: SpectrumAnalyzer,
    sample_rate: f64,
    pending: Vec<Complex32>,
    latest: Latest<SpectrumFrame>,
    frames: u64,
}

impl SpectrumDisplayNode {
    pub fn new(fft_size: usize, sample_rate: f64) -> Self {
        let analyzer = SpectrumAnalyzer::new(fft_size, WindowFunction::Hann);
        let capacity = analyzer.fft_size() * 2;
        Self {
            analyzer,
            sample_rate,
            pending: Vec::with_capacity(capacity),
            latest: Latest::new(),
            frames: 0,
        }
    }

    pub fn handle(&self) -> Latest<SpectrumFrame> {
        self.latest.clone()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl NodePlugin for SpectrumDisplayNode {
    fn name(&self) -> &str {
        "Spectrum"
    }

    fn ports(&self) -> &[PortDescriptor] {
        COMPLEX_IN
    }

    fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        let input = ctx.complex_input(0)?;
        self.pending.extend_from_slice(input);

        let n = self.analyzer.fft_size();
        let mut newest = None;
        while self.pending.len() >= n {
            newest = Some(self.analyzer.compute(&self.pending[..n], self.sample_rate));
            self.pending.drain(..n);
            self.frames += 1;
        }
        if let Some(frame) = newest {
            self.latest.set(frame);
        }
        Ok(())
    }

    fn on_deactivate(&mut self, _ctx: &mut NodeContext) {
        self.pending.clear();
    }

    fn on_config_change(&mut self, key: &str, value: &ConfigValue, _ctx: &mut NodeContext) {
        if let ("sample_rate", Some(rate)) = (key, value.as_float()) {
            self.sample_rate = rate;
        }
    }
}

// ─── Constellation ───

/// Keeps the newest block of symbol points.
pub struct ConstellationDisplayNode {
    capacity: usize,
    latest: Latest<Vec<Complex32>>,
}

impl ConstellationDisplayNode {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            latest: Latest::new(),
        }
    }

    pub fn handle(&self) -> Latest<Vec<Complex32>> {
        self.latest.clone()
    }
}

impl NodePlugin for ConstellationDisplayNode {
    fn name(&self) -> &str {
        "Constellation"
    }

    fn ports(&self) -> &[PortDescriptor] {
        COMPLEX_IN
    }

    fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        let input = ctx.complex_input(0)?;
        if !input.is_empty() {
            let start = input.len().saturating_sub(self.capacity);
            self.latest.set(input[start..].to_vec());
        }
        Ok(())
    }
}

// ─── Numeric readout ───

/// Keeps the newest scalar of each block.
pub struct NumberDisplayNode {
    name: &'static str,
    latest: Latest<f32>,
}

impl NumberDisplayNode {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            latest: Latest::new(),
        }
    }

    pub fn handle(&self) -> Latest<f32> {
        self.latest.clone()
    }
}

impl NodePlugin for NumberDisplayNode {
    fn name(&self) -> &str {
        self.name
    }

    fn ports(&self) -> &[PortDescriptor] {
        FLOAT_IN
    }

    fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        if let Some(&value) = ctx.float_input(0)?.last() {
            self.latest.set(value);
        }
        Ok(())
    }
}
