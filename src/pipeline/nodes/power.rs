//! Power estimation stages.
//!
//! The RSSI chain is built from these fixed stages:
//!
//! ```text
//! |x|^2 -> moving sum -> single-pole IIR -> log10 -> scale + offset -> readout
//! ```
//!
//! The additive offset of the last stage is the mode-dependent calibration
//! constant, updated through the `offset` config key.

use crate::pipeline::buffer::ConfigValue;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::node::{NodeContext, NodePlugin};
use crate::pipeline::port::{ItemType, PortDescriptor};
use std::collections::VecDeque;

static COMPLEX_TO_FLOAT: &[PortDescriptor] = &[
    PortDescriptor::input("in", ItemType::Complex),
    PortDescriptor::output("out", ItemType::Float),
];

static FLOAT_TO_FLOAT: &[PortDescriptor] = &[
    PortDescriptor::input("in", ItemType::Float),
    PortDescriptor::output("out", ItemType::Float),
];

/// Running sums are recomputed exactly this often to bound float drift.
const RESUM_INTERVAL: usize = 1 << 16;

// ─── Magnitude squared ───

pub struct MagSquaredNode;

impl NodePlugin for MagSquaredNode {
    fn name(&self) -> &str {
        "MagSquared"
    }

    fn ports(&self) -> &[PortDescriptor] {
        COMPLEX_TO_FLOAT
    }

    fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        let input = ctx.complex_input(0)?;
        let out = ctx.float_output(0)?;
        out.extend(input.iter().map(|s| s.norm_sqr()));
        Ok(())
    }
}

// ─── Moving average ───

/// Windowed sum over the last `length` samples, multiplied by `scale`.
///
/// With `scale = 1 / length` this is a true moving average; the RSSI chain
/// runs it with `scale = 1`.
pub struct MovingAverageNode {
    length: usize,
    scale: f32,
    history: VecDeque<f32>,
    sum: f64,
    since_resum: usize,
}

impl MovingAverageNode {
    pub fn new(length: usize, scale: f32) -> Self {
        let length = length.max(1);
        Self {
            length,
            scale,
            history: VecDeque::with_capacity(length),
            sum: 0.0,
            since_resum: 0,
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    fn push(&mut self, x: f32) -> f32 {
        self.history.push_back(x);
        self.sum += f64::from(x);
        if self.history.len() > self.length {
            if let Some(old) = self.history.pop_front() {
                self.sum -= f64::from(old);
            }
        }

        self.since_resum += 1;
        if self.since_resum >= RESUM_INTERVAL {
            self.sum = self.history.iter().map(|v| f64::from(*v)).sum();
            self.since_resum = 0;
        }

        (self.sum as f32) * self.scale
    }

    fn reset(&mut self) {
        self.history.clear();
        self.sum = 0.0;
        self.since_resum = 0;
    }
}

impl NodePlugin for MovingAverageNode {
    fn name(&self) -> &str {
        "MovingAverage"
    }

    fn ports(&self) -> &[PortDescriptor] {
        FLOAT_TO_FLOAT
    }

    fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        let input = ctx.float_input(0)?;
        let out = ctx.float_output(0)?;
        out.reserve(input.len());
        for &x in input {
            let y = self.push(x);
            out.push(y);
        }
        Ok(())
    }

    fn on_config_change(&mut self, key: &str, value: &ConfigValue, _ctx: &mut NodeContext) {
        match (key, value) {
            ("length", ConfigValue::Int(n)) if *n > 0 => {
                self.length = *n as usize;
                self.reset();
            }
            ("scale", v) => {
                if let Some(s) = v.as_float() {
                    self.scale = s as f32;
                }
            }
            _ => {}
        }
    }
}

// ─── Single-pole IIR ───

/// `y[n] = alpha * x[n] + (1 - alpha) * y[n-1]`
pub struct SinglePoleIirNode {
    alpha: f32,
    prev: f32,
}

impl SinglePoleIirNode {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            prev: 0.0,
        }
    }
}

impl NodePlugin for SinglePoleIirNode {
    fn name(&self) -> &str {
        "SinglePoleIir"
    }

    fn ports(&self) -> &[PortDescriptor] {
        FLOAT_TO_FLOAT
    }

    fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        let input = ctx.float_input(0)?;
        let out = ctx.float_output(0)?;
        out.reserve(input.len());
        for &x in input {
            self.prev = self.alpha * x + (1.0 - self.alpha) * self.prev;
            out.push(self.prev);
        }
        Ok(())
    }

    fn on_config_change(&mut self, key: &str, value: &ConfigValue, _ctx: &mut NodeContext) {
        if let ("alpha", Some(a)) = (key, value.as_float()) {
            self.alpha = (a as f32).clamp(0.0, 1.0);
        }
    }
}

// ─── log10 ───

/// `log10(x)`, with non-positive input clamped to the smallest positive float.
pub struct Log10Node;

impl NodePlugin for Log10Node {
    fn name(&self) -> &str {
        "Log10"
    }

    fn ports(&self) -> &[PortDescriptor] {
        FLOAT_TO_FLOAT
    }

    fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        let input = ctx.float_input(0)?;
        let out = ctx.float_output(0)?;
        out.extend(input.iter().map(|x| x.max(f32::MIN_POSITIVE).log10()));
        Ok(())
    }
}

// ─── Scale and offset ───

/// `y = scale * x + offset`
pub struct ScaleOffsetNode {
    scale: f32,
    offset: f32,
}

impl ScaleOffsetNode {
    pub fn new(scale: f32, offset: f32) -> Self {
        Self { scale, offset }
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }
}

impl NodePlugin for ScaleOffsetNode {
    fn name(&self) -> &str {
        "Calibration"
    }

    fn ports(&self) -> &[PortDescriptor] {
        FLOAT_TO_FLOAT
    }

    fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        let input = ctx.float_input(0)?;
        let (scale, offset) = (self.scale, self.offset);
        let out = ctx.float_output(0)?;
        out.extend(input.iter().map(|x| scale * x + offset));
        Ok(())
    }

    fn on_config_change(&mut self, key: &str, value: &ConfigValue, _ctx: &mut NodeContext) {
        match (key, value.as_float()) {
            ("offset", Some(k)) => self.offset = k as f32,
            ("scale", Some(s)) => self.scale = s as f32,
            _ => {}
        }
    }
}
