//! Minimal nodes for flowgraph unit tests.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::{NodeContext, NodePlugin};
use crate::pipeline::port::{ItemType, PortDescriptor};
use crate::types::Complex32;

static COMPLEX_OUT: &[PortDescriptor] = &[PortDescriptor::output("out", ItemType::Complex)];
static BYTE_OUT: &[PortDescriptor] = &[PortDescriptor::output("out", ItemType::Byte)];
static COMPLEX_IN: &[PortDescriptor] = &[PortDescriptor::input("in", ItemType::Complex)];

/// Emits `block` unit-magnitude samples (or counting bytes) per tick.
pub struct ToneSource {
    block: usize,
    item: ItemType,
    phase: f32,
}

impl ToneSource {
    pub fn boxed(block: usize) -> Box<dyn NodePlugin> {
        Box::new(Self {
            block,
            item: ItemType::Complex,
            phase: 0.0,
        })
    }

    pub fn bytes(block: usize) -> Box<dyn NodePlugin> {
        Box::new(Self {
            block,
            item: ItemType::Byte,
            phase: 0.0,
        })
    }
}

impl NodePlugin for ToneSource {
    fn name(&self) -> &str {
        "ToneSource"
    }

    fn ports(&self) -> &[PortDescriptor] {
        match self.item {
            ItemType::Byte => BYTE_OUT,
            _ => COMPLEX_OUT,
        }
    }

    fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        match self.item {
            ItemType::Byte => {
                let out = ctx.byte_output(0)?;
                out.extend((0..self.block).map(|i| i as u8));
            }
            _ => {
                let out = ctx.complex_output(0)?;
                for _ in 0..self.block {
                    out.push(Complex32::from_polar(1.0, self.phase));
                    self.phase = (self.phase + 0.1) % std::f32::consts::TAU;
                }
            }
        }
        Ok(())
    }
}

/// Complex sink that fails on every tick.
pub struct FailingNode;

impl FailingNode {
    pub fn boxed() -> Box<dyn NodePlugin> {
        Box::new(Self)
    }
}

impl NodePlugin for FailingNode {
    fn name(&self) -> &str {
        "Failing"
    }

    fn ports(&self) -> &[PortDescriptor] {
        COMPLEX_IN
    }

    fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        Err(PipelineError::Node {
            node_id: ctx.node_id,
            message: "decoder lost lock".to_string(),
        })
    }
}
