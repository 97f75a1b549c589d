//! ValveNode - togglable pass-through gate for monitoring taps.
//!
//! When closed the valve still consumes its input every tick and simply emits
//! nothing, so upstream production is never stalled.

use crate::pipeline::buffer::ConfigValue;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::{NodeContext, NodePlugin};
use crate::pipeline::port::{ItemType, PortDescriptor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

static COMPLEX_PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in", ItemType::Complex),
    PortDescriptor::output("out", ItemType::Complex),
];

static FLOAT_PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in", ItemType::Float),
    PortDescriptor::output("out", ItemType::Float),
];

static BYTE_PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in", ItemType::Byte),
    PortDescriptor::output("out", ItemType::Byte),
];

/// Shared open/closed flag. Toggling it needs no flowgraph lock.
#[derive(Debug, Clone, Default)]
pub struct ValveHandle(Arc<AtomicBool>);

impl ValveHandle {
    pub fn new(open: bool) -> Self {
        Self(Arc::new(AtomicBool::new(open)))
    }

    pub fn set_open(&self, open: bool) {
        self.0.store(open, Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub struct ValveNode {
    name: &'static str,
    ports: &'static [PortDescriptor],
    handle: ValveHandle,
    /// Items discarded while closed
    discarded: u64,
}

impl ValveNode {
    pub fn new(name: &'static str, item: ItemType, open: bool) -> Self {
        let ports = match item {
            ItemType::Complex => COMPLEX_PORTS,
            ItemType::Float => FLOAT_PORTS,
            ItemType::Byte => BYTE_PORTS,
        };
        Self {
            name,
            ports,
            handle: ValveHandle::new(open),
            discarded: 0,
        }
    }

    pub fn handle(&self) -> ValveHandle {
        self.handle.clone()
    }

    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

impl NodePlugin for ValveNode {
    fn name(&self) -> &str {
        self.name
    }

    fn ports(&self) -> &[PortDescriptor] {
        self.ports
    }

    fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        let input = ctx
            .inputs
            .first()
            .ok_or_else(|| PipelineError::PortMismatch(format!("{} has no input", self.name)))?;

        if !self.handle.is_open() {
            self.discarded += input.len() as u64;
            return Ok(());
        }

        let output = ctx
            .outputs
            .first_mut()
            .ok_or_else(|| PipelineError::PortMismatch(format!("{} has no output", self.name)))?;
        if !output.append_from(input) {
            return Err(PipelineError::PortMismatch(format!(
                "{} input {:?} does not match output {:?}",
                self.name,
                input.item_type(),
                output.item_type()
            )));
        }
        Ok(())
    }

    fn on_config_change(&mut self, key: &str, value: &ConfigValue, _ctx: &mut NodeContext) {
        if let ("enabled", Some(open)) = (key, value.as_bool()) {
            self.handle.set_open(open);
        }
    }
}
