//! FrontEndSourceNode - pulls sample blocks from the receiver front end.
//!
//! The front-end lock is held for exactly one block read, so a retune or gain
//! change issued from the control thread always lands between blocks.

use crate::backend::SharedFrontEnd;
use crate::pipeline::buffer::ConfigValue;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::{NodeContext, NodePlugin};
use crate::pipeline::port::{ItemType, PortDescriptor};
use crate::sync::lock_or_recover;
use crate::types::Complex32;

static PORTS: &[PortDescriptor] = &[PortDescriptor::output("out", ItemType::Complex)];

/// Source node reading `block_size` samples per tick.
pub struct FrontEndSourceNode {
    front_end: SharedFrontEnd,
    block_size: usize,
    samples_read: u64,
}

impl FrontEndSourceNode {
    pub fn new(front_end: SharedFrontEnd, block_size: usize) -> Self {
        Self {
            front_end,
            block_size: block_size.max(1),
            samples_read: 0,
        }
    }

    pub fn samples_read(&self) -> u64 {
        self.samples_read
    }
}

impl NodePlugin for FrontEndSourceNode {
    fn name(&self) -> &str {
        "FrontEndSource"
    }

    fn ports(&self) -> &[PortDescriptor] {
        PORTS
    }

    fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        let block_size = self.block_size;
        let out = ctx.complex_output(0)?;
        out.resize(block_size, Complex32::new(0.0, 0.0));

        let produced = {
            let mut front_end = lock_or_recover(&self.front_end, "front end");
            front_end
                .read_samples(out.as_mut_slice())
                .map_err(|e| PipelineError::Source(e.to_string()))?
        };
        out.truncate(produced);
        self.samples_read += produced as u64;
        Ok(())
    }

    fn on_config_change(&mut self, key: &str, value: &ConfigValue, _ctx: &mut NodeContext) {
        if key == "block_size" {
            if let Some(size) = value.as_int().filter(|s| *s > 0) {
                self.block_size = size as usize;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{share, FrontEnd, SimulatedFrontEnd};
    use crate::pipeline::buffer::StreamBuffer;
    use crate::pipeline::id::NodeId;

    fn run(node: &mut FrontEndSourceNode, outputs: &mut [StreamBuffer]) -> PipelineResult<()> {
        let mut ctx = NodeContext {
            node_id: NodeId(0),
            inputs: &[],
            outputs,
            tick: 0,
        };
        node.on_data(&mut ctx)
    }

    #[test]
    fn test_reads_one_block() {
        let fe: Box<dyn FrontEnd> = Box::new(SimulatedFrontEnd::new().with_noise(0.1));
        let mut node = FrontEndSourceNode::new(share(fe), 256);
        let mut outputs = [StreamBuffer::new(ItemType::Complex)];

        run(&mut node, &mut outputs).unwrap();
        assert_eq!(outputs[0].len(), 256);
        assert_eq!(node.samples_read(), 256);
    }

    #[test]
    fn test_read_failure_is_source_error() {
        let fe: Box<dyn FrontEnd> = Box::new(SimulatedFrontEnd::new().fail_after(0));
        let mut node = FrontEndSourceNode::new(share(fe), 16);
        let mut outputs = [StreamBuffer::new(ItemType::Complex)];

        let err = run(&mut node, &mut outputs).unwrap_err();
        assert!(matches!(err, PipelineError::Source(_)));
    }
}
