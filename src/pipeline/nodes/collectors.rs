//! Output collectors for pull-based retrieval.
//!
//! Collectors are bounded FIFOs shared between a sink node (writer) and the
//! control surface (reader). Past capacity the oldest items are dropped;
//! reading drains.

use crate::pipeline::error::PipelineResult;
use crate::pipeline::node::{NodeContext, NodePlugin};
use crate::pipeline::port::{ItemType, PortDescriptor};
use crate::sync::lock_or_recover;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

static BYTE_IN: &[PortDescriptor] = &[PortDescriptor::input("in", ItemType::Byte)];
static FLOAT_IN: &[PortDescriptor] = &[PortDescriptor::input("in", ItemType::Float)];

/// Bounded, draining buffer shared across threads.
#[derive(Debug)]
pub struct CollectorHandle<T> {
    inner: Arc<Mutex<VecDeque<T>>>,
    capacity: usize,
}

impl<T> Clone for CollectorHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            capacity: self.capacity,
        }
    }
}

impl<T: Copy> CollectorHandle<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1 << 16)))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append items, dropping the oldest past capacity.
    pub fn push_slice(&self, items: &[T]) {
        if items.is_empty() {
            return;
        }
        let mut buf = lock_or_recover(&self.inner, "collector");
        let items = &items[items.len().saturating_sub(self.capacity)..];
        let overflow = (buf.len() + items.len()).saturating_sub(self.capacity);
        buf.drain(..overflow);
        buf.extend(items.iter().copied());
    }

    pub fn push(&self, item: T) {
        self.push_slice(std::slice::from_ref(&item));
    }

    /// Drain everything collected so far.
    pub fn take(&self) -> Vec<T> {
        lock_or_recover(&self.inner, "collector").drain(..).collect()
    }

    pub fn clear(&self) {
        lock_or_recover(&self.inner, "collector").clear();
    }

    pub fn len(&self) -> usize {
        lock_or_recover(&self.inner, "collector").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Raw symbol/bit sink.
pub struct VectorSinkNode {
    collector: CollectorHandle<u8>,
}

impl VectorSinkNode {
    pub fn new(collector: CollectorHandle<u8>) -> Self {
        Self { collector }
    }
}

impl NodePlugin for VectorSinkNode {
    fn name(&self) -> &str {
        "VectorSink"
    }

    fn ports(&self) -> &[PortDescriptor] {
        BYTE_IN
    }

    fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        self.collector.push_slice(ctx.byte_input(0)?);
        Ok(())
    }
}

/// Demodulated audio sink.
pub struct AudioSinkNode {
    collector: CollectorHandle<f32>,
}

impl AudioSinkNode {
    pub fn new(collector: CollectorHandle<f32>) -> Self {
        Self { collector }
    }
}

impl NodePlugin for AudioSinkNode {
    fn name(&self) -> &str {
        "AudioSink"
    }

    fn ports(&self) -> &[PortDescriptor] {
        FLOAT_IN
    }

    fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        self.collector.push_slice(ctx.float_input(0)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::buffer::StreamBuffer;
    use crate::pipeline::id::NodeId;
    use proptest::prelude::*;

    #[test]
    fn test_take_drains() {
        let c = CollectorHandle::new(8);
        c.push_slice(&[1u8, 2, 3]);
        assert_eq!(c.take(), vec![1, 2, 3]);
        assert!(c.take().is_empty());
    }

    #[test]
    fn test_oldest_dropped_past_capacity() {
        let c = CollectorHandle::new(4);
        c.push_slice(&[1u8, 2, 3]);
        c.push_slice(&[4, 5, 6]);
        assert_eq!(c.take(), vec![3, 4, 5, 6]);

        c.push_slice(&[9, 8, 7, 6, 5, 4]);
        assert_eq!(c.take(), vec![7, 6, 5, 4]);
    }

    #[test]
    fn test_audio_sink_collects() {
        let collector = CollectorHandle::new(16);
        let mut sink = AudioSinkNode::new(collector.clone());
        let inputs = [StreamBuffer::Float(vec![0.5, -0.5])];
        let mut ctx = NodeContext {
            node_id: NodeId(3),
            inputs: &inputs,
            outputs: &mut [],
            tick: 0,
        };
        sink.on_data(&mut ctx).unwrap();
        assert_eq!(collector.take(), vec![0.5, -0.5]);
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_capacity(
            capacity in 1usize..64,
            pushes in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..100), 0..10),
        ) {
            let c = CollectorHandle::new(capacity);
            let mut all = Vec::new();
            for p in &pushes {
                c.push_slice(p);
                all.extend_from_slice(p);
                prop_assert!(c.len() <= capacity);
            }
            let expected = all[all.len().saturating_sub(capacity)..].to_vec();
            prop_assert_eq!(c.take(), expected);
        }
    }
}
