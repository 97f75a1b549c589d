//! Node abstraction for the flowgraph.
//!
//! Two-layer design:
//! - **`NodePlugin` trait** for replaceable nodes, most notably third-party
//!   demodulators honoring a mode's port contract.
//! - **`BuiltinNode` enum** for all built-in nodes. The compiler can inline
//!   match arms, eliminating dynamic dispatch overhead on the hot path.
//!
//! `AnyNode` wraps either variant so the flowgraph can handle both uniformly.

use crate::pipeline::buffer::{ConfigValue, StreamBuffer};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::NodeId;
use crate::pipeline::port::PortDescriptor;
use crate::types::Complex32;

/// Context passed to node lifecycle hooks.
pub struct NodeContext<'a> {
    pub node_id: NodeId,
    /// One buffer per input port, filled by upstream nodes this tick.
    pub inputs: &'a [StreamBuffer],
    /// One buffer per output port, cleared before `on_data`.
    pub outputs: &'a mut [StreamBuffer],
    /// Monotonic tick counter.
    pub tick: u64,
}

fn mismatch(node_id: NodeId, what: &str, index: usize) -> PipelineError {
    PipelineError::PortMismatch(format!("{} {} {} is missing or mistyped", node_id, what, index))
}

impl<'a> NodeContext<'a> {
    pub fn complex_input(&self, index: usize) -> PipelineResult<&'a [Complex32]> {
        let inputs: &'a [StreamBuffer] = self.inputs;
        inputs
            .get(index)
            .and_then(StreamBuffer::as_complex)
            .ok_or_else(|| mismatch(self.node_id, "complex input", index))
    }

    pub fn float_input(&self, index: usize) -> PipelineResult<&'a [f32]> {
        let inputs: &'a [StreamBuffer] = self.inputs;
        inputs
            .get(index)
            .and_then(StreamBuffer::as_float)
            .ok_or_else(|| mismatch(self.node_id, "float input", index))
    }

    pub fn byte_input(&self, index: usize) -> PipelineResult<&'a [u8]> {
        let inputs: &'a [StreamBuffer] = self.inputs;
        inputs
            .get(index)
            .and_then(StreamBuffer::as_bytes)
            .ok_or_else(|| mismatch(self.node_id, "byte input", index))
    }

    pub fn complex_output(&mut self, index: usize) -> PipelineResult<&mut Vec<Complex32>> {
        let node_id = self.node_id;
        self.outputs
            .get_mut(index)
            .and_then(StreamBuffer::complex_mut)
            .ok_or_else(|| mismatch(node_id, "complex output", index))
    }

    pub fn float_output(&mut self, index: usize) -> PipelineResult<&mut Vec<f32>> {
        let node_id = self.node_id;
        self.outputs
            .get_mut(index)
            .and_then(StreamBuffer::float_mut)
            .ok_or_else(|| mismatch(node_id, "float output", index))
    }

    pub fn byte_output(&mut self, index: usize) -> PipelineResult<&mut Vec<u8>> {
        let node_id = self.node_id;
        self.outputs
            .get_mut(index)
            .and_then(StreamBuffer::bytes_mut)
            .ok_or_else(|| mismatch(node_id, "byte output", index))
    }
}

/// Trait for pluggable nodes.
pub trait NodePlugin: Send {
    /// Human-readable name of this node.
    fn name(&self) -> &str;

    /// Port descriptors for this node.
    fn ports(&self) -> &[PortDescriptor];

    /// Called when sample flow starts.
    fn on_activate(&mut self, _ctx: &mut NodeContext) {}

    /// Called every tick the node is on an active path. An error stops the
    /// whole flowgraph.
    fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()>;

    /// Called when sample flow stops.
    fn on_deactivate(&mut self, _ctx: &mut NodeContext) {}

    /// Called when a config value changes. Unknown keys are ignored.
    fn on_config_change(&mut self, _key: &str, _value: &ConfigValue, _ctx: &mut NodeContext) {}
}

use crate::pipeline::nodes::{
    AnalogDemodNode, AudioSinkNode, ConstellationDisplayNode, DigitalDemodNode,
    FrontEndSourceNode, Log10Node, MagSquaredNode, MixerNode, MovingAverageNode,
    NumberDisplayNode, ScaleOffsetNode, SinglePoleIirNode, SpectrumDisplayNode, ValveNode,
    VectorSinkNode,
};

/// Enum dispatch for built-in nodes.
pub enum BuiltinNode {
    FrontEndSource(FrontEndSourceNode),
    Mixer(MixerNode),
    Valve(ValveNode),
    MagSquared(MagSquaredNode),
    MovingAverage(MovingAverageNode),
    SinglePoleIir(SinglePoleIirNode),
    Log10(Log10Node),
    ScaleOffset(ScaleOffsetNode),
    NumberDisplay(NumberDisplayNode),
    SpectrumDisplay(SpectrumDisplayNode),
    ConstellationDisplay(ConstellationDisplayNode),
    VectorSink(VectorSinkNode),
    AudioSink(AudioSinkNode),
    DigitalDemod(DigitalDemodNode),
    AnalogDemod(AnalogDemodNode),
}

macro_rules! dispatch {
    ($self:expr, $n:ident => $body:expr) => {
        match $self {
            BuiltinNode::FrontEndSource($n) => $body,
            BuiltinNode::Mixer($n) => $body,
            BuiltinNode::Valve($n) => $body,
            BuiltinNode::MagSquared($n) => $body,
            BuiltinNode::MovingAverage($n) => $body,
            BuiltinNode::SinglePoleIir($n) => $body,
            BuiltinNode::Log10($n) => $body,
            BuiltinNode::ScaleOffset($n) => $body,
            BuiltinNode::NumberDisplay($n) => $body,
            BuiltinNode::SpectrumDisplay($n) => $body,
            BuiltinNode::ConstellationDisplay($n) => $body,
            BuiltinNode::VectorSink($n) => $body,
            BuiltinNode::AudioSink($n) => $body,
            BuiltinNode::DigitalDemod($n) => $body,
            BuiltinNode::AnalogDemod($n) => $body,
        }
    };
}

impl BuiltinNode {
    pub fn name(&self) -> &str {
        dispatch!(self, n => n.name())
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        dispatch!(self, n => n.ports())
    }

    pub fn on_activate(&mut self, ctx: &mut NodeContext) {
        dispatch!(self, n => n.on_activate(ctx))
    }

    #[inline]
    pub fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        dispatch!(self, n => n.on_data(ctx))
    }

    pub fn on_deactivate(&mut self, ctx: &mut NodeContext) {
        dispatch!(self, n => n.on_deactivate(ctx))
    }

    pub fn on_config_change(&mut self, key: &str, value: &ConfigValue, ctx: &mut NodeContext) {
        dispatch!(self, n => n.on_config_change(key, value, ctx))
    }
}

/// Wrapper that holds either a built-in node (enum dispatch) or a plugin (trait object).
pub enum AnyNode {
    Builtin(BuiltinNode),
    Plugin(Box<dyn NodePlugin>),
}

impl AnyNode {
    pub fn name(&self) -> &str {
        match self {
            AnyNode::Builtin(n) => n.name(),
            AnyNode::Plugin(n) => n.name(),
        }
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        match self {
            AnyNode::Builtin(n) => n.ports(),
            AnyNode::Plugin(n) => n.ports(),
        }
    }

    pub fn on_activate(&mut self, ctx: &mut NodeContext) {
        match self {
            AnyNode::Builtin(n) => n.on_activate(ctx),
            AnyNode::Plugin(n) => n.on_activate(ctx),
        }
    }

    #[inline]
    pub fn on_data(&mut self, ctx: &mut NodeContext) -> PipelineResult<()> {
        match self {
            AnyNode::Builtin(n) => n.on_data(ctx),
            AnyNode::Plugin(n) => n.on_data(ctx),
        }
    }

    pub fn on_deactivate(&mut self, ctx: &mut NodeContext) {
        match self {
            AnyNode::Builtin(n) => n.on_deactivate(ctx),
            AnyNode::Plugin(n) => n.on_deactivate(ctx),
        }
    }

    pub fn on_config_change(&mut self, key: &str, value: &ConfigValue, ctx: &mut NodeContext) {
        match self {
            AnyNode::Builtin(n) => n.on_config_change(key, value, ctx),
            AnyNode::Plugin(n) => n.on_config_change(key, value, ctx),
        }
    }
}

macro_rules! impl_from_builtin {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for AnyNode {
                fn from(node: $ty) -> Self {
                    AnyNode::Builtin(BuiltinNode::$variant(node))
                }
            }
        )*
    };
}

impl_from_builtin!(
    FrontEndSource(FrontEndSourceNode),
    Mixer(MixerNode),
    Valve(ValveNode),
    MagSquared(MagSquaredNode),
    MovingAverage(MovingAverageNode),
    SinglePoleIir(SinglePoleIirNode),
    Log10(Log10Node),
    ScaleOffset(ScaleOffsetNode),
    NumberDisplay(NumberDisplayNode),
    SpectrumDisplay(SpectrumDisplayNode),
    ConstellationDisplay(ConstellationDisplayNode),
    VectorSink(VectorSinkNode),
    AudioSink(AudioSinkNode),
    DigitalDemod(DigitalDemodNode),
    AnalogDemod(AnalogDemodNode),
);

impl From<Box<dyn NodePlugin>> for AnyNode {
    fn from(plugin: Box<dyn NodePlugin>) -> Self {
        AnyNode::Plugin(plugin)
    }
}
