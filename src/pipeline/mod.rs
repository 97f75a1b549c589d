//! Streaming flowgraph.
//!
//! Complex baseband samples flow from the front-end source through typed
//! nodes: mixer, demodulators, monitoring taps, the power chain, displays
//! and output collectors. The graph runs on a dedicated thread; the mode
//! switch coordinator rewires it between ticks.
//!
//! # Architecture
//!
//! ```text
//! [FrontEndSource] ──► [Mixer] ──► [Demod] ──► [ConstValve] ──► [Constellation]
//!                        │              └────► [VectorSink | AudioSink]
//!                        ├──► [FftValve] ──► [Spectrum]
//!                        └──► [RssiValve] ──► |x|² ──► avg ──► iir ──► log10 ──► cal ──► [Rssi]
//! ```
//!
//! # Design
//!
//! - **Enum dispatch on hot path**: `BuiltinNode` enum for all built-in nodes.
//! - **Typed ports**: edges are validated against `PortDescriptor` item types.
//! - **Compiled plan**: only nodes on a source-to-sink path run each tick.

pub mod bridge;
pub mod buffer;
pub mod compiled_plan;
pub mod compiler;
pub mod error;
pub mod executor;
pub mod id;
pub mod node;
pub mod nodes;
pub mod port;

#[cfg(test)]
pub(crate) mod test_nodes;

pub use bridge::{
    frequency_channel, EdgeSnapshot, EngineEvent, EventBus, FrequencySelector, NodeSnapshot,
    TopologySnapshot,
};
pub use buffer::{ConfigValue, StreamBuffer};
pub use compiled_plan::{CompiledPlan, PlanStats};
pub use error::{PipelineError, PipelineResult};
pub use executor::{Flowgraph, Pacer};
pub use id::{EdgeId, NodeId, PortId};
pub use node::{AnyNode, BuiltinNode, NodeContext, NodePlugin};
pub use port::{ItemType, PortDescriptor, PortDirection};
