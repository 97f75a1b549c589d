//! Pipeline-specific error types.

use crate::pipeline::id::{NodeId, PortId};
use thiserror::Error;

/// Errors that can occur within the flowgraph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Node {node_id} error: {message}")]
    Node { node_id: NodeId, message: String },

    #[error("Invalid edge: {0}")]
    InvalidEdge(String),

    #[error("Edge {from} -> {to} is not connected")]
    EdgeNotFound { from: PortId, to: PortId },

    #[error("Cycle detected in pipeline graph")]
    CycleDetected,

    #[error("Port mismatch: {0}")]
    PortMismatch(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Pipeline faulted: {0}")]
    Faulted(String),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
