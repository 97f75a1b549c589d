//! Flowgraph addressing.
//!
//! Nodes live in an append-only arena and are never removed, so a `NodeId`
//! stays valid for the whole life of the graph. Demodulators are addressed
//! through the same arena as every other node.

use std::fmt;

/// Slot in the flowgraph's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Placeholder for a slot that has not been filled yet.
    pub const INVALID: NodeId = NodeId(u32::MAX);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Port `index` of this node. Inputs and outputs are numbered
    /// separately, so the same `PortId` can name either side.
    pub fn port(self, index: u16) -> PortId {
        PortId { node: self, index }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "node#{}", self.0)
        } else {
            f.write_str("node#-")
        }
    }
}

/// One end of an edge: a node and a port index on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId {
    node: NodeId,
    index: u16,
}

impl PortId {
    pub fn node(self) -> NodeId {
        self.node
    }

    pub fn port_index(self) -> u16 {
        self.index
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.index)
    }
}

/// Edge identifier, allocated from a counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(pub u32);
