//! Flowgraph executor: the node arena, edge bookkeeping and the tick loop.
//!
//! Each tick:
//! 1. Recompile the plan if the topology changed.
//! 2. For every active node in topological order: clear its outputs, run
//!    `on_data`, append its outputs to downstream inputs, clear its inputs.
//!
//! The flowgraph is single-threaded; the engine serializes access behind a
//! mutex so rewiring always happens between ticks.

use crate::pipeline::bridge::{EdgeSnapshot, NodeSnapshot, TopologySnapshot};
use crate::pipeline::buffer::{ConfigValue, StreamBuffer};
use crate::pipeline::compiled_plan::CompiledPlan;
use crate::pipeline::compiler::PipelineCompiler;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::{EdgeId, NodeId, PortId};
use crate::pipeline::node::{AnyNode, NodeContext};
use crate::pipeline::port::{nth_port, PortDirection};
use std::time::{Duration, Instant};

/// An edge connecting an output port of one node to an input port of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub from: PortId,
    pub to: PortId,
}

/// A slot holding a node and its per-port stream buffers.
pub struct NodeSlot {
    pub node: AnyNode,
    pub inputs: Vec<StreamBuffer>,
    pub outputs: Vec<StreamBuffer>,
}

impl NodeSlot {
    pub fn new(node: AnyNode) -> Self {
        let buffers = |direction| {
            node.ports()
                .iter()
                .filter(|p| p.direction == direction)
                .map(|p| StreamBuffer::new(p.item))
                .collect::<Vec<_>>()
        };
        let inputs = buffers(PortDirection::Input);
        let outputs = buffers(PortDirection::Output);
        Self {
            node,
            inputs,
            outputs,
        }
    }
}

/// Borrow the outputs of `from` and the inputs of `to` at the same time.
fn split_pair(nodes: &mut [NodeSlot], from: usize, to: usize) -> (&NodeSlot, &mut NodeSlot) {
    if from < to {
        let (head, tail) = nodes.split_at_mut(to);
        (&head[from], &mut tail[0])
    } else {
        let (head, tail) = nodes.split_at_mut(from);
        (&tail[0], &mut head[to])
    }
}

/// The streaming flowgraph.
pub struct Flowgraph {
    nodes: Vec<NodeSlot>,
    edges: Vec<Edge>,
    next_edge_id: u32,
    /// Cached compiled execution plan
    plan: CompiledPlan,
    /// Generation counter for cache invalidation
    generation: u64,
    /// Whether plan needs recompilation
    plan_dirty: bool,
    active: bool,
    fault: Option<String>,
    tick: u64,
}

impl Default for Flowgraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Flowgraph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            next_edge_id: 0,
            plan: CompiledPlan::new(),
            generation: 0,
            plan_dirty: true,
            active: false,
            fault: None,
            tick: 0,
        }
    }

    // ── Graph building ──

    /// Add a node. Returns its NodeId.
    pub fn add_node(&mut self, node: impl Into<AnyNode>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeSlot::new(node.into()));
        self.invalidate_plan();
        id
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&AnyNode> {
        self.nodes.get(id.index()).map(|slot| &slot.node)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut AnyNode> {
        self.nodes.get_mut(id.index()).map(|slot| &mut slot.node)
    }

    /// First node named `name`.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|slot| slot.node.name() == name)
            .map(|idx| NodeId(idx as u32))
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Connect output port `from` to input port `to`.
    ///
    /// Each input accepts exactly one producer; outputs may fan out.
    pub fn connect(&mut self, from: PortId, to: PortId) -> PipelineResult<EdgeId> {
        let from_node = from.node();
        let to_node = to.node();

        let from_slot = self.nodes.get(from_node.index()).ok_or_else(|| {
            PipelineError::InvalidEdge(format!("Invalid source node: {:?}", from_node))
        })?;
        let to_slot = self.nodes.get(to_node.index()).ok_or_else(|| {
            PipelineError::InvalidEdge(format!("Invalid target node: {:?}", to_node))
        })?;
        if from_node == to_node {
            return Err(PipelineError::InvalidEdge(
                "Cannot connect node to itself".to_string(),
            ));
        }

        let out = nth_port(
            from_slot.node.ports(),
            PortDirection::Output,
            from.port_index(),
        )
        .ok_or_else(|| {
            PipelineError::PortMismatch(format!(
                "{} has no output port {}",
                from_slot.node.name(),
                from.port_index()
            ))
        })?;
        let inp = nth_port(to_slot.node.ports(), PortDirection::Input, to.port_index())
            .ok_or_else(|| {
                PipelineError::PortMismatch(format!(
                    "{} has no input port {}",
                    to_slot.node.name(),
                    to.port_index()
                ))
            })?;
        if out.item != inp.item {
            return Err(PipelineError::PortMismatch(format!(
                "{}.{} ({:?}) cannot feed {}.{} ({:?})",
                from_slot.node.name(),
                out.name,
                out.item,
                to_slot.node.name(),
                inp.name,
                inp.item
            )));
        }

        if self.is_connected(from, to) {
            return Err(PipelineError::InvalidEdge(format!(
                "{:?} -> {:?} is already connected",
                from, to
            )));
        }
        if self.edges.iter().any(|e| e.to == to) {
            return Err(PipelineError::InvalidEdge(format!(
                "Input {}.{} already has a producer",
                to_slot.node.name(),
                inp.name
            )));
        }
        if self.would_create_cycle(from_node, to_node) {
            return Err(PipelineError::CycleDetected);
        }

        tracing::debug!(
            "Connect {}.{} -> {}.{}",
            from_slot.node.name(),
            out.name,
            to_slot.node.name(),
            inp.name
        );

        let id = EdgeId(self.next_edge_id);
        self.next_edge_id += 1;
        self.edges.push(Edge { id, from, to });
        self.invalidate_plan();
        Ok(id)
    }

    /// Remove the edge `from -> to`. Pending input on `to` is dropped.
    pub fn disconnect(&mut self, from: PortId, to: PortId) -> PipelineResult<()> {
        let pos = self
            .edges
            .iter()
            .position(|e| e.from == from && e.to == to)
            .ok_or(PipelineError::EdgeNotFound { from, to })?;
        self.edges.remove(pos);

        if let Some(buf) = self
            .nodes
            .get_mut(to.node().index())
            .and_then(|slot| slot.inputs.get_mut(to.port_index() as usize))
        {
            buf.clear();
        }

        tracing::debug!("Disconnect {:?} -> {:?}", from, to);
        self.invalidate_plan();
        Ok(())
    }

    pub fn is_connected(&self, from: PortId, to: PortId) -> bool {
        self.edges.iter().any(|e| e.from == from && e.to == to)
    }

    /// Check if adding an edge from `from` to `to` would create a cycle.
    fn would_create_cycle(&self, from: NodeId, to: NodeId) -> bool {
        // If `to` can reach `from` through existing edges, adding from->to creates a cycle.
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![to];

        while let Some(current) = stack.pop() {
            if current == from {
                return true;
            }
            let idx = current.index();
            if idx >= self.nodes.len() || visited[idx] {
                continue;
            }
            visited[idx] = true;

            for edge in &self.edges {
                if edge.from.node() == current {
                    stack.push(edge.to.node());
                }
            }
        }
        false
    }

    // ── Configuration ──

    /// Deliver a config value to one node.
    pub fn configure(&mut self, id: NodeId, key: &str, value: &ConfigValue) -> PipelineResult<()> {
        let tick = self.tick;
        let slot = self.nodes.get_mut(id.index()).ok_or_else(|| PipelineError::Node {
            node_id: id,
            message: "no such node".to_string(),
        })?;
        let NodeSlot {
            node,
            inputs,
            outputs,
        } = slot;
        let mut ctx = NodeContext {
            node_id: id,
            inputs: inputs.as_slice(),
            outputs: outputs.as_mut_slice(),
            tick,
        };
        node.on_config_change(key, value, &mut ctx);
        Ok(())
    }

    // ── Plan ──

    /// Invalidate the compiled execution plan (called when graph topology changes).
    fn invalidate_plan(&mut self) {
        self.plan_dirty = true;
        self.generation += 1;
    }

    /// Recompile the execution plan if needed and return it.
    pub fn compile(&mut self) -> &CompiledPlan {
        if self.plan_dirty {
            self.plan = PipelineCompiler::compile(&self.nodes, &self.edges, self.generation);
            self.plan_dirty = false;

            tracing::debug!(
                "Flowgraph recompiled: {} active / {} total (gen {})",
                self.plan.stats.active_nodes,
                self.plan.stats.total_nodes,
                self.plan.generation,
            );

            // Nodes that fell off the active path must not replay stale input later.
            for (idx, slot) in self.nodes.iter_mut().enumerate() {
                if !self.plan.is_active(idx) {
                    slot.inputs.iter_mut().for_each(StreamBuffer::clear);
                }
            }
        }
        &self.plan
    }

    // ── Fault state ──

    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    /// Mark the flowgraph fully stopped. The first fault wins.
    pub fn set_fault(&mut self, message: impl Into<String>) {
        if self.fault.is_none() {
            let message = message.into();
            tracing::error!("Flowgraph faulted: {}", message);
            self.fault = Some(message);
        }
    }

    // ── Lifecycle ──

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn activate(&mut self) {
        if self.active {
            return;
        }
        let tick = self.tick;
        for (idx, slot) in self.nodes.iter_mut().enumerate() {
            let NodeSlot {
                node,
                inputs,
                outputs,
            } = slot;
            let mut ctx = NodeContext {
                node_id: NodeId(idx as u32),
                inputs: inputs.as_slice(),
                outputs: outputs.as_mut_slice(),
                tick,
            };
            node.on_activate(&mut ctx);
        }
        self.active = true;
    }

    /// Re-run a node's activation hook so it starts from a clean state.
    /// Used when a node is rewired into a running graph.
    pub fn reset_node(&mut self, id: NodeId) -> PipelineResult<()> {
        let tick = self.tick;
        let NodeSlot {
            node,
            inputs,
            outputs,
        } = self
            .nodes
            .get_mut(id.index())
            .ok_or_else(|| PipelineError::InvalidEdge(format!("Unknown node {}", id)))?;
        for buf in inputs.iter_mut().chain(outputs.iter_mut()) {
            buf.clear();
        }
        let mut ctx = NodeContext {
            node_id: id,
            inputs: inputs.as_slice(),
            outputs: outputs.as_mut_slice(),
            tick,
        };
        node.on_activate(&mut ctx);
        Ok(())
    }

    pub fn deactivate(&mut self) {
        if !self.active {
            return;
        }
        let tick = self.tick;
        for (idx, slot) in self.nodes.iter_mut().enumerate() {
            let NodeSlot {
                node,
                inputs,
                outputs,
            } = slot;
            let mut ctx = NodeContext {
                node_id: NodeId(idx as u32),
                inputs: inputs.as_slice(),
                outputs: outputs.as_mut_slice(),
                tick,
            };
            node.on_deactivate(&mut ctx);
        }
        self.active = false;
    }

    // ── Tick execution ──

    /// Run every active node once. A node error faults the flowgraph.
    pub fn tick(&mut self) -> PipelineResult<()> {
        if let Some(message) = &self.fault {
            return Err(PipelineError::Faulted(message.clone()));
        }
        self.compile();

        match self.run_plan() {
            Ok(()) => {
                self.tick += 1;
                Ok(())
            }
            Err(e) => {
                self.set_fault(e.to_string());
                Err(e)
            }
        }
    }

    fn run_plan(&mut self) -> PipelineResult<()> {
        let Self {
            nodes, plan, tick, ..
        } = self;

        for &idx in &plan.active_nodes {
            {
                let NodeSlot {
                    node,
                    inputs,
                    outputs,
                } = &mut nodes[idx];
                outputs.iter_mut().for_each(StreamBuffer::clear);
                let mut ctx = NodeContext {
                    node_id: NodeId(idx as u32),
                    inputs: inputs.as_slice(),
                    outputs: outputs.as_mut_slice(),
                    tick: *tick,
                };
                node.on_data(&mut ctx)?;
                inputs.iter_mut().for_each(StreamBuffer::clear);
            }

            for route in plan.routes_from(idx) {
                let (src, dst) = split_pair(nodes, idx, route.to_node);
                let out = &src.outputs[route.from_port as usize];
                let inp = dst
                    .inputs
                    .get_mut(route.to_port as usize)
                    .ok_or_else(|| {
                        PipelineError::PortMismatch(format!(
                            "{} has no input buffer {}",
                            dst.node.name(),
                            route.to_port
                        ))
                    })?;
                if !inp.append_from(out) {
                    return Err(PipelineError::PortMismatch(format!(
                        "{} -> {}: item type changed at runtime",
                        src.node.name(),
                        dst.node.name()
                    )));
                }
            }
        }
        Ok(())
    }

    // ── Introspection ──

    /// Snapshot of all nodes and connected edges.
    pub fn topology(&self) -> TopologySnapshot {
        let port_name = |node: NodeId, direction, index: u16| {
            self.nodes
                .get(node.index())
                .and_then(|slot| nth_port(slot.node.ports(), direction, index))
                .map(|p| p.name)
                .unwrap_or("?")
        };
        let node_name = |node: NodeId| {
            self.nodes
                .get(node.index())
                .map(|slot| slot.node.name().to_string())
                .unwrap_or_default()
        };

        let nodes = self
            .nodes
            .iter()
            .enumerate()
            .map(|(idx, slot)| NodeSnapshot {
                id: idx as u32,
                name: slot.node.name().to_string(),
                active: !self.plan_dirty && self.plan.is_active(idx),
            })
            .collect();

        let edges = self
            .edges
            .iter()
            .map(|e| EdgeSnapshot {
                id: e.id.0,
                from_node: node_name(e.from.node()),
                from_port: port_name(e.from.node(), PortDirection::Output, e.from.port_index())
                    .to_string(),
                to_node: node_name(e.to.node()),
                to_port: port_name(e.to.node(), PortDirection::Input, e.to.port_index())
                    .to_string(),
            })
            .collect();

        TopologySnapshot {
            generation: self.generation,
            nodes,
            edges,
        }
    }
}

// ── Pacing ──

/// Paces ticks at the rate a real device would deliver blocks.
///
/// Hardware sources block inside `read_samples`, so pacing is only needed
/// for sources that return immediately.
#[derive(Debug)]
pub struct Pacer {
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(block_size: usize, sample_rate: f64, throttle: bool) -> Self {
        let interval = (throttle && sample_rate > 0.0)
            .then(|| Duration::from_secs_f64(block_size as f64 / sample_rate));
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Block until the next tick is due.
    pub fn wait(&mut self) {
        let Some(target_interval) = self.interval else {
            std::thread::yield_now();
            return;
        };

        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < target_interval {
                let remaining = target_interval - elapsed;
                // Spin for sub-millisecond accuracy, sleep for larger waits
                if remaining > Duration::from_millis(2) {
                    std::thread::sleep(remaining - Duration::from_millis(1));
                }
                while last.elapsed() < target_interval {
                    std::hint::spin_loop();
                }
            }
        }
        self.last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::nodes::{
        CollectorHandle, MagSquaredNode, NumberDisplayNode, ValveNode, VectorSinkNode,
    };
    use crate::pipeline::port::ItemType;
    use crate::pipeline::test_nodes::{FailingNode, ToneSource};

    fn readout_chain() -> (Flowgraph, NodeId, NodeId, NodeId) {
        let mut graph = Flowgraph::new();
        let src = graph.add_node(ToneSource::boxed(16));
        let mag = graph.add_node(MagSquaredNode);
        let readout = graph.add_node(NumberDisplayNode::new("Readout"));
        graph.connect(src.port(0), mag.port(0)).unwrap();
        graph.connect(mag.port(0), readout.port(0)).unwrap();
        (graph, src, mag, readout)
    }

    #[test]
    fn test_topological_sort_linear() {
        let (mut graph, src, mag, readout) = readout_chain();
        let plan = graph.compile();
        assert_eq!(
            plan.active_nodes,
            vec![src.index(), mag.index(), readout.index()]
        );
    }

    #[test]
    fn test_topological_sort_diamond() {
        // src → valve A → sink A, src → valve B → sink B
        let mut graph = Flowgraph::new();
        let src = graph.add_node(ToneSource::boxed(4));
        let a = graph.add_node(ValveNode::new("A", ItemType::Complex, true));
        let b = graph.add_node(ValveNode::new("B", ItemType::Complex, true));
        let mag_a = graph.add_node(MagSquaredNode);
        let mag_b = graph.add_node(MagSquaredNode);
        let ra = graph.add_node(NumberDisplayNode::new("RA"));
        let rb = graph.add_node(NumberDisplayNode::new("RB"));
        graph.connect(src.port(0), a.port(0)).unwrap();
        graph.connect(src.port(0), b.port(0)).unwrap();
        graph.connect(a.port(0), mag_a.port(0)).unwrap();
        graph.connect(b.port(0), mag_b.port(0)).unwrap();
        graph.connect(mag_a.port(0), ra.port(0)).unwrap();
        graph.connect(mag_b.port(0), rb.port(0)).unwrap();

        let order = graph.compile().active_nodes.clone();
        let pos = |nid: NodeId| order.iter().position(|&x| x == nid.index()).unwrap();
        assert_eq!(order.len(), 7);
        assert!(pos(src) < pos(a));
        assert!(pos(src) < pos(b));
        assert!(pos(a) < pos(mag_a));
        assert!(pos(mag_b) < pos(rb));
    }

    #[test]
    fn test_tick_propagates_data() {
        let mut graph = Flowgraph::new();
        let src = graph.add_node(ToneSource::boxed(16));
        let mag = graph.add_node(MagSquaredNode);
        let display = NumberDisplayNode::new("Readout");
        let latest = display.handle();
        let readout = graph.add_node(display);
        graph.connect(src.port(0), mag.port(0)).unwrap();
        graph.connect(mag.port(0), readout.port(0)).unwrap();

        graph.tick().unwrap();
        assert_eq!(graph.tick_count(), 1);
        // Unit-magnitude tone
        let value = latest.get().unwrap();
        assert!((value - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_connect_validation() {
        let (mut graph, src, mag, readout) = readout_chain();

        // Already fed input
        assert!(matches!(
            graph.connect(src.port(0), mag.port(0)),
            Err(PipelineError::InvalidEdge(_))
        ));
        // Type mismatch: float output into complex input
        let valve = graph.add_node(ValveNode::new("V", ItemType::Complex, true));
        assert!(matches!(
            graph.connect(mag.port(0), valve.port(0)),
            Err(PipelineError::PortMismatch(_))
        ));
        // Port out of range
        assert!(matches!(
            graph.connect(src.port(3), valve.port(0)),
            Err(PipelineError::PortMismatch(_))
        ));
        // Unknown node
        assert!(matches!(
            graph.connect(NodeId(99).port(0), valve.port(0)),
            Err(PipelineError::InvalidEdge(_))
        ));
        // Sinks have no outputs
        assert!(graph.connect(readout.port(0), valve.port(0)).is_err());
    }

    #[test]
    fn test_cycle_rejected() {
        let mut graph = Flowgraph::new();
        let a = graph.add_node(ValveNode::new("A", ItemType::Complex, true));
        let b = graph.add_node(ValveNode::new("B", ItemType::Complex, true));
        graph.connect(a.port(0), b.port(0)).unwrap();
        assert_eq!(
            graph.connect(b.port(0), a.port(0)),
            Err(PipelineError::CycleDetected)
        );
    }

    #[test]
    fn test_disconnect_missing_edge() {
        let (mut graph, src, mag, readout) = readout_chain();
        assert_eq!(
            graph.disconnect(src.port(0), readout.port(0)),
            Err(PipelineError::EdgeNotFound {
                from: src.port(0),
                to: readout.port(0)
            })
        );
        graph.disconnect(src.port(0), mag.port(0)).unwrap();
        assert!(!graph.is_connected(src.port(0), mag.port(0)));
        assert!(graph.compile().is_empty());
    }

    #[test]
    fn test_reconnect_resumes_flow() {
        let mut graph = Flowgraph::new();
        let collector = CollectorHandle::new(64);
        let sink = graph.add_node(VectorSinkNode::new(collector.clone()));
        let bytes = graph.add_node(ToneSource::bytes(3));

        graph.connect(bytes.port(0), sink.port(0)).unwrap();
        graph.tick().unwrap();
        assert_eq!(collector.take().len(), 3);

        graph.disconnect(bytes.port(0), sink.port(0)).unwrap();
        graph.tick().unwrap();
        assert!(collector.take().is_empty());

        graph.connect(bytes.port(0), sink.port(0)).unwrap();
        graph.tick().unwrap();
        assert_eq!(collector.take().len(), 3);
    }

    #[test]
    fn test_node_error_faults_graph() {
        let mut graph = Flowgraph::new();
        let src = graph.add_node(ToneSource::boxed(4));
        let bad = graph.add_node(FailingNode::boxed());
        graph.connect(src.port(0), bad.port(0)).unwrap();

        assert!(graph.tick().is_err());
        assert!(graph.is_faulted());
        assert!(matches!(graph.tick(), Err(PipelineError::Faulted(_))));
        assert_eq!(graph.tick_count(), 0);
    }

    #[test]
    fn test_first_fault_wins() {
        let mut graph = Flowgraph::new();
        graph.set_fault("first");
        graph.set_fault("second");
        assert_eq!(graph.fault(), Some("first"));
    }

    #[test]
    fn test_topology_names_ports() {
        let (graph, _, _, _) = readout_chain();
        let topo = graph.topology();
        assert_eq!(topo.nodes.len(), 3);
        assert_eq!(topo.edges.len(), 2);
        assert!(topo.contains("MagSquared", "out", "Readout", "in"));
    }

    #[test]
    fn test_pacer_without_throttle() {
        let mut pacer = Pacer::new(4096, 1_000_000.0, false);
        assert!(pacer.interval().is_none());
        pacer.wait();

        let pacer = Pacer::new(1000, 1_000_000.0, true);
        assert_eq!(pacer.interval(), Some(Duration::from_millis(1)));
    }
}
