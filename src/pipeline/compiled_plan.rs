/// One pre-resolved output-to-input hop between two active nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// Output port index on the producing node
    pub from_port: u16,
    /// Index of the consuming node
    pub to_node: usize,
    /// Input port index on the consuming node
    pub to_port: u16,
}

/// Compiled execution plan for a flowgraph.
/// Contains only active nodes (nodes participating in data flow from sources to sinks).
#[derive(Debug, Clone)]
pub struct CompiledPlan {
    /// Active node indices in topological order
    pub active_nodes: Vec<usize>,

    /// Outgoing routes per node index, active → active only
    pub routes: Vec<Vec<Route>>,

    /// Cache invalidation generation number
    pub generation: u64,

    /// Compilation statistics
    pub stats: PlanStats,

    /// Sink nodes that are not in active_nodes (disconnected from sources)
    pub inactive_sink_nodes: Vec<usize>,
}

/// Statistics about the compiled plan
#[derive(Debug, Clone, Default)]
pub struct PlanStats {
    /// Total number of nodes in the graph (including disconnected)
    pub total_nodes: usize,

    /// Number of active nodes in the execution plan
    pub active_nodes: usize,

    /// Number of edges between active nodes
    pub active_edges: usize,

    /// Number of disconnected nodes (not in execution plan)
    pub disconnected_nodes: usize,

    /// Number of source nodes (no inputs)
    pub source_nodes: usize,

    /// Number of sink nodes (no outputs)
    pub sink_nodes: usize,

    /// Compilation time in microseconds
    pub compile_time_us: u64,
}

impl CompiledPlan {
    /// Create a new empty compiled plan
    pub fn new() -> Self {
        Self {
            active_nodes: Vec::new(),
            routes: Vec::new(),
            generation: 0,
            stats: PlanStats::default(),
            inactive_sink_nodes: Vec::new(),
        }
    }

    /// Check if the plan has any active nodes
    pub fn is_empty(&self) -> bool {
        self.active_nodes.is_empty()
    }

    /// Whether node `idx` runs in this plan
    pub fn is_active(&self, idx: usize) -> bool {
        self.active_nodes.contains(&idx)
    }

    /// Routes leaving node `idx`
    pub fn routes_from(&self, idx: usize) -> &[Route] {
        self.routes.get(idx).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for CompiledPlan {
    fn default() -> Self {
        Self::new()
    }
}
