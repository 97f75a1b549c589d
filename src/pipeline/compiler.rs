use super::compiled_plan::{CompiledPlan, PlanStats, Route};
use super::executor::{Edge, NodeSlot};
use super::port::{count_ports, PortDirection};
use std::collections::VecDeque;

/// Compiles a flowgraph into an execution plan
pub struct PipelineCompiler;

impl PipelineCompiler {
    /// Compile a flowgraph into an execution plan.
    ///
    /// This performs bidirectional reachability analysis to identify which nodes
    /// participate in active data flow (have both upstream sources AND downstream sinks).
    /// Demodulators whose wiring is removed drop out of the plan and stop running.
    ///
    /// # Arguments
    /// * `nodes` - All nodes in the graph
    /// * `edges` - All edges in the graph
    /// * `generation` - Generation counter for cache invalidation
    ///
    /// # Returns
    /// A `CompiledPlan` containing only active nodes in topological order
    pub fn compile(nodes: &[NodeSlot], edges: &[Edge], generation: u64) -> CompiledPlan {
        let start_time = std::time::Instant::now();

        let n = nodes.len();
        if n == 0 {
            return CompiledPlan {
                generation,
                ..CompiledPlan::new()
            };
        }

        // Build adjacency lists (forward and backward)
        let (fwd_adj, bwd_adj) = Self::build_adjacency(n, edges);

        let sources = Self::identify(nodes, PortDirection::Input);
        let sinks = Self::identify(nodes, PortDirection::Output);

        let fwd_reachable = Self::reachability(&sources, &fwd_adj, n);
        let bwd_reachable = Self::reachability(&sinks, &bwd_adj, n);

        // Active: on a path from a source to a sink
        let active_set: Vec<bool> = (0..n)
            .map(|i| fwd_reachable[i] && bwd_reachable[i])
            .collect();

        let active_nodes = Self::topological_sort_active(n, edges, &active_set);

        let mut routes = vec![Vec::new(); n];
        let mut active_edges = 0;
        for edge in edges {
            let from = edge.from.node().index();
            let to = edge.to.node().index();
            if from < n && to < n && active_set[from] && active_set[to] {
                routes[from].push(Route {
                    from_port: edge.from.port_index(),
                    to_node: to,
                    to_port: edge.to.port_index(),
                });
                active_edges += 1;
            }
        }

        let inactive_sink_nodes: Vec<usize> = sinks
            .iter()
            .filter(|&&sink_idx| !active_set[sink_idx])
            .copied()
            .collect();

        let compile_time_us = start_time.elapsed().as_micros() as u64;
        let active_count = active_nodes.len();

        let stats = PlanStats {
            total_nodes: n,
            active_nodes: active_count,
            active_edges,
            disconnected_nodes: n.saturating_sub(active_count),
            source_nodes: sources.len(),
            sink_nodes: sinks.len(),
            compile_time_us,
        };

        CompiledPlan {
            active_nodes,
            routes,
            generation,
            stats,
            inactive_sink_nodes,
        }
    }

    /// Build forward and backward adjacency lists
    fn build_adjacency(n: usize, edges: &[Edge]) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
        let mut fwd_adj = vec![Vec::new(); n];
        let mut bwd_adj = vec![Vec::new(); n];

        for edge in edges {
            let from = edge.from.node().index();
            let to = edge.to.node().index();
            if from >= n || to >= n {
                continue;
            }
            fwd_adj[from].push(to);
            bwd_adj[to].push(from);
        }

        (fwd_adj, bwd_adj)
    }

    /// Nodes without any port of `missing` direction.
    ///
    /// No inputs makes a source, no outputs makes a sink. This is structural,
    /// not edge-based.
    fn identify(nodes: &[NodeSlot], missing: PortDirection) -> Vec<usize> {
        nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| count_ports(slot.node.ports(), missing) == 0)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// DFS from `roots` along `adj`
    fn reachability(roots: &[usize], adj: &[Vec<usize>], n: usize) -> Vec<bool> {
        let mut reachable = vec![false; n];
        let mut stack = Vec::new();

        for &root in roots {
            reachable[root] = true;
            stack.push(root);
        }

        while let Some(node) = stack.pop() {
            for &neighbor in &adj[node] {
                if !reachable[neighbor] {
                    reachable[neighbor] = true;
                    stack.push(neighbor);
                }
            }
        }

        reachable
    }

    /// Topological sort of active nodes using Kahn's algorithm
    fn topological_sort_active(n: usize, edges: &[Edge], active_set: &[bool]) -> Vec<usize> {
        let mut adj = vec![Vec::new(); n];
        let mut in_degree = vec![0; n];

        for edge in edges {
            let from = edge.from.node().index();
            let to = edge.to.node().index();
            if from >= n || to >= n {
                continue;
            }
            if active_set[from] && active_set[to] {
                adj[from].push(to);
                in_degree[to] += 1;
            }
        }

        let mut queue: VecDeque<usize> = (0..n)
            .filter(|&i| active_set[i] && in_degree[i] == 0)
            .collect();
        let mut result = Vec::new();

        while let Some(node) = queue.pop_front() {
            result.push(node);

            for &neighbor in &adj[node] {
                in_degree[neighbor] -= 1;
                if in_degree[neighbor] == 0 {
                    queue.push_back(neighbor);
                }
            }
        }

        result
    }
}
