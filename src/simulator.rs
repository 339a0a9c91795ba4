//! Load simulation over dependency graphs
//!
//! The estimator treats the simulator as a collaborator: anything implementing
//! [`Simulator`] can be plugged in. [`CriticalPathSimulator`] is the reference
//! implementation used by the CLI and the fixture-driven tests.
//!
//! # Algorithm: Longest Path with Request Ordering
//!
//! The graph is already stored in topological order (ties broken by recorded
//! start time), so a single forward pass schedules every node:
//!
//! ```text
//! for node in topological order:
//!     start[node] = max(end[dep] for dep in dependencies(node))
//!     if strict ordering and node is a request:
//!         start[node] = max(start[node], start[previous request])
//!     end[node] = start[node] + cost(node)
//! total = max(end)
//! ```
//!
//! Strict ordering keeps requests starting in the order they were recorded.
//! Flexible ordering drops that constraint, which can only move requests
//! earlier, so a flexible run is never slower than a strict run of the same
//! graph under this simulator.
//!
//! # Node Costs
//!
//! - **Network:** `rtt × (1 if the connection was reused, else 3) + bytes × 8 / kbps`
//! - **CPU:** `recorded duration × cpu_slowdown_multiplier`
//!
//! # Example
//!
//! ```
//! use lantern::dependency_graph::GraphBuilder;
//! use lantern::node::{NetworkNode, NodeId, ResourceType};
//! use lantern::simulator::{CriticalPathSimulator, SimulationOptions, Simulator};
//! use lantern::throttling::ThrottlingSettings;
//!
//! # fn main() -> anyhow::Result<()> {
//! let graph = GraphBuilder::new()
//!     .node(NetworkNode::new(NodeId(1), "https://example.com/", ResourceType::Document))
//!     .build()?;
//!
//! let simulator = CriticalPathSimulator::new(ThrottlingSettings::desktop_dense_4g())?;
//! let result = simulator.simulate(&graph, &SimulationOptions::strict("optimisticExample"))?;
//!
//! // New connection, zero bytes: three round trips
//! assert_eq!(result.time_in_ms, 120.0);
//! # Ok(())
//! # }
//! ```

use crate::dependency_graph::DependencyGraph;
use crate::node::{Node, NodeId};
use crate::throttling::ThrottlingSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Options for a single simulation run
///
/// Built fresh for every call; the label only feeds diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationOptions {
    pub label: String,
    pub flexible_ordering: bool,
}

impl SimulationOptions {
    /// Default (strict request-start) ordering
    pub fn strict(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            flexible_ordering: false,
        }
    }

    /// Relaxed ordering: requests may start as soon as their dependencies finish
    pub fn flexible(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            flexible_ordering: true,
        }
    }
}

/// Simulated start/end of one node (ms from navigation start)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeTiming {
    pub start_time: f64,
    pub end_time: f64,
}

impl NodeTiming {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Output of a simulation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    /// Simulated time until the last node finished
    pub time_in_ms: f64,
    /// Per-node simulated timings
    pub node_timings: BTreeMap<NodeId, NodeTiming>,
}

impl SimulationResult {
    /// A result carrying only a total time
    pub fn from_time(time_in_ms: f64) -> Self {
        Self {
            time_in_ms,
            node_timings: BTreeMap::new(),
        }
    }
}

/// Deterministic page-load simulator
///
/// Implementations must be pure functions of `(graph, options, configuration)`
/// and must not mutate the graph.
pub trait Simulator: fmt::Debug + Send + Sync {
    /// Configured round-trip time (ms)
    fn rtt(&self) -> f64;

    /// Simulate loading `graph`
    fn simulate(
        &self,
        graph: &DependencyGraph,
        options: &SimulationOptions,
    ) -> Result<SimulationResult>;
}

/// Reference simulator: longest path with optional strict request ordering
#[derive(Debug, Clone)]
pub struct CriticalPathSimulator {
    settings: ThrottlingSettings,
}

impl CriticalPathSimulator {
    /// Create a simulator, rejecting invalid throttling settings
    pub fn new(settings: ThrottlingSettings) -> Result<Self> {
        settings
            .validate()
            .map_err(anyhow::Error::msg)
            .context("Invalid simulator settings")?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &ThrottlingSettings {
        &self.settings
    }

    /// Simulated cost of a node (ms)
    pub fn node_cost(&self, node: &Node) -> f64 {
        match node {
            Node::Network(request) => {
                let round_trips = if request.connection_reused { 1.0 } else { 3.0 };
                let transfer_ms =
                    request.transfer_size as f64 * 8.0 / self.settings.throughput_kbps;
                self.settings.rtt_ms * round_trips + transfer_ms
            }
            Node::Cpu(task) => task.duration() * self.settings.cpu_slowdown_multiplier,
        }
    }
}

impl Simulator for CriticalPathSimulator {
    fn rtt(&self) -> f64 {
        self.settings.rtt_ms
    }

    fn simulate(
        &self,
        graph: &DependencyGraph,
        options: &SimulationOptions,
    ) -> Result<SimulationResult> {
        let mut node_timings: BTreeMap<NodeId, NodeTiming> = BTreeMap::new();
        let mut previous_request_start = 0.0_f64;
        let mut time_in_ms = 0.0_f64;

        for node in graph.nodes() {
            let mut start_time = 0.0_f64;
            for dependency in graph.dependencies(node.id()) {
                let timing = node_timings
                    .get(&dependency.id())
                    .with_context(|| format!("Dependency {} scheduled late", dependency.id()))?;
                start_time = start_time.max(timing.end_time);
            }

            if let Node::Network(_) = node {
                if !options.flexible_ordering {
                    start_time = start_time.max(previous_request_start);
                }
                previous_request_start = start_time;
            }

            let end_time = start_time + self.node_cost(node);
            time_in_ms = time_in_ms.max(end_time);
            node_timings.insert(
                node.id(),
                NodeTiming {
                    start_time,
                    end_time,
                },
            );
        }

        debug!(
            label = %options.label,
            flexible = options.flexible_ordering,
            nodes = graph.node_count(),
            time_in_ms,
            "Simulation complete"
        );

        Ok(SimulationResult {
            time_in_ms,
            node_timings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency_graph::GraphBuilder;
    use crate::node::{CpuNode, NetworkNode, ResourceType};

    fn settings() -> ThrottlingSettings {
        ThrottlingSettings {
            rtt_ms: 10.0,
            throughput_kbps: 8.0, // 1 byte per ms
            cpu_slowdown_multiplier: 2.0,
        }
    }

    fn request(id: u32, start: f64, bytes: u64) -> Node {
        NetworkNode::new(NodeId(id), format!("r{id}"), ResourceType::Script)
            .with_timing(start, start + 1.0)
            .with_transfer_size(bytes)
            .with_connection_reused(true)
            .into()
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let mut bad = settings();
        bad.throughput_kbps = 0.0;
        assert!(CriticalPathSimulator::new(bad).is_err());
    }

    #[test]
    fn test_node_costs() {
        let simulator = CriticalPathSimulator::new(settings()).unwrap();

        let reused = request(1, 0.0, 100);
        assert_eq!(simulator.node_cost(&reused), 10.0 + 100.0);

        let fresh: Node = NetworkNode::new(NodeId(2), "x", ResourceType::Document).into();
        assert_eq!(simulator.node_cost(&fresh), 30.0);

        let task: Node = CpuNode::new(NodeId(3), 5.0, 15.0).into();
        assert_eq!(simulator.node_cost(&task), 20.0);
    }

    #[test]
    fn test_linear_chain() {
        let graph = GraphBuilder::new()
            .node(request(1, 0.0, 0))
            .node(CpuNode::new(NodeId(2), 10.0, 15.0))
            .node(request(3, 20.0, 5))
            .edge(NodeId(1), NodeId(2))
            .edge(NodeId(2), NodeId(3))
            .build()
            .unwrap();

        let simulator = CriticalPathSimulator::new(settings()).unwrap();
        let result = simulator
            .simulate(&graph, &SimulationOptions::strict("chain"))
            .unwrap();

        // 10 (request) + 10 (cpu x2) + 15 (request)
        assert_eq!(result.time_in_ms, 35.0);
        assert_eq!(result.node_timings[&NodeId(2)].start_time, 10.0);
        assert_eq!(result.node_timings[&NodeId(3)].duration(), 15.0);
        assert_eq!(result.node_timings.len(), 3);
    }

    /// Root → long CPU task → late request; root → independent request recorded later.
    ///
    /// Strict ordering holds the independent request until the late one starts.
    fn reordering_graph() -> DependencyGraph {
        GraphBuilder::new()
            .node(request(1, 0.0, 0))
            .node(CpuNode::new(NodeId(2), 1.0, 51.0))
            .node(request(3, 2.0, 0))
            .node(request(4, 60.0, 0))
            .edge(NodeId(1), NodeId(2))
            .edge(NodeId(2), NodeId(3))
            .edge(NodeId(1), NodeId(4))
            .build()
            .unwrap()
    }

    #[test]
    fn test_flexible_ordering_never_slower() {
        let graph = reordering_graph();
        let simulator = CriticalPathSimulator::new(settings()).unwrap();

        let strict = simulator
            .simulate(&graph, &SimulationOptions::strict("strict"))
            .unwrap();
        let flexible = simulator
            .simulate(&graph, &SimulationOptions::flexible("flex"))
            .unwrap();

        assert!(flexible.time_in_ms <= strict.time_in_ms);
        // Request 4 starts right after the root when ordering is relaxed
        assert_eq!(flexible.node_timings[&NodeId(4)].start_time, 10.0);
        // ...but waits for request 3 (started at 10 + 100) under strict ordering
        assert_eq!(strict.node_timings[&NodeId(4)].start_time, 110.0);
        assert_eq!(strict.time_in_ms, 120.0);
    }

    #[test]
    fn test_simulation_is_deterministic() {
        let graph = reordering_graph();
        let simulator = CriticalPathSimulator::new(settings()).unwrap();
        let options = SimulationOptions::strict("repeat");

        let first = simulator.simulate(&graph, &options).unwrap();
        let second = simulator.simulate(&graph, &options).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rtt_exposed() {
        let simulator = CriticalPathSimulator::new(ThrottlingSettings::mobile_slow_4g()).unwrap();
        assert_eq!(simulator.rtt(), 150.0);
    }
}
