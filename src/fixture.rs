//! Recorded page loads as JSON fixtures
//!
//! A fixture carries everything the estimator's collaborators would normally
//! derive from a trace: the dependency graph, the navigation marks and the
//! observed speed index. [`FixtureSource`] serves those artifacts to a
//! [`ComputedContext`](crate::artifacts::ComputedContext).
//!
//! # Format
//!
//! ```text
//! {
//!   "id": "example-page",
//!   "gather_mode": "navigation",
//!   "navigation": {"first_contentful_paint": 320.0, "first_meaningful_paint": 340.0},
//!   "speed_index": 900.0,
//!   "nodes": [{"kind": "network", "id": 1, ...}, {"kind": "cpu", "id": 2, ...}],
//!   "edges": [[1, 2]]
//! }
//! ```
//!
//! # Example
//!
//! ```
//! use lantern::fixture::PageLoadFixture;
//!
//! # fn main() -> anyhow::Result<()> {
//! let fixture = PageLoadFixture::from_json_str(r#"{
//!     "id": "tiny",
//!     "nodes": [{"kind": "network", "id": 1, "url": "https://example.com/",
//!                "resource_type": "Document", "is_main_document": true,
//!                "start_time": 0.0, "end_time": 120.0}]
//! }"#)?;
//!
//! assert_eq!(fixture.dependency_graph()?.node_count(), 1);
//! # Ok(())
//! # }
//! ```

use crate::artifacts::{
    ArtifactSource, GatherMode, MetricComputationData, NavigationTimestamps, ProcessedNavigation,
    ProcessedTrace, Speedline, Trace,
};
use crate::dependency_graph::{DependencyGraph, GraphBuilder, GraphError};
use crate::node::{Node, NodeId};
use crate::simulator::{CriticalPathSimulator, Simulator};
use crate::throttling::ThrottlingSettings;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// One recorded page load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLoadFixture {
    /// Trace identity; keys every cache
    pub id: String,
    #[serde(default)]
    pub gather_mode: GatherMode,
    /// Navigation start on the trace clock (ms)
    #[serde(default)]
    pub time_origin: f64,
    #[serde(default)]
    pub navigation: NavigationTimestamps,
    /// Speed index observed in the recorded load
    #[serde(default)]
    pub speed_index: Option<f64>,
    pub nodes: Vec<Node>,
    /// `(dependency, dependent)` pairs
    #[serde(default)]
    pub edges: Vec<(NodeId, NodeId)>,
}

impl PageLoadFixture {
    pub fn from_json_str(input: &str) -> Result<Self> {
        serde_json::from_str(input).context("Failed to parse page-load fixture")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        Self::from_json_str(&content).with_context(|| format!("Invalid fixture {}", path.display()))
    }

    pub fn trace(&self) -> Trace {
        Trace::new(self.id.clone())
    }

    pub fn dependency_graph(&self) -> std::result::Result<DependencyGraph, GraphError> {
        GraphBuilder::new()
            .nodes(self.nodes.iter().cloned())
            .edges(self.edges.iter().copied())
            .build()
    }

    /// Computation input for this page load under `settings`
    pub fn computation_data(&self, settings: ThrottlingSettings) -> MetricComputationData {
        MetricComputationData::new(self.trace(), settings).with_gather_mode(self.gather_mode)
    }
}

/// [`ArtifactSource`] serving a single fixture
///
/// Simulators are [`CriticalPathSimulator`]s built from the request's
/// throttling settings.
#[derive(Debug, Clone)]
pub struct FixtureSource {
    fixture: PageLoadFixture,
}

impl FixtureSource {
    pub fn new(fixture: PageLoadFixture) -> Self {
        Self { fixture }
    }

    pub fn fixture(&self) -> &PageLoadFixture {
        &self.fixture
    }

    fn check_trace(&self, trace_id: &str) -> Result<()> {
        if trace_id != self.fixture.id {
            bail!(
                "Fixture {} cannot serve trace {}",
                self.fixture.id,
                trace_id
            );
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactSource for FixtureSource {
    async fn page_dependency_graph(&self, data: &MetricComputationData) -> Result<DependencyGraph> {
        self.check_trace(&data.trace.id)?;
        let graph = self.fixture.dependency_graph()?;
        debug!(
            trace = %self.fixture.id,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Built dependency graph from fixture"
        );
        Ok(graph)
    }

    async fn processed_trace(&self, trace: &Trace) -> Result<ProcessedTrace> {
        self.check_trace(&trace.id)?;
        Ok(ProcessedTrace {
            trace_id: trace.id.clone(),
            time_origin: self.fixture.time_origin,
        })
    }

    async fn processed_navigation(
        &self,
        processed_trace: &ProcessedTrace,
    ) -> Result<ProcessedNavigation> {
        self.check_trace(&processed_trace.trace_id)?;
        Ok(ProcessedNavigation {
            timestamps: self.fixture.navigation.clone(),
        })
    }

    async fn load_simulator(&self, data: &MetricComputationData) -> Result<Arc<dyn Simulator>> {
        Ok(Arc::new(CriticalPathSimulator::new(data.settings.clone())?))
    }

    async fn speedline(&self, trace: &Trace) -> Result<Speedline> {
        self.check_trace(&trace.id)?;
        let speed_index = self
            .fixture
            .speed_index
            .with_context(|| format!("Fixture {} has no speed index", self.fixture.id))?;
        Ok(Speedline { speed_index })
    }
}
