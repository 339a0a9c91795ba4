// Integration Test Utilities
//
// Scripted collaborators for driving the estimator without a real simulator.
#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use lantern::artifacts::{
    ArtifactSource, MetricComputationData, NavigationTimestamps, ProcessedNavigation,
    ProcessedTrace, Speedline, Trace,
};
use lantern::dependency_graph::{DependencyGraph, GraphBuilder};
use lantern::error::{Result as EstimateResult, UpstreamStage};
use lantern::lantern_metric::{LanternMetric, MetricCoefficients, MetricKind};
use lantern::node::{CpuNode, NetworkNode, NodeId, ResourceType};
use lantern::simulator::{SimulationOptions, SimulationResult, Simulator};
use lantern::throttling::ThrottlingSettings;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const TRACE_ID: &str = "scripted-page";

/// Path to a file under tests/fixtures
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Simulator returning a scripted result per label
#[derive(Debug, Default)]
pub struct StubSimulator {
    rtt: f64,
    results: HashMap<String, SimulationResult>,
    calls: Mutex<Vec<SimulationOptions>>,
}

impl StubSimulator {
    pub fn new(rtt: f64) -> Self {
        Self {
            rtt,
            ..Default::default()
        }
    }

    pub fn with_result(mut self, label: &str, result: SimulationResult) -> Self {
        self.results.insert(label.to_string(), result);
        self
    }

    pub fn with_time(self, label: &str, time_in_ms: f64) -> Self {
        self.with_result(label, SimulationResult::from_time(time_in_ms))
    }

    /// Optimistic strict, optimistic flexible and pessimistic times for `metric`
    pub fn scripted(rtt: f64, metric: MetricKind, strict: f64, flex: f64, pessimistic: f64) -> Self {
        let name = metric.name();
        Self::new(rtt)
            .with_time(&format!("optimistic{name}"), strict)
            .with_time(&format!("optimisticFlex{name}"), flex)
            .with_time(&format!("pessimistic{name}"), pessimistic)
    }

    /// Options of every simulation run so far, in call order
    pub fn calls(&self) -> Vec<SimulationOptions> {
        self.calls.lock().unwrap().clone()
    }
}

impl Simulator for StubSimulator {
    fn rtt(&self) -> f64 {
        self.rtt
    }

    fn simulate(
        &self,
        _graph: &DependencyGraph,
        options: &SimulationOptions,
    ) -> Result<SimulationResult> {
        self.calls.lock().unwrap().push(options.clone());
        match self.results.get(&options.label) {
            Some(result) => Ok(result.clone()),
            None => bail!("no scripted result for {}", options.label),
        }
    }
}

/// Two-node page: document then a parse task
pub fn tiny_graph() -> DependencyGraph {
    GraphBuilder::new()
        .node(
            NetworkNode::new(NodeId(1), "https://example.com/", ResourceType::Document)
                .with_timing(0.0, 100.0)
                .as_main_document(),
        )
        .node(CpuNode::new(NodeId(2), 100.0, 150.0))
        .edge(NodeId(1), NodeId(2))
        .build()
        .unwrap()
}

/// Artifact source backed by [`StubSimulator`], counting every call
pub struct StubSource {
    pub simulator: Arc<StubSimulator>,
    pub calls: AtomicUsize,
    pub fail_stage: Option<UpstreamStage>,
}

impl StubSource {
    pub fn new(simulator: StubSimulator) -> Self {
        Self {
            simulator: Arc::new(simulator),
            calls: AtomicUsize::new(0),
            fail_stage: None,
        }
    }

    pub fn failing_at(mut self, stage: UpstreamStage) -> Self {
        self.fail_stage = Some(stage);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn visit(&self, stage: UpstreamStage) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_stage == Some(stage) {
            bail!("scripted {stage} failure");
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactSource for StubSource {
    async fn page_dependency_graph(&self, _data: &MetricComputationData) -> Result<DependencyGraph> {
        self.visit(UpstreamStage::DependencyGraph)?;
        Ok(tiny_graph())
    }

    async fn processed_trace(&self, trace: &Trace) -> Result<ProcessedTrace> {
        self.visit(UpstreamStage::ProcessedTrace)?;
        Ok(ProcessedTrace {
            trace_id: trace.id.clone(),
            time_origin: 0.0,
        })
    }

    async fn processed_navigation(
        &self,
        _processed_trace: &ProcessedTrace,
    ) -> Result<ProcessedNavigation> {
        self.visit(UpstreamStage::ProcessedNavigation)?;
        Ok(ProcessedNavigation {
            timestamps: NavigationTimestamps {
                first_contentful_paint: Some(150.0),
                ..Default::default()
            },
        })
    }

    async fn load_simulator(&self, _data: &MetricComputationData) -> Result<Arc<dyn Simulator>> {
        self.visit(UpstreamStage::Simulator)?;
        Ok(self.simulator.clone())
    }

    async fn speedline(&self, _trace: &Trace) -> Result<Speedline> {
        self.visit(UpstreamStage::Speedline)?;
        Ok(Speedline { speed_index: 1_000.0 })
    }
}

/// Metric with fixed coefficients and pass-through graphs
#[derive(Debug, Clone, Copy)]
pub struct FixedMetric {
    pub coefficients: MetricCoefficients,
}

impl FixedMetric {
    pub fn new(intercept: f64, optimistic: f64, pessimistic: f64) -> Self {
        Self {
            coefficients: MetricCoefficients::new(intercept, optimistic, pessimistic),
        }
    }
}

impl LanternMetric for FixedMetric {
    fn kind(&self) -> MetricKind {
        MetricKind::FirstContentfulPaint
    }

    fn coefficients(&self, _rtt_ms: f64) -> MetricCoefficients {
        self.coefficients
    }

    fn optimistic_graph(
        &self,
        graph: &Arc<DependencyGraph>,
        _navigation: &ProcessedNavigation,
    ) -> EstimateResult<Arc<DependencyGraph>> {
        Ok(Arc::clone(graph))
    }

    fn pessimistic_graph(
        &self,
        graph: &Arc<DependencyGraph>,
        _navigation: &ProcessedNavigation,
    ) -> EstimateResult<Arc<DependencyGraph>> {
        Ok(Arc::clone(graph))
    }
}

pub fn computation_data() -> MetricComputationData {
    MetricComputationData::new(Trace::new(TRACE_ID), ThrottlingSettings::default())
}
