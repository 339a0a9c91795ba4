//! Metric reports for the command line
//!
//! One report per page load: the throttling profile it was estimated under and,
//! per metric, the blended timing with both underlying estimates.

use crate::lantern_metric::{Estimate, MetricKind, MetricResult};
use crate::throttling::ThrottlingSettings;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One side of an estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonEstimate {
    /// Estimated time (ms)
    pub time_in_ms: f64,
    /// Nodes in the simulated graph variant
    pub graph_nodes: usize,
    /// Nodes with a simulated timing
    pub simulated_nodes: usize,
}

impl JsonEstimate {
    fn new(estimate: &Estimate, graph_nodes: usize) -> Self {
        Self {
            time_in_ms: estimate.time_in_ms,
            graph_nodes,
            simulated_nodes: estimate.node_timings.len(),
        }
    }
}

/// A single metric estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonMetric {
    /// Metric name (e.g., "FirstContentfulPaint")
    pub metric: String,
    /// Blended estimate (ms)
    pub timing: f64,
    pub optimistic: JsonEstimate,
    pub pessimistic: JsonEstimate,
}

/// Root report structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReport {
    /// Crate version that produced the report
    pub version: String,
    /// Format name
    pub format: String,
    /// Page-load (trace) identifier
    pub page: String,
    pub throttling: ThrottlingSettings,
    pub metrics: Vec<JsonMetric>,
}

impl MetricReport {
    pub fn new(page: impl Into<String>, throttling: ThrottlingSettings) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "lantern-json-v1".to_string(),
            page: page.into(),
            throttling,
            metrics: Vec::new(),
        }
    }

    pub fn add_metric(&mut self, kind: MetricKind, result: &MetricResult) {
        self.metrics.push(JsonMetric {
            metric: kind.name().to_string(),
            timing: result.timing,
            optimistic: JsonEstimate::new(
                &result.optimistic_estimate,
                result.optimistic_graph.node_count(),
            ),
            pessimistic: JsonEstimate::new(
                &result.pessimistic_estimate,
                result.pessimistic_graph.node_count(),
            ),
        });
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render as an aligned text table
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MetricReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let throttling = &self.throttling;
        writeln!(
            f,
            "Page: {} (rtt {}ms, {} kbps, cpu x{})",
            self.page,
            throttling.rtt_ms,
            throttling.throughput_kbps,
            throttling.cpu_slowdown_multiplier
        )?;
        writeln!(
            f,
            "{:<22} {:>12} {:>12} {:>12}",
            "metric", "timing (ms)", "optimistic", "pessimistic"
        )?;
        for metric in &self.metrics {
            writeln!(
                f,
                "{:<22} {:>12.1} {:>12.1} {:>12.1}",
                metric.metric,
                metric.timing,
                metric.optimistic.time_in_ms,
                metric.pessimistic.time_in_ms
            )?;
        }
        Ok(())
    }
}
