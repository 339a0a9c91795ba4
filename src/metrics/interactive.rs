//! Time to interactive
//!
//! The page is interactive once the last long main-thread task has finished,
//! and never before first meaningful paint.
//!
//! - **Optimistic graph:** long CPU tasks plus the requests that could feed
//!   them (scripts and high priority non-image requests)
//! - **Pessimistic graph:** the whole page

use super::FirstMeaningfulPaint;
use crate::artifacts::{ArtifactSource, ComputedContext, MetricComputationData, ProcessedNavigation};
use crate::dependency_graph::DependencyGraph;
use crate::error::{EstimateError, Result};
use crate::lantern_metric::{
    compute_metric_with_graphs, ComputeExtras, Estimate, EstimateExtras, LanternMetric,
    MetricCoefficients, MetricKind, MetricResult,
};
use crate::node::{Node, NodeId, Priority, ResourceType};
use crate::simulator::{NodeTiming, SimulationResult};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const COEFFICIENTS: MetricCoefficients = MetricCoefficients::new(0.0, 0.45, 0.55);

/// Main-thread tasks longer than this block input (ms)
pub const LONG_TASK_MS: f64 = 50.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct Interactive;

impl Interactive {
    /// Estimate time to interactive, memoized per page load
    pub async fn request<S: ArtifactSource>(
        data: &MetricComputationData,
        context: &ComputedContext<S>,
    ) -> Result<Arc<MetricResult>> {
        context
            .request_metric(MetricKind::Interactive, data, || async {
                let fmp = FirstMeaningfulPaint::request(data, context).await?;
                let extras = ComputeExtras {
                    fmp_result: Some(Arc::clone(&fmp)),
                    ..ComputeExtras::default()
                };
                compute_metric_with_graphs(&Interactive, data, context, extras).await
            })
            .await
    }
}

/// End of the last simulated CPU task longer than [`LONG_TASK_MS`]
///
/// Returns 0 when the simulation has no long task.
pub fn last_long_task_end(
    graph: &DependencyGraph,
    node_timings: &BTreeMap<NodeId, NodeTiming>,
) -> f64 {
    node_timings
        .iter()
        .filter(|(id, timing)| {
            matches!(graph.node(**id), Some(Node::Cpu(_))) && timing.duration() > LONG_TASK_MS
        })
        .map(|(_, timing)| timing.end_time)
        .fold(0.0, f64::max)
}

impl LanternMetric for Interactive {
    fn kind(&self) -> MetricKind {
        MetricKind::Interactive
    }

    fn coefficients(&self, _rtt_ms: f64) -> MetricCoefficients {
        COEFFICIENTS
    }

    fn optimistic_graph(
        &self,
        graph: &Arc<DependencyGraph>,
        _navigation: &ProcessedNavigation,
    ) -> Result<Arc<DependencyGraph>> {
        Ok(Arc::new(graph.clone_with_relationships(|node| match node {
            Node::Cpu(task) => task.duration() > LONG_TASK_MS,
            Node::Network(request) => {
                if request.resource_type == ResourceType::Image {
                    return false;
                }
                request.resource_type == ResourceType::Script
                    || matches!(request.priority, Priority::High | Priority::VeryHigh)
            }
        })))
    }

    fn pessimistic_graph(
        &self,
        graph: &Arc<DependencyGraph>,
        _navigation: &ProcessedNavigation,
    ) -> Result<Arc<DependencyGraph>> {
        Ok(Arc::clone(graph))
    }

    fn extract_estimate(
        &self,
        simulation: SimulationResult,
        extras: &EstimateExtras<'_>,
    ) -> Result<Estimate> {
        let fmp = extras.extras.fmp_result.as_deref().ok_or_else(|| {
            EstimateError::contract(self.kind(), "first meaningful paint result is required")
        })?;
        let fmp_time = extras.matching_estimate(fmp).time_in_ms;
        let long_task_end = last_long_task_end(extras.graph, &simulation.node_timings);

        Ok(Estimate {
            time_in_ms: long_task_end.max(fmp_time),
            node_timings: simulation.node_timings,
        })
    }

    fn finalize(&self, result: MetricResult, extras: &ComputeExtras) -> Result<MetricResult> {
        let fmp = extras.fmp_result.as_deref().ok_or_else(|| {
            EstimateError::contract(self.kind(), "first meaningful paint result is required")
        })?;
        Ok(result.with_timing_floor(fmp.timing))
    }
}
