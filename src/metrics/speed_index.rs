//! Speed index
//!
//! Both estimates use the whole page. The optimistic estimate is the speed
//! index observed in the recorded load; the pessimistic estimate weighs every
//! simulated layout task by how long it ran.
//!
//! # Coefficient Scaling
//!
//! The base coefficients were fitted at 150ms RTT. At 30ms RTT the observed
//! speed index is already a good estimator, so the coefficients slide toward
//! an even, intercept-free blend as RTT falls:
//!
//! ```text
//! m           = max((rtt - 30) / 120, 0)
//! intercept   = -250 × m
//! optimistic  = 0.5 + (1.4  - 0.5) × m
//! pessimistic = 0.5 + (0.65 - 0.5) × m
//! ```

use super::FirstContentfulPaint;
use crate::artifacts::{ArtifactSource, ComputedContext, MetricComputationData, ProcessedNavigation};
use crate::dependency_graph::DependencyGraph;
use crate::error::{EstimateError, Result};
use crate::lantern_metric::{
    compute_metric_with_graphs, ComputeExtras, Estimate, EstimateExtras, LanternMetric,
    MetricCoefficients, MetricKind, MetricResult,
};
use crate::node::{Node, NodeId};
use crate::simulator::{NodeTiming, SimulationResult};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Coefficients at the 150ms RTT reference point
pub const COEFFICIENTS: MetricCoefficients = MetricCoefficients::new(-250.0, 1.4, 0.65);

const BASELINE_RTT_MS: f64 = 30.0;
const REFERENCE_RTT_MS: f64 = 150.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct SpeedIndex;

impl SpeedIndex {
    /// Estimate speed index, memoized per page load
    pub async fn request<S: ArtifactSource>(
        data: &MetricComputationData,
        context: &ComputedContext<S>,
    ) -> Result<Arc<MetricResult>> {
        context
            .request_metric(MetricKind::SpeedIndex, data, || async {
                let fcp = FirstContentfulPaint::request(data, context).await?;
                let speedline = context.request_speedline(&data.trace).await?;
                let extras = ComputeExtras {
                    fcp_result: Some(Arc::clone(&fcp)),
                    speedline: Some(speedline),
                    ..ComputeExtras::default()
                };
                compute_metric_with_graphs(&SpeedIndex, data, context, extras).await
            })
            .await
    }

    /// Base coefficients scaled for `rtt_ms`
    pub fn scaled_coefficients(rtt_ms: f64) -> MetricCoefficients {
        let multiplier =
            ((rtt_ms - BASELINE_RTT_MS) / (REFERENCE_RTT_MS - BASELINE_RTT_MS)).max(0.0);
        MetricCoefficients::new(
            COEFFICIENTS.intercept * multiplier,
            0.5 + (COEFFICIENTS.optimistic - 0.5) * multiplier,
            0.5 + (COEFFICIENTS.pessimistic - 0.5) * multiplier,
        )
    }
}

/// Speed index approximated from simulated layout tasks
///
/// Each layout task contributes its end time (never earlier than `fcp_ms`),
/// weighted by `max(log2(duration), 0)`. Falls back to `fcp_ms` when no task
/// carries weight.
pub fn layout_based_speed_index(
    graph: &DependencyGraph,
    node_timings: &BTreeMap<NodeId, NodeTiming>,
    fcp_ms: f64,
) -> f64 {
    let mut weighted_time = 0.0;
    let mut total_weight = 0.0;

    for (id, timing) in node_timings {
        let Some(Node::Cpu(task)) = graph.node(*id) else {
            continue;
        };
        if !task.did_perform_layout() {
            continue;
        }
        let weight = timing.duration().log2().max(0.0);
        weighted_time += weight * timing.end_time.max(fcp_ms);
        total_weight += weight;
    }

    if total_weight == 0.0 {
        return fcp_ms;
    }
    weighted_time / total_weight
}

impl LanternMetric for SpeedIndex {
    fn kind(&self) -> MetricKind {
        MetricKind::SpeedIndex
    }

    fn coefficients(&self, rtt_ms: f64) -> MetricCoefficients {
        Self::scaled_coefficients(rtt_ms)
    }

    fn optimistic_graph(
        &self,
        graph: &Arc<DependencyGraph>,
        _navigation: &ProcessedNavigation,
    ) -> Result<Arc<DependencyGraph>> {
        Ok(Arc::clone(graph))
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
        let fcp = extras.extras.fcp_result.as_deref().ok_or_else(|| {
            EstimateError::contract(self.kind(), "first contentful paint result is required")
        })?;
        let speedline = extras
            .extras
            .speedline
            .ok_or_else(|| EstimateError::contract(self.kind(), "speedline is required"))?;

        let time_in_ms = if extras.optimistic {
            speedline.speed_index
        } else {
            layout_based_speed_index(
                extras.graph,
                &simulation.node_timings,
                fcp.pessimistic_estimate.time_in_ms,
            )
        };

        Ok(Estimate {
            time_in_ms,
            node_timings: simulation.node_timings,
        })
    }

    fn finalize(&self, result: MetricResult, extras: &ComputeExtras) -> Result<MetricResult> {
        let fcp = extras.fcp_result.as_deref().ok_or_else(|| {
            EstimateError::contract(self.kind(), "first contentful paint result is required")
        })?;
        Ok(result.with_timing_floor(fcp.timing))
    }
}
