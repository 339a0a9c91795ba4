//! First meaningful paint
//!
//! Same graph shape as first contentful paint, cut at the meaningful paint.
//! The pessimistic graph also keeps every layout task before the cut. The
//! final timing never drops below the first contentful paint estimate.

use super::first_paint::{first_paint_based_graph, PaintCutoff};
use super::FirstContentfulPaint;
use crate::artifacts::{ArtifactSource, ComputedContext, MetricComputationData, ProcessedNavigation};
use crate::dependency_graph::DependencyGraph;
use crate::error::{EstimateError, Result};
use crate::lantern_metric::{
    compute_metric_with_graphs, ComputeExtras, LanternMetric, MetricCoefficients, MetricKind,
    MetricResult,
};
use crate::node::{CpuNode, InitiatorType, NetworkNode};
use std::sync::Arc;

pub const COEFFICIENTS: MetricCoefficients = MetricCoefficients::new(0.0, 0.5, 0.5);

#[derive(Debug, Clone, Copy, Default)]
pub struct FirstMeaningfulPaint;

impl FirstMeaningfulPaint {
    /// Estimate first meaningful paint, memoized per page load
    pub async fn request<S: ArtifactSource>(
        data: &MetricComputationData,
        context: &ComputedContext<S>,
    ) -> Result<Arc<MetricResult>> {
        context
            .request_metric(MetricKind::FirstMeaningfulPaint, data, || async {
                let fcp = FirstContentfulPaint::request(data, context).await?;
                let extras = ComputeExtras {
                    fcp_result: Some(fcp),
                    ..ComputeExtras::default()
                };
                compute_metric_with_graphs(&FirstMeaningfulPaint, data, context, extras).await
            })
            .await
    }
}

impl LanternMetric for FirstMeaningfulPaint {
    fn kind(&self) -> MetricKind {
        MetricKind::FirstMeaningfulPaint
    }

    fn coefficients(&self, _rtt_ms: f64) -> MetricCoefficients {
        COEFFICIENTS
    }

    fn optimistic_graph(
        &self,
        graph: &Arc<DependencyGraph>,
        navigation: &ProcessedNavigation,
    ) -> Result<Arc<DependencyGraph>> {
        let cutoff = navigation.first_meaningful_paint()?;
        let treat = |request: &NetworkNode| {
            request.has_render_blocking_priority()
                && request.initiator_type != InitiatorType::Script
        };
        Ok(Arc::new(first_paint_based_graph(
            graph,
            &PaintCutoff {
                cutoff,
                treat_as_render_blocking: &treat,
                additional_blocking_cpu: None,
            },
        )))
    }

    fn pessimistic_graph(
        &self,
        graph: &Arc<DependencyGraph>,
        navigation: &ProcessedNavigation,
    ) -> Result<Arc<DependencyGraph>> {
        let cutoff = navigation.first_meaningful_paint()?;
        let treat = |request: &NetworkNode| request.has_render_blocking_priority();
        let layout = |task: &CpuNode| task.did_perform_layout();
        Ok(Arc::new(first_paint_based_graph(
            graph,
            &PaintCutoff {
                cutoff,
                treat_as_render_blocking: &treat,
                additional_blocking_cpu: Some(&layout),
            },
        )))
    }

    fn finalize(&self, result: MetricResult, extras: &ComputeExtras) -> Result<MetricResult> {
        let fcp = extras.fcp_result.as_deref().ok_or_else(|| {
            EstimateError::contract(self.kind(), "first contentful paint result is required")
        })?;
        Ok(result.with_timing_floor(fcp.timing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::test_support::{page_graph, processed_navigation, sorted_ids};
    use crate::simulator::SimulationResult;

    #[test]
    fn test_optimistic_graph_keeps_first_layout_only() {
        let graph = Arc::new(page_graph());
        let optimistic = FirstMeaningfulPaint
            .optimistic_graph(&graph, &processed_navigation())
            .unwrap();

        assert_eq!(sorted_ids(&optimistic), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_pessimistic_graph_keeps_all_layouts() {
        let graph = Arc::new(page_graph());
        let pessimistic = FirstMeaningfulPaint
            .pessimistic_graph(&graph, &processed_navigation())
            .unwrap();

        assert_eq!(sorted_ids(&pessimistic), vec![1, 2, 3, 4, 5, 6, 11, 12]);
    }

    #[test]
    fn test_missing_meaningful_paint_mark() {
        let graph = Arc::new(page_graph());
        let mut navigation = processed_navigation();
        navigation.timestamps.first_meaningful_paint = None;

        let err = FirstMeaningfulPaint
            .pessimistic_graph(&graph, &navigation)
            .unwrap_err();
        assert!(matches!(
            err,
            EstimateError::MissingNavigationMark("firstMeaningfulPaint")
        ));
    }

    fn paint_result(timing: f64) -> MetricResult {
        let graph = Arc::new(page_graph());
        MetricResult {
            timing,
            optimistic_estimate: SimulationResult::from_time(timing).into(),
            pessimistic_estimate: SimulationResult::from_time(timing).into(),
            optimistic_graph: Arc::clone(&graph),
            pessimistic_graph: graph,
        }
    }

    #[test]
    fn test_finalize_floors_at_contentful_paint() {
        let extras = ComputeExtras {
            fcp_result: Some(Arc::new(paint_result(500.0))),
            ..ComputeExtras::default()
        };

        let floored = FirstMeaningfulPaint
            .finalize(paint_result(420.0), &extras)
            .unwrap();
        assert_eq!(floored.timing, 500.0);

        let kept = FirstMeaningfulPaint
            .finalize(paint_result(640.0), &extras)
            .unwrap();
        assert_eq!(kept.timing, 640.0);
    }

    #[test]
    fn test_finalize_requires_contentful_paint() {
        let err = FirstMeaningfulPaint
            .finalize(paint_result(420.0), &ComputeExtras::default())
            .unwrap_err();
        assert!(matches!(
            err,
            EstimateError::ContractViolation {
                metric: MetricKind::FirstMeaningfulPaint,
                ..
            }
        ));
    }
}
