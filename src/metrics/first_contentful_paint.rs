//! First contentful paint
//!
//! Both graphs are cut at the observed paint. The optimistic graph assumes
//! script-initiated requests never block rendering; the pessimistic graph
//! keeps every request with a render-blocking priority.

use super::first_paint::{first_paint_based_graph, PaintCutoff};
use crate::artifacts::{ArtifactSource, ComputedContext, MetricComputationData, ProcessedNavigation};
use crate::dependency_graph::DependencyGraph;
use crate::error::Result;
use crate::lantern_metric::{
    compute_metric_with_graphs, ComputeExtras, LanternMetric, MetricCoefficients, MetricKind,
    MetricResult,
};
use crate::node::{InitiatorType, NetworkNode};
use std::sync::Arc;

pub const COEFFICIENTS: MetricCoefficients = MetricCoefficients::new(0.0, 0.5, 0.5);

#[derive(Debug, Clone, Copy, Default)]
pub struct FirstContentfulPaint;

impl FirstContentfulPaint {
    /// Estimate first contentful paint, memoized per page load
    pub async fn request<S: ArtifactSource>(
        data: &MetricComputationData,
        context: &ComputedContext<S>,
    ) -> Result<Arc<MetricResult>> {
        context
            .request_metric(MetricKind::FirstContentfulPaint, data, || {
                compute_metric_with_graphs(
                    &FirstContentfulPaint,
                    data,
                    context,
                    ComputeExtras::default(),
                )
            })
            .await
    }
}

fn paint_graph(
    graph: &DependencyGraph,
    cutoff: f64,
    treat_as_render_blocking: &dyn Fn(&NetworkNode) -> bool,
) -> Arc<DependencyGraph> {
    Arc::new(first_paint_based_graph(
        graph,
        &PaintCutoff {
            cutoff,
            treat_as_render_blocking,
            additional_blocking_cpu: None,
        },
    ))
}

impl LanternMetric for FirstContentfulPaint {
    fn kind(&self) -> MetricKind {
        MetricKind::FirstContentfulPaint
    }

    fn coefficients(&self, _rtt_ms: f64) -> MetricCoefficients {
        COEFFICIENTS
    }

    fn optimistic_graph(
        &self,
        graph: &Arc<DependencyGraph>,
        navigation: &ProcessedNavigation,
    ) -> Result<Arc<DependencyGraph>> {
        let cutoff = navigation.first_contentful_paint()?;
        Ok(paint_graph(graph, cutoff, &|request: &NetworkNode| {
            request.has_render_blocking_priority()
                && request.initiator_type != InitiatorType::Script
        }))
    }

    fn pessimistic_graph(
        &self,
        graph: &Arc<DependencyGraph>,
        navigation: &ProcessedNavigation,
    ) -> Result<Arc<DependencyGraph>> {
        let cutoff = navigation.first_contentful_paint()?;
        Ok(paint_graph(graph, cutoff, &|request: &NetworkNode| {
            request.has_render_blocking_priority()
        }))
    }
}
