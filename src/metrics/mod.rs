//! Concrete lantern metrics
//!
//! | Metric | Optimistic graph | Pessimistic graph | Coefficients |
//! |--------|------------------|-------------------|--------------|
//! | FCP | render-blocking, not script-initiated | render-blocking | 0, 0.5, 0.5 |
//! | FMP | as FCP, cut at FMP | as FCP + every layout task | 0, 0.5, 0.5 |
//! | Interactive | long tasks + important requests | full graph | 0, 0.45, 0.55 |
//! | Speed Index | full graph | full graph | RTT-scaled -250, 1.4, 0.65 |
//!
//! Dependent metrics request their prerequisites through the same
//! [`ComputedContext`], so asking for every metric of a page load computes
//! first contentful paint exactly once.

mod first_contentful_paint;
mod first_meaningful_paint;
mod first_paint;
mod interactive;
mod speed_index;

pub use first_contentful_paint::FirstContentfulPaint;
pub use first_meaningful_paint::FirstMeaningfulPaint;
pub use interactive::{last_long_task_end, Interactive};
pub use speed_index::{layout_based_speed_index, SpeedIndex};

use crate::artifacts::{ArtifactSource, ComputedContext, MetricComputationData};
use crate::error::Result;
use crate::lantern_metric::{MetricKind, MetricResult};
use std::sync::Arc;

/// Estimate (or fetch the cached estimate of) one metric
pub async fn request_metric<S: ArtifactSource>(
    kind: MetricKind,
    data: &MetricComputationData,
    context: &ComputedContext<S>,
) -> Result<Arc<MetricResult>> {
    match kind {
        MetricKind::FirstContentfulPaint => FirstContentfulPaint::request(data, context).await,
        MetricKind::FirstMeaningfulPaint => FirstMeaningfulPaint::request(data, context).await,
        MetricKind::Interactive => Interactive::request(data, context).await,
        MetricKind::SpeedIndex => SpeedIndex::request(data, context).await,
    }
}

/// Estimate several metrics of one page load, in the order given
///
/// Stops at the first failure.
pub async fn request_metrics<S: ArtifactSource>(
    kinds: &[MetricKind],
    data: &MetricComputationData,
    context: &ComputedContext<S>,
) -> Result<Vec<(MetricKind, Arc<MetricResult>)>> {
    let mut results = Vec::with_capacity(kinds.len());
    for &kind in kinds {
        results.push((kind, request_metric(kind, data, context).await?));
    }
    Ok(results)
}
