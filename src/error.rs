//! Error taxonomy for metric estimation
//!
//! Nothing here is recovered locally: every failure aborts the metric
//! computation for that page load and reaches the caller unchanged.

use crate::artifacts::GatherMode;
use crate::lantern_metric::MetricKind;
use std::fmt;
use thiserror::Error;

/// Collaborator stage a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamStage {
    DependencyGraph,
    ProcessedTrace,
    ProcessedNavigation,
    Simulator,
    Speedline,
    Simulation,
}

impl fmt::Display for UpstreamStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            UpstreamStage::DependencyGraph => "Dependency graph resolution",
            UpstreamStage::ProcessedTrace => "Trace processing",
            UpstreamStage::ProcessedNavigation => "Navigation processing",
            UpstreamStage::Simulator => "Simulator resolution",
            UpstreamStage::Speedline => "Speedline resolution",
            UpstreamStage::Simulation => "Simulation",
        };
        f.write_str(stage)
    }
}

/// Errors for metric estimation
#[derive(Error, Debug)]
pub enum EstimateError {
    #[error("Lantern metrics can only be computed on navigations, got {0} gather mode")]
    UnsupportedMode(GatherMode),

    #[error("{metric} violated the estimation contract: {reason}")]
    ContractViolation { metric: MetricKind, reason: String },

    #[error("Processed navigation has no {0} timestamp")]
    MissingNavigationMark(&'static str),

    #[error("{stage} failed: {source:#}")]
    Upstream {
        stage: UpstreamStage,
        #[source]
        source: anyhow::Error,
    },
}

impl EstimateError {
    pub(crate) fn upstream(stage: UpstreamStage) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| EstimateError::Upstream { stage, source }
    }

    pub(crate) fn contract(metric: MetricKind, reason: impl Into<String>) -> Self {
        EstimateError::ContractViolation {
            metric,
            reason: reason.into(),
        }
    }
}

/// Result type for metric estimation
pub type Result<T> = std::result::Result<T, EstimateError>;
