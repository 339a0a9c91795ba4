//! Optimistic/pessimistic metric estimation
//!
//! A lantern metric predicts a lab timing (first contentful paint, time to
//! interactive, ...) without replaying the page under throttling. Each metric
//! supplies a [`LanternMetric`] strategy; [`compute_metric_with_graphs`] runs the
//! shared template:
//!
//! ```text
//!                    ┌──────────────────────┐
//!   dependency ─────►│ optimistic_graph()   │──► simulate (strict) ───┐
//!   graph        │   └──────────────────────┘──► simulate (flexible) ─┴─► lower time
//!                │   ┌──────────────────────┐                                 │
//!                └──►│ pessimistic_graph()  │──► simulate (strict) ──┐        │
//!                    └──────────────────────┘                        ▼        ▼
//!                                                           extract_estimate() x2
//!                                                                    │
//!                                        coefficients(rtt) ─────────►│ blend
//!                                                                    ▼
//!                                                              MetricResult
//! ```
//!
//! # Blending
//!
//! ```text
//! multiplier = min(1, optimistic_ms / 1000)   if intercept > 0
//!            = 1                              otherwise
//! timing     = intercept × multiplier
//!            + optimistic_weight × optimistic_ms
//!            + pessimistic_weight × pessimistic_ms
//! ```
//!
//! The regression intercept was fitted on loads of a second or more; below
//! that it is scaled down linearly so fast pages are not over-predicted.

use crate::artifacts::{
    ArtifactSource, ComputedContext, GatherMode, MetricComputationData, ProcessedNavigation,
    Speedline,
};
use crate::dependency_graph::DependencyGraph;
use crate::error::{EstimateError, Result, UpstreamStage};
use crate::node::{Node, NetworkNode, NodeId, ResourceType};
use crate::simulator::{NodeTiming, SimulationOptions, SimulationResult, Simulator};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Metrics with a lantern estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricKind {
    FirstContentfulPaint,
    FirstMeaningfulPaint,
    Interactive,
    SpeedIndex,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::FirstContentfulPaint,
        MetricKind::FirstMeaningfulPaint,
        MetricKind::Interactive,
        MetricKind::SpeedIndex,
    ];

    /// Name used in simulation labels (`optimistic<Name>`, ...)
    pub fn name(self) -> &'static str {
        match self {
            MetricKind::FirstContentfulPaint => "FirstContentfulPaint",
            MetricKind::FirstMeaningfulPaint => "FirstMeaningfulPaint",
            MetricKind::Interactive => "Interactive",
            MetricKind::SpeedIndex => "SpeedIndex",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Linear regression coefficients blending the two estimates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricCoefficients {
    pub intercept: f64,
    pub optimistic: f64,
    pub pessimistic: f64,
}

impl MetricCoefficients {
    pub const fn new(intercept: f64, optimistic: f64, pessimistic: f64) -> Self {
        Self {
            intercept,
            optimistic,
            pessimistic,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.intercept.is_finite() && self.optimistic.is_finite() && self.pessimistic.is_finite()
    }

    /// Scale applied to a positive intercept
    ///
    /// ```
    /// use lantern::lantern_metric::MetricCoefficients;
    ///
    /// let coefficients = MetricCoefficients::new(300.0, 0.5, 0.5);
    /// assert_eq!(coefficients.intercept_multiplier(500.0), 0.5);
    /// assert_eq!(coefficients.intercept_multiplier(2500.0), 1.0);
    /// ```
    pub fn intercept_multiplier(&self, optimistic_ms: f64) -> f64 {
        if self.intercept > 0.0 {
            (optimistic_ms / 1000.0).min(1.0)
        } else {
            1.0
        }
    }

    /// Blend optimistic and pessimistic timings into the final estimate
    pub fn blend(&self, optimistic_ms: f64, pessimistic_ms: f64) -> f64 {
        self.intercept * self.intercept_multiplier(optimistic_ms)
            + self.optimistic * optimistic_ms
            + self.pessimistic * pessimistic_ms
    }
}

/// Public estimate shape derived from one simulation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimate {
    pub time_in_ms: f64,
    pub node_timings: BTreeMap<NodeId, NodeTiming>,
}

impl From<SimulationResult> for Estimate {
    fn from(result: SimulationResult) -> Self {
        Self {
            time_in_ms: result.time_in_ms,
            node_timings: result.node_timings,
        }
    }
}

/// Metric-specific side inputs passed through `compute` unchanged
#[derive(Debug, Clone, Default)]
pub struct ComputeExtras {
    pub fcp_result: Option<Arc<MetricResult>>,
    pub fmp_result: Option<Arc<MetricResult>>,
    pub speedline: Option<Speedline>,
}

/// What `extract_estimate` sees besides the raw simulation
#[derive(Debug, Clone, Copy)]
pub struct EstimateExtras<'a> {
    /// Whether this is the optimistic estimate
    pub optimistic: bool,
    /// The graph variant that was simulated
    pub graph: &'a DependencyGraph,
    pub extras: &'a ComputeExtras,
}

impl EstimateExtras<'_> {
    /// The sibling metric's estimate on the same side (optimistic/pessimistic)
    pub fn matching_estimate<'r>(&self, sibling: &'r MetricResult) -> &'r Estimate {
        if self.optimistic {
            &sibling.optimistic_estimate
        } else {
            &sibling.pessimistic_estimate
        }
    }
}

/// Result of one lantern computation
#[derive(Debug, Clone)]
pub struct MetricResult {
    /// Final blended estimate (ms)
    pub timing: f64,
    pub optimistic_estimate: Estimate,
    pub pessimistic_estimate: Estimate,
    pub optimistic_graph: Arc<DependencyGraph>,
    pub pessimistic_graph: Arc<DependencyGraph>,
}

impl MetricResult {
    /// Raise `timing` to at least `floor`
    pub fn with_timing_floor(mut self, floor: f64) -> Self {
        self.timing = self.timing.max(floor);
        self
    }
}

/// Per-metric estimation strategy
///
/// `coefficients` and both graph builders are required. `extract_estimate`
/// passes the simulation through unless a metric needs to post-process it.
pub trait LanternMetric: Send + Sync {
    fn kind(&self) -> MetricKind;

    /// Regression coefficients, optionally scaled by the simulated RTT
    ///
    /// Must be a pure function of `rtt_ms`.
    fn coefficients(&self, rtt_ms: f64) -> MetricCoefficients;

    /// Best-case variant of `graph`; must not mutate `graph`
    fn optimistic_graph(
        &self,
        graph: &Arc<DependencyGraph>,
        navigation: &ProcessedNavigation,
    ) -> Result<Arc<DependencyGraph>>;

    /// Worst-case variant of `graph`; must not mutate `graph`
    fn pessimistic_graph(
        &self,
        graph: &Arc<DependencyGraph>,
        navigation: &ProcessedNavigation,
    ) -> Result<Arc<DependencyGraph>>;

    fn extract_estimate(
        &self,
        simulation: SimulationResult,
        _extras: &EstimateExtras<'_>,
    ) -> Result<Estimate> {
        Ok(simulation.into())
    }

    /// Final adjustment of the blended result
    ///
    /// Metrics that can never precede a prerequisite metric raise `timing` to
    /// it here. The default returns `result` unchanged.
    fn finalize(&self, result: MetricResult, _extras: &ComputeExtras) -> Result<MetricResult> {
        Ok(result)
    }
}

/// Choose between strict and flexible optimistic simulations
///
/// Flexible ordering is an alternate schedule, not a guaranteed-better one:
/// it is used only when strictly faster. Ties keep strict ordering.
pub fn select_optimistic(strict: SimulationResult, flexible: SimulationResult) -> SimulationResult {
    if flexible.time_in_ms < strict.time_in_ms {
        debug!(
            strict = strict.time_in_ms,
            flexible = flexible.time_in_ms,
            "Flexible ordering beat strict ordering"
        );
        flexible
    } else {
        strict
    }
}

fn run_simulation(
    simulator: &dyn Simulator,
    graph: &DependencyGraph,
    options: SimulationOptions,
) -> Result<SimulationResult> {
    let result = simulator
        .simulate(graph, &options)
        .map_err(EstimateError::upstream(UpstreamStage::Simulation))?;
    debug!(label = %options.label, time_in_ms = result.time_in_ms, "Simulated graph variant");
    Ok(result)
}

fn check_estimate(kind: MetricKind, side: &str, estimate: &Estimate) -> Result<()> {
    if !estimate.time_in_ms.is_finite() || estimate.time_in_ms < 0.0 {
        return Err(EstimateError::contract(
            kind,
            format!("{side} estimate must be a non-negative time, got {}", estimate.time_in_ms),
        ));
    }
    Ok(())
}

/// Estimate `metric` for the page load described by `data`
///
/// The blended timing passes through [`LanternMetric::finalize`] before it is
/// returned, so prerequisite floors hold for direct callers too.
///
/// # Errors
///
/// - [`EstimateError::UnsupportedMode`] for non-navigation gather contexts,
///   before any collaborator is consulted
/// - [`EstimateError::Upstream`] when a collaborator or a simulation fails
/// - [`EstimateError::ContractViolation`] when the strategy yields unusable
///   coefficients or estimates
/// - [`EstimateError::MissingNavigationMark`] when a graph builder needs a
///   navigation mark the page load lacks
pub async fn compute_metric_with_graphs<M, S>(
    metric: &M,
    data: &MetricComputationData,
    context: &ComputedContext<S>,
    extras: ComputeExtras,
) -> Result<MetricResult>
where
    M: LanternMetric + ?Sized,
    S: ArtifactSource,
{
    let gather_mode = data.gather_mode();
    if gather_mode != GatherMode::Navigation {
        return Err(EstimateError::UnsupportedMode(gather_mode));
    }

    let kind = metric.kind();
    let name = kind.name();

    let graph = context.request_graph(data).await?;
    let processed_trace = context.request_processed_trace(&data.trace).await?;
    let navigation = context.request_processed_navigation(&processed_trace).await?;
    let simulator = context.request_simulator(data).await?;

    let optimistic_graph = metric.optimistic_graph(&graph, &navigation)?;
    let pessimistic_graph = metric.pessimistic_graph(&graph, &navigation)?;

    let optimistic_simulation = run_simulation(
        simulator.as_ref(),
        &optimistic_graph,
        SimulationOptions::strict(format!("optimistic{name}")),
    )?;
    let optimistic_flex_simulation = run_simulation(
        simulator.as_ref(),
        &optimistic_graph,
        SimulationOptions::flexible(format!("optimisticFlex{name}")),
    )?;
    let pessimistic_simulation = run_simulation(
        simulator.as_ref(),
        &pessimistic_graph,
        SimulationOptions::strict(format!("pessimistic{name}")),
    )?;

    let optimistic_estimate = metric.extract_estimate(
        select_optimistic(optimistic_simulation, optimistic_flex_simulation),
        &EstimateExtras {
            optimistic: true,
            graph: &optimistic_graph,
            extras: &extras,
        },
    )?;
    let pessimistic_estimate = metric.extract_estimate(
        pessimistic_simulation,
        &EstimateExtras {
            optimistic: false,
            graph: &pessimistic_graph,
            extras: &extras,
        },
    )?;
    check_estimate(kind, "optimistic", &optimistic_estimate)?;
    check_estimate(kind, "pessimistic", &pessimistic_estimate)?;

    let coefficients = metric.coefficients(simulator.rtt());
    if !coefficients.is_finite() {
        return Err(EstimateError::contract(
            kind,
            format!("coefficients must be finite, got {coefficients:?}"),
        ));
    }

    let timing = coefficients.blend(
        optimistic_estimate.time_in_ms,
        pessimistic_estimate.time_in_ms,
    );

    let result = metric.finalize(
        MetricResult {
            timing,
            optimistic_estimate,
            pessimistic_estimate,
            optimistic_graph,
            pessimistic_graph,
        },
        &extras,
    )?;

    info!(
        metric = name,
        timing = result.timing,
        optimistic = result.optimistic_estimate.time_in_ms,
        pessimistic = result.pessimistic_estimate.time_in_ms,
        "Lantern metric estimated"
    );

    Ok(result)
}

/// URLs of every script request in `graph`
///
/// CPU nodes and non-script requests are skipped; `condition`, when given,
/// further filters script requests. Duplicate URLs collapse.
///
/// ```
/// use lantern::dependency_graph::GraphBuilder;
/// use lantern::lantern_metric::get_script_urls;
/// use lantern::node::{NetworkNode, NodeId, ResourceType};
///
/// # fn main() -> anyhow::Result<()> {
/// let graph = GraphBuilder::new()
///     .node(NetworkNode::new(NodeId(1), "index.html", ResourceType::Document))
///     .node(NetworkNode::new(NodeId(2), "app.js", ResourceType::Script))
///     .edge(NodeId(1), NodeId(2))
///     .build()?;
///
/// let urls = get_script_urls(&graph, None);
/// assert!(urls.contains("app.js"));
/// assert_eq!(urls.len(), 1);
/// # Ok(())
/// # }
/// ```
pub fn get_script_urls(
    graph: &DependencyGraph,
    condition: Option<&dyn Fn(&NetworkNode) -> bool>,
) -> HashSet<String> {
    let mut script_urls = HashSet::new();

    graph.traverse(|node| {
        let Node::Network(request) = node else {
            return;
        };
        if request.resource_type != ResourceType::Script {
            return;
        }
        if let Some(condition) = condition {
            if !condition(request) {
                return;
            }
        }
        script_urls.insert(request.url.clone());
    });

    script_urls
}
