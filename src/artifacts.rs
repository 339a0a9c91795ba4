//! Collaborator artifacts and the memoizing computation context
//!
//! Metric estimation consumes four upstream artifacts per page load (the
//! dependency graph, the processed trace, the processed navigation and a
//! simulator), plus the observed speedline for speed index. Producing them is
//! the job of an [`ArtifactSource`]; [`ComputedContext`] wraps a source with an
//! explicit per-page-load cache so every artifact is produced once, no matter
//! how many metrics ask for it.
//!
//! ```text
//! compute_metric_with_graphs ──► ComputedContext ──(miss)──► ArtifactSource
//!                                     │                          │
//!                                     └──────(hit)◄── cache ◄────┘
//! ```

use crate::dependency_graph::DependencyGraph;
use crate::error::{EstimateError, Result, UpstreamStage};
use crate::lantern_metric::{MetricKind, MetricResult};
use crate::simulator::Simulator;
use crate::throttling::ThrottlingSettings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// How the page load was gathered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GatherMode {
    #[default]
    Navigation,
    Timespan,
    Snapshot,
}

impl fmt::Display for GatherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self {
            GatherMode::Navigation => "navigation",
            GatherMode::Timespan => "timespan",
            GatherMode::Snapshot => "snapshot",
        };
        f.write_str(mode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GatherContext {
    pub gather_mode: GatherMode,
}

/// Handle to a recorded page-load trace
///
/// The trace contents belong to the trace-processing collaborator; the
/// estimator only needs a stable identity to key its caches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trace {
    pub id: String,
}

impl Trace {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedTrace {
    pub trace_id: String,
    /// Navigation start on the trace clock (ms)
    pub time_origin: f64,
}

/// Navigation marks on the graph timebase (ms)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationTimestamps {
    #[serde(default)]
    pub first_contentful_paint: Option<f64>,
    #[serde(default)]
    pub first_meaningful_paint: Option<f64>,
    #[serde(default)]
    pub largest_contentful_paint: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedNavigation {
    pub timestamps: NavigationTimestamps,
}

impl ProcessedNavigation {
    pub fn first_contentful_paint(&self) -> Result<f64> {
        self.timestamps
            .first_contentful_paint
            .ok_or(EstimateError::MissingNavigationMark("firstContentfulPaint"))
    }

    pub fn first_meaningful_paint(&self) -> Result<f64> {
        self.timestamps
            .first_meaningful_paint
            .ok_or(EstimateError::MissingNavigationMark("firstMeaningfulPaint"))
    }
}

/// Visual progress observed in the recorded (unthrottled) load
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Speedline {
    pub speed_index: f64,
}

/// Input to a metric computation
#[derive(Debug, Clone)]
pub struct MetricComputationData {
    pub trace: Trace,
    /// Missing context is treated as a navigation
    pub gather_context: Option<GatherContext>,
    /// Caller-supplied simulator; takes precedence over the context's
    pub simulator: Option<Arc<dyn Simulator>>,
    pub settings: ThrottlingSettings,
}

impl MetricComputationData {
    pub fn new(trace: Trace, settings: ThrottlingSettings) -> Self {
        Self {
            trace,
            gather_context: None,
            simulator: None,
            settings,
        }
    }

    pub fn with_gather_mode(mut self, gather_mode: GatherMode) -> Self {
        self.gather_context = Some(GatherContext { gather_mode });
        self
    }

    pub fn with_simulator(mut self, simulator: Arc<dyn Simulator>) -> Self {
        self.simulator = Some(simulator);
        self
    }

    pub fn gather_mode(&self) -> GatherMode {
        self.gather_context
            .map(|context| context.gather_mode)
            .unwrap_or_default()
    }
}

/// Producer of the upstream artifacts a metric needs
///
/// Implementations do the real work (graph building, trace processing,
/// simulator construction); [`ComputedContext`] takes care of memoization.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn page_dependency_graph(
        &self,
        data: &MetricComputationData,
    ) -> anyhow::Result<DependencyGraph>;

    async fn processed_trace(&self, trace: &Trace) -> anyhow::Result<ProcessedTrace>;

    async fn processed_navigation(
        &self,
        processed_trace: &ProcessedTrace,
    ) -> anyhow::Result<ProcessedNavigation>;

    async fn load_simulator(
        &self,
        data: &MetricComputationData,
    ) -> anyhow::Result<Arc<dyn Simulator>>;

    async fn speedline(&self, trace: &Trace) -> anyhow::Result<Speedline>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keyed memo table
#[derive(Debug)]
struct Memo<K, V> {
    entries: Mutex<HashMap<K, V>>,
}

impl<K: Eq + Hash, V: Clone> Memo<K, V> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, key: &K) -> Option<V> {
        lock(&self.entries).get(key).cloned()
    }

    fn insert(&self, key: K, value: V) {
        lock(&self.entries).insert(key, value);
    }

    fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Return the cached value or produce, cache and return it
    ///
    /// The lock is never held across the await, so concurrent misses on the
    /// same key each run `produce` and the last one to finish is kept. Callers
    /// in this crate resolve artifacts sequentially. Failures are not cached.
    async fn get_or_try_insert<F, Fut, E>(&self, key: K, produce: F) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = produce().await?;
        self.insert(key, value.clone());
        Ok(value)
    }
}

/// Metric results depend on the page load and the throttling it is simulated under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MetricKey {
    trace_id: String,
    throttling: String,
    kind: MetricKind,
}

/// Per-page-load cache in front of an [`ArtifactSource`]
///
/// Handed explicitly to every computation; there is no ambient global cache.
pub struct ComputedContext<S> {
    source: S,
    graphs: Memo<String, Arc<DependencyGraph>>,
    traces: Memo<String, Arc<ProcessedTrace>>,
    navigations: Memo<String, Arc<ProcessedNavigation>>,
    simulators: Memo<String, Arc<dyn Simulator>>,
    speedlines: Memo<String, Speedline>,
    metrics: Memo<MetricKey, Arc<MetricResult>>,
}

impl<S: ArtifactSource> ComputedContext<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            graphs: Memo::new(),
            traces: Memo::new(),
            navigations: Memo::new(),
            simulators: Memo::new(),
            speedlines: Memo::new(),
            metrics: Memo::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn request_graph(&self, data: &MetricComputationData) -> Result<Arc<DependencyGraph>> {
        self.graphs
            .get_or_try_insert(data.trace.id.clone(), || async {
                trace!(trace = %data.trace.id, "Building page dependency graph");
                self.source
                    .page_dependency_graph(data)
                    .await
                    .map(Arc::new)
                    .map_err(EstimateError::upstream(UpstreamStage::DependencyGraph))
            })
            .await
    }

    pub async fn request_processed_trace(&self, trace: &Trace) -> Result<Arc<ProcessedTrace>> {
        self.traces
            .get_or_try_insert(trace.id.clone(), || async {
                self.source
                    .processed_trace(trace)
                    .await
                    .map(Arc::new)
                    .map_err(EstimateError::upstream(UpstreamStage::ProcessedTrace))
            })
            .await
    }

    pub async fn request_processed_navigation(
        &self,
        processed_trace: &ProcessedTrace,
    ) -> Result<Arc<ProcessedNavigation>> {
        self.navigations
            .get_or_try_insert(processed_trace.trace_id.clone(), || async {
                self.source
                    .processed_navigation(processed_trace)
                    .await
                    .map(Arc::new)
                    .map_err(EstimateError::upstream(UpstreamStage::ProcessedNavigation))
            })
            .await
    }

    /// Simulator for `data`; a simulator carried on `data` wins
    pub async fn request_simulator(&self, data: &MetricComputationData) -> Result<Arc<dyn Simulator>> {
        if let Some(simulator) = &data.simulator {
            return Ok(Arc::clone(simulator));
        }

        let key = format!("{}@{}", data.trace.id, data.settings.cache_key());
        self.simulators
            .get_or_try_insert(key, || async {
                self.source
                    .load_simulator(data)
                    .await
                    .map_err(EstimateError::upstream(UpstreamStage::Simulator))
            })
            .await
    }

    pub async fn request_speedline(&self, trace: &Trace) -> Result<Speedline> {
        self.speedlines
            .get_or_try_insert(trace.id.clone(), || async {
                self.source
                    .speedline(trace)
                    .await
                    .map_err(EstimateError::upstream(UpstreamStage::Speedline))
            })
            .await
    }

    /// Memoize a metric result per page load and throttling profile
    ///
    /// A simulator supplied on `data` has no stable identity, so such
    /// computations always run `compute` and are never cached.
    pub async fn request_metric<F, Fut>(
        &self,
        kind: MetricKind,
        data: &MetricComputationData,
        compute: F,
    ) -> Result<Arc<MetricResult>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<MetricResult>>,
    {
        if data.simulator.is_some() {
            return compute().await.map(Arc::new);
        }

        let key = MetricKey {
            trace_id: data.trace.id.clone(),
            throttling: data.settings.cache_key(),
            kind,
        };
        self.metrics
            .get_or_try_insert(key, || async { compute().await.map(Arc::new) })
            .await
    }

    /// Number of metric results held by the cache
    pub fn cached_metric_count(&self) -> usize {
        self.metrics.len()
    }
}
