//! Lantern - page-load metric estimation from dependency graphs
//!
//! This library predicts lab metrics (first contentful paint, first meaningful
//! paint, time to interactive, speed index) for a recorded page load under
//! arbitrary network and CPU throttling, without replaying the load. Each
//! metric simulates an optimistic and a pessimistic variant of the page's
//! dependency graph and blends the two with fitted regression coefficients.
//!
//! # Example
//!
//! ```
//! use lantern::artifacts::ComputedContext;
//! use lantern::fixture::{FixtureSource, PageLoadFixture};
//! use lantern::lantern_metric::MetricKind;
//! use lantern::metrics::request_metric;
//! use lantern::throttling::ThrottlingSettings;
//!
//! # fn main() -> anyhow::Result<()> {
//! let fixture = PageLoadFixture::from_json_str(r#"{
//!     "id": "tiny",
//!     "navigation": {"first_contentful_paint": 150.0},
//!     "nodes": [
//!         {"kind": "network", "id": 1, "url": "https://example.com/",
//!          "resource_type": "Document", "priority": "VeryHigh", "is_main_document": true,
//!          "start_time": 0.0, "end_time": 100.0},
//!         {"kind": "cpu", "id": 2, "start_time": 100.0, "end_time": 150.0,
//!          "child_events": [{"name": "ParseHTML"}, {"name": "Layout"}, {"name": "Paint"}]}
//!     ],
//!     "edges": [[1, 2]]
//! }"#)?;
//!
//! let data = fixture.computation_data(ThrottlingSettings::desktop_dense_4g());
//! let context = ComputedContext::new(FixtureSource::new(fixture));
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().build()?;
//! let fcp = runtime.block_on(request_metric(MetricKind::FirstContentfulPaint, &data, &context))?;
//!
//! // 3 round trips to open the connection, then 50ms of parsing and painting
//! assert_eq!(fcp.timing, 170.0);
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod cli;
pub mod dependency_graph;
pub mod error;
pub mod fixture;
pub mod lantern_metric;
pub mod metrics;
pub mod node;
pub mod report;
pub mod simulator;
pub mod throttling;

pub use error::{EstimateError, Result};
