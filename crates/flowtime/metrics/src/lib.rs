//! # FlowTime Metrics - Service-Level SLA Aggregation
//!
//! Computes, per service, the fraction of bins in which served work kept up
//! with arrivals, plus a compact per-bin ratio trend.
//!
//! Series are resolved either from the state window (telemetry and other
//! recorded runs) or by re-evaluating a simulation model through a
//! [`GraphEvaluator`](flowtime_state::artifacts::GraphEvaluator). Both paths
//! produce [`ResolvedService`]s that feed the same [`aggregate`] function.

pub mod aggregator;
pub mod service;

pub use aggregator::{aggregate, bin_ratio, ResolvedService};
pub use flowtime_state::DEFAULT_SLA_THRESHOLD;
pub use service::{resolve_from_window, MetricsService};
