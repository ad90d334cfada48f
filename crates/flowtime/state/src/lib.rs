//! # FlowTime State - State Resolution over Recorded Run Series
//!
//! This crate reconstructs a fully derived view of a run's topology at a
//! single bin (snapshot) or over a bin range (window) from the run's raw
//! recorded series.
//!
//! ## Overview
//!
//! A run holds a topology of service, queue and computed nodes plus one
//! series per recorded signal. Recorded series are rarely complete, so the
//! engine fills gaps with well-defined derivations:
//!
//! - **Attempts** from served + failures, **failures** from errors
//! - **Retry echo** by convolving past failures with a retry kernel
//! - **Utilization**, **queue latency**, **service time**, **throughput
//!   ratio** and **retry tax**
//! - **Flow latency** propagated along the dependency graph
//!
//! Structural problems (missing run, unparseable model, absent topology)
//! fail the request with a [`StateQueryError`]. Data-quality problems become
//! warnings on the response.
//!
//! ## Key Components
//!
//! - [`StateQueryService`]: snapshot and window queries
//! - [`RunContextLoader`]: loads and checks a run before derivation
//! - [`derivation`]: pure per-bin derivation functions
//! - [`flow_latency`]: flow-latency propagation
//! - [`artifacts`]: collaborator traits and file-system implementations
//!
//! ## Example
//!
//! ```rust,no_run
//! use flowtime_state::{QueryMode, StateConfig, StateQueryService};
//!
//! # async fn example() -> flowtime_state::StateResult<()> {
//! let service = StateQueryService::new(StateConfig::with_data_dir("/var/lib/flowtime/runs"));
//!
//! let snapshot = service.get_state("run_20250101T000000Z", 12).await?;
//! println!("{} nodes at bin {}", snapshot.nodes.len(), snapshot.bin.index);
//!
//! let window = service
//!     .get_state_window("run_20250101T000000Z", 0, 47, QueryMode::Full)
//!     .await?;
//! println!("{} edges", window.edges.len());
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod builders;
pub mod config;
pub mod context;
pub mod derivation;
pub mod error;
pub mod flow_latency;
pub mod numeric;
pub mod retry_kernel;
pub mod service;
pub mod validation;

pub use config::{ColoringThresholds, StateConfig, DATA_DIR_ENV, DEFAULT_SLA_THRESHOLD};
pub use context::{
    ComputedSeries, LoadedRun, QueryMode, RunContextLoader, StateRunContext, WarningBuilder,
};
pub use error::{ArtifactError, ArtifactResult, ConfigError, StateQueryError, StateResult};
pub use flow_latency::{FlowGraph, FlowLatency};
pub use numeric::normalize;
pub use retry_kernel::{KernelDecision, RetryKernelPolicy, DEFAULT_RETRY_KERNEL};
pub use service::StateQueryService;
pub use validation::{DefaultModeValidator, ModeValidationResult, ModeValidator};
