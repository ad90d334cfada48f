//! Mode validation.
//!
//! Runs after the context loads and before any derivation. A validator may
//! reject the run outright (surfaced as 422 with its code) or attach
//! additional warnings.

use std::collections::BTreeMap;

use async_trait::async_trait;
use flowtime_types::{Signal, StateWarning};
use tracing::debug;

use crate::context::StateRunContext;

pub const SIMULATION_SERIES_MISSING_CODE: &str = "simulation_series_missing";
pub const TELEMETRY_SERIES_INCOMPLETE_CODE: &str = "telemetry_series_incomplete";

/// Outcome of validating a run context against its mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModeValidationResult {
    pub has_errors: bool,
    pub error_message: Option<String>,
    pub error_code: Option<String>,
    pub warnings: Vec<StateWarning>,
    pub node_warnings: BTreeMap<String, Vec<StateWarning>>,
}

impl ModeValidationResult {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            has_errors: true,
            error_message: Some(message.into()),
            error_code: Some(code.into()),
            ..Self::default()
        }
    }
}

/// Validates a loaded run context for its run mode.
#[async_trait]
pub trait ModeValidator: Send + Sync {
    async fn validate(&self, context: &StateRunContext) -> ModeValidationResult;
}

/// Built-in validator.
///
/// Simulation runs must carry arrivals or served for every flow node.
/// Telemetry runs only warn about flow nodes missing either.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultModeValidator;

#[async_trait]
impl ModeValidator for DefaultModeValidator {
    async fn validate(&self, context: &StateRunContext) -> ModeValidationResult {
        let mode = &context.metadata().mode;
        let mut result = ModeValidationResult::ok();

        for node in context.topology().nodes.iter().filter(|n| n.kind.is_flow()) {
            let data = context.data(&node.id);
            let has_arrivals = data.map(|d| d.has(Signal::Arrivals)).unwrap_or(false);
            let has_served = data.map(|d| d.has(Signal::Served)).unwrap_or(false);

            if mode.is_simulation() && !has_arrivals && !has_served {
                debug!(node_id = %node.id, "Simulation node has no arrivals or served series");
                return ModeValidationResult::error(
                    SIMULATION_SERIES_MISSING_CODE,
                    format!(
                        "Simulation run '{}' has no arrivals or served series for node '{}'.",
                        context.run_id(),
                        node.id
                    ),
                );
            }

            if mode.is_telemetry() && !(has_arrivals && has_served) {
                let missing = if has_arrivals { "served" } else { "arrivals" };
                result
                    .node_warnings
                    .entry(node.id.clone())
                    .or_default()
                    .push(
                        StateWarning::new(
                            TELEMETRY_SERIES_INCOMPLETE_CODE,
                            format!("Telemetry for node '{}' has no {missing} series.", node.id),
                        )
                        .for_node(&node.id),
                    );
            }
        }

        result
    }
}
