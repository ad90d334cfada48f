//! State query service.
//!
//! The two public operations: a snapshot at one bin and a window over a bin
//! range. Each request loads its own [`StateRunContext`]; nothing is cached
//! or shared across requests beyond configuration.

use std::sync::Arc;

use flowtime_types::{SnapshotResponse, WindowResponse};
use tracing::{debug, instrument, warn};

use crate::builders::{build_snapshot, build_window};
use crate::config::StateConfig;
use crate::context::{QueryMode, RunContextLoader, StateRunContext};
use crate::error::{StateQueryError, StateResult};
use crate::validation::{DefaultModeValidator, ModeValidator};

const MODE_VALIDATION_FAILED_CODE: &str = "mode_validation_failed";

/// Resolves snapshot and window views of a run.
#[derive(Clone)]
pub struct StateQueryService {
    config: Arc<StateConfig>,
    loader: RunContextLoader,
    validator: Arc<dyn ModeValidator>,
}

impl StateQueryService {
    /// Service over the file-system collaborators and the default validator.
    pub fn new(config: StateConfig) -> Self {
        let config = Arc::new(config);
        Self {
            loader: RunContextLoader::new(config.clone()),
            config,
            validator: Arc::new(DefaultModeValidator),
        }
    }

    pub fn with_loader(mut self, loader: RunContextLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn ModeValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    pub fn loader(&self) -> &RunContextLoader {
        &self.loader
    }

    /// State of every topology node at `bin`.
    #[instrument(skip(self))]
    pub async fn get_state(&self, run_id: &str, bin: usize) -> StateResult<SnapshotResponse> {
        let mut ctx = self.loader.load(run_id, QueryMode::Operational).await?;
        check_bin(&ctx, bin)?;
        self.validate(&mut ctx).await?;

        Ok(build_snapshot(&ctx, bin, &self.config.coloring))
    }

    /// State of every node and retry-dependency edge over `start..=end`.
    #[instrument(skip(self))]
    pub async fn get_state_window(
        &self,
        run_id: &str,
        start: usize,
        end: usize,
        mode: QueryMode,
    ) -> StateResult<WindowResponse> {
        if end < start {
            return Err(StateQueryError::InvalidRequest(format!(
                "endBin ({end}) must not be less than startBin ({start})"
            )));
        }
        // `end - start + 1` overflows when end is usize::MAX
        let span = end - start;
        if span >= self.config.max_window_bins {
            return Err(StateQueryError::PayloadTooLarge(format!(
                "window of {} bins exceeds the maximum of {}",
                span as u128 + 1,
                self.config.max_window_bins
            )));
        }

        let mut ctx = self.loader.load(run_id, mode).await?;
        check_bin(&ctx, end)?;
        self.validate(&mut ctx).await?;

        Ok(build_window(&ctx, start, end, mode, &self.config.coloring))
    }

    async fn validate(&self, ctx: &mut StateRunContext) -> StateResult<()> {
        let result = self.validator.validate(ctx).await;
        if result.has_errors {
            let code = result
                .error_code
                .unwrap_or_else(|| MODE_VALIDATION_FAILED_CODE.to_string());
            warn!(run_id = ctx.run_id(), code = %code, "Mode validation failed");
            return Err(StateQueryError::UnprocessableEntity {
                message: result
                    .error_message
                    .unwrap_or_else(|| format!("run '{}' failed mode validation", ctx.run_id())),
                code,
            });
        }

        debug!(
            run_id = ctx.run_id(),
            warnings = result.warnings.len(),
            "Mode validation passed"
        );
        ctx.absorb_warnings(result.warnings, result.node_warnings);
        Ok(())
    }
}

fn check_bin(ctx: &StateRunContext, bin: usize) -> StateResult<()> {
    let total = ctx.total_bins();
    if bin >= total {
        return Err(StateQueryError::InvalidRequest(format!(
            "bin {bin} is outside the run's {total} bins"
        )));
    }
    Ok(())
}
