//! Metrics service.
//!
//! Resolves arrivals/served per service and aggregates SLA attainment. Runs
//! whose manifest mode is simulation are re-evaluated through a
//! [`GraphEvaluator`] when one is configured; every other run resolves
//! through the state window.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

use flowtime_state::artifacts::GraphEvaluator;
use flowtime_state::{LoadedRun, QueryMode, StateQueryError, StateQueryService, StateResult};
use flowtime_types::{
    MetricsGrid, MetricsResponse, MetricsWindow, SemanticRef, Signal, TopologyNode,
    WindowResponse,
};
use tracing::{debug, error, info, instrument};

use crate::aggregator::{aggregate, ResolvedService};

/// SLA metrics over a run's services.
#[derive(Clone)]
pub struct MetricsService {
    state: StateQueryService,
    evaluator: Option<Arc<dyn GraphEvaluator>>,
}

impl MetricsService {
    pub fn new(state: StateQueryService) -> Self {
        Self {
            state,
            evaluator: None,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn GraphEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// SLA metrics over `range`, or from bin 0 up to the window cap.
    #[instrument(skip(self))]
    pub async fn get_metrics(
        &self,
        run_id: &str,
        range: Option<(usize, usize)>,
        mode: QueryMode,
    ) -> StateResult<MetricsResponse> {
        let run = self.state.loader().load_run(run_id).await?;
        let (start, end) = self.resolve_range(&run, range)?;

        let services = match &self.evaluator {
            Some(evaluator) if run.metadata.mode.is_simulation() => {
                debug!(run_id, "Resolving metrics from model evaluation");
                resolve_from_evaluation(&run, evaluator.as_ref(), start..=end)?
            }
            _ => {
                debug!(run_id, "Resolving metrics from state window");
                let window = self.state.get_state_window(run_id, start, end, mode).await?;
                resolve_from_window(&window)
            }
        };

        let threshold = self.state.config().sla_threshold;
        let services: Vec<_> = services
            .iter()
            .map(|service| aggregate(service, threshold))
            .collect();

        info!(run_id, start, end, services = services.len(), "Aggregated service metrics");

        let grid = &run.model.grid;
        Ok(MetricsResponse {
            window: MetricsWindow {
                start: grid.bin_start(start),
                timezone: grid.timezone_or_utc(),
            },
            grid: MetricsGrid {
                bin_minutes: grid.bin_duration_minutes(),
                bins: end - start + 1,
            },
            services,
        })
    }

    fn resolve_range(
        &self,
        run: &LoadedRun,
        range: Option<(usize, usize)>,
    ) -> StateResult<(usize, usize)> {
        let total = run.model.grid.bins;
        let max = self.state.config().max_window_bins;

        let (start, end) = match range {
            Some(range) => range,
            None if total == 0 => {
                return Err(StateQueryError::InvalidRequest(format!(
                    "run '{}' has no bins",
                    run.run_id
                )))
            }
            None => (0, total.min(max).saturating_sub(1)),
        };

        if end < start {
            return Err(StateQueryError::InvalidRequest(format!(
                "end bin ({end}) must not be less than start bin ({start})"
            )));
        }
        if end - start >= max {
            return Err(StateQueryError::PayloadTooLarge(format!(
                "range of {} bins exceeds the maximum of {max}",
                (end - start) as u128 + 1
            )));
        }
        if end >= total {
            return Err(StateQueryError::InvalidRequest(format!(
                "bin {end} is outside the run's {total} bins"
            )));
        }
        Ok((start, end))
    }
}

/// Flow nodes of the window that carry both arrivals and served.
pub fn resolve_from_window(window: &WindowResponse) -> Vec<ResolvedService> {
    window
        .nodes
        .iter()
        .filter(|node| node.kind.is_flow())
        .filter_map(|node| {
            let arrivals = node.series.get("arrivals")?;
            let served = node.series.get("served")?;
            Some(ResolvedService::new(
                node.id.clone(),
                arrivals.clone(),
                served.clone(),
            ))
        })
        .collect()
}

/// Flow nodes whose arrivals and served resolve in the evaluated graph.
fn resolve_from_evaluation(
    run: &LoadedRun,
    evaluator: &dyn GraphEvaluator,
    range: RangeInclusive<usize>,
) -> StateResult<Vec<ResolvedService>> {
    let evaluated = evaluator.evaluate(&run.model).map_err(|e| {
        error!(run_id = %run.run_id, error = %e, "Model evaluation failed");
        StateQueryError::Internal(format!("model evaluation failed: {e}"))
    })?;

    Ok(run
        .topology
        .nodes
        .iter()
        .filter(|node| node.kind.is_flow())
        .filter_map(|node| {
            let arrivals = evaluated_series(node, Signal::Arrivals, &evaluated, range.clone())?;
            let served = evaluated_series(node, Signal::Served, &evaluated, range.clone())?;
            Some(ResolvedService::new(node.id.clone(), arrivals, served))
        })
        .collect())
}

fn evaluated_series(
    node: &TopologyNode,
    signal: Signal,
    evaluated: &HashMap<String, Vec<f64>>,
    range: RangeInclusive<usize>,
) -> Option<Vec<Option<f64>>> {
    let Some(SemanticRef::Node(id)) = node.semantics.semantic_ref(signal) else {
        return None;
    };
    let values = evaluated.get(&id)?;
    Some(
        range
            .map(|bin| values.get(bin).copied().filter(|v| v.is_finite()))
            .collect(),
    )
}
