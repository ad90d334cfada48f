use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use flowtime_types::{
    EdgeSeries, NodeData, NodeKind, NodeSeries, NodeTelemetry, Signal, TopologyEdge,
    TopologyNode, WindowInfo, WindowResponse,
};
use tracing::debug;

use super::{evaluate_bin, metadata, node_telemetry};
use crate::config::ColoringThresholds;
use crate::context::{ComputedSeries, QueryMode, StateRunContext};
use crate::derivation;
use crate::flow_latency::{self, FlowGraph, FlowLatency};
use crate::numeric::{normalize, normalize_opt};

/// Series keys backed directly by a recorded signal. These are emitted
/// whenever the signal is present; derived keys only when they carry a value.
fn recorded_signal(key: &str) -> Option<Signal> {
    match key {
        "arrivals" => Some(Signal::Arrivals),
        "served" => Some(Signal::Served),
        "errors" => Some(Signal::Errors),
        "queue" => Some(Signal::QueueDepth),
        "capacity" => Some(Signal::Capacity),
        "externalDemand" => Some(Signal::ExternalDemand),
        "exhaustedFailures" => Some(Signal::ExhaustedFailures),
        "retryBudgetRemaining" => Some(Signal::RetryBudgetRemaining),
        _ => None,
    }
}

/// Multi-bin state over `start..=end`.
///
/// The range must already be validated against the grid and the window cap.
pub fn build_window(
    ctx: &StateRunContext,
    start: usize,
    end: usize,
    mode: QueryMode,
    thresholds: &ColoringThresholds,
) -> WindowResponse {
    let range = start..=end;
    let graph = FlowGraph::from_topology(ctx.topology());
    let latency = flow_latency::propagate(&graph, &ctx.node_data, range.clone(), ctx.bin_minutes());

    let mut nodes: Vec<NodeSeries> = ctx
        .topology()
        .nodes
        .iter()
        .map(|node| node_series(ctx, node, range.clone(), &latency, thresholds))
        .collect();

    if mode.includes_computed() {
        nodes.extend(
            ctx.computed
                .iter()
                .map(|computed| computed_series(ctx, computed, range.clone())),
        );
    }

    let edges: Vec<EdgeSeries> = ctx
        .topology()
        .edges
        .iter()
        .filter(|edge| edge.is_retry_dependency())
        .map(|edge| edge_series(ctx, edge, range.clone()))
        .collect();

    let grid = ctx.grid();
    let timestamps_utc = if grid.start_time_utc.is_some() {
        range.clone().filter_map(|bin| grid.bin_start(bin)).collect()
    } else {
        Vec::new()
    };

    debug!(
        run_id = ctx.run_id(),
        start,
        end,
        nodes = nodes.len(),
        edges = edges.len(),
        "Built state window"
    );

    WindowResponse {
        metadata: metadata(ctx),
        window: WindowInfo {
            start_bin: start,
            end_bin: end,
            bin_count: end - start + 1,
        },
        timestamps_utc,
        nodes,
        edges,
        warnings: ctx.warnings.clone(),
    }
}

fn node_series(
    ctx: &StateRunContext,
    node: &TopologyNode,
    range: RangeInclusive<usize>,
    latency: &FlowLatency,
    thresholds: &ColoringThresholds,
) -> NodeSeries {
    let empty = NodeData::default();
    let data = ctx.data(&node.id).unwrap_or(&empty);
    let service = node.kind == NodeKind::Service;
    let len = range.clone().count();

    let mut series: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
    let mut put = |key: &str, value: Option<f64>| {
        series
            .entry(key.to_string())
            .or_insert_with(|| Vec::with_capacity(len))
            .push(value);
    };

    for bin in range {
        let (m, d) = evaluate_bin(ctx, node, data, bin, latency.at(&node.id, bin), thresholds);

        put("arrivals", m.arrivals);
        put("served", m.served);
        put("errors", m.errors);
        put("queue", m.queue);
        put("capacity", m.capacity);
        put("externalDemand", m.external_demand);
        if service {
            put("attempts", m.attempts);
            put("failures", m.failures);
            put("exhaustedFailures", m.exhausted_failures);
            put("retryEcho", m.retry_echo);
            put("retryBudgetRemaining", m.retry_budget_remaining);
        }

        put("utilization", d.utilization);
        put("latencyMinutes", d.latency_minutes);
        put("serviceTimeMs", d.service_time_ms);
        put("flowLatencyMs", d.flow_latency_ms);
        put("throughputRatio", d.throughput_ratio);
        put("retryTax", d.retry_tax);
    }

    series.retain(|key, values| match recorded_signal(key) {
        Some(signal) => data.has(signal),
        None => values.iter().any(Option::is_some),
    });

    NodeSeries {
        id: node.id.clone(),
        kind: node.kind,
        series,
        telemetry: node_telemetry(ctx, node),
        aliases: node.semantics.aliases.clone(),
    }
}

fn computed_series(
    ctx: &StateRunContext,
    computed: &ComputedSeries,
    range: RangeInclusive<usize>,
) -> NodeSeries {
    let values = range
        .map(|bin| computed.values.get(bin).copied().and_then(normalize))
        .collect();

    NodeSeries {
        id: computed.id.clone(),
        kind: computed.kind,
        series: BTreeMap::from([("values".to_string(), values)]),
        telemetry: NodeTelemetry {
            sources: ctx
                .metadata()
                .node_sources
                .get(&computed.id)
                .cloned()
                .unwrap_or_default(),
            warnings: ctx.warnings_for(&computed.id).to_vec(),
        },
        aliases: BTreeMap::new(),
    }
}

/// Retry load an edge carries from its source node, shifted by its lag.
///
/// Bin `i` reads the source at `i - lag`; bins with no source sample are
/// null.
fn edge_series(
    ctx: &StateRunContext,
    edge: &TopologyEdge,
    range: RangeInclusive<usize>,
) -> EdgeSeries {
    let lag = edge.effective_lag();
    let multiplier = edge.effective_multiplier();
    let source = ctx.data(edge.source_node_id());
    let has_exhausted = source
        .map(|d| d.has(Signal::ExhaustedFailures))
        .unwrap_or(false);

    let len = range.clone().count();
    let mut attempts_load = Vec::with_capacity(len);
    let mut failures_load = Vec::with_capacity(len);
    let mut retry_rate = Vec::with_capacity(len);
    let mut exhausted_load = Vec::with_capacity(len);

    for bin in range {
        let sample = bin.checked_sub(lag).zip(source);
        let attempts = sample.and_then(|(i, d)| derivation::attempts(d, i, true));
        let failures = sample.and_then(|(i, d)| derivation::failures(d, i));

        attempts_load.push(normalize_opt(attempts.map(|a| a * multiplier)));
        failures_load.push(normalize_opt(failures.map(|f| f * multiplier)));
        retry_rate.push(match (attempts, failures) {
            (Some(a), Some(f)) if a > 0.0 => normalize(f / a),
            _ => None,
        });
        if has_exhausted {
            let exhausted = sample.and_then(|(i, d)| d.finite(Signal::ExhaustedFailures, i));
            exhausted_load.push(normalize_opt(exhausted.map(|e| e * multiplier)));
        }
    }

    let mut series = BTreeMap::from([
        ("attemptsLoad".to_string(), attempts_load),
        ("failuresLoad".to_string(), failures_load),
        ("retryRate".to_string(), retry_rate),
    ]);
    if has_exhausted {
        series.insert("exhaustedFailuresLoad".to_string(), exhausted_load);
    }

    EdgeSeries {
        id: edge.display_id(),
        from: edge.source.clone(),
        to: edge.target.clone(),
        edge_type: edge.effective_edge_type(),
        field: edge.normalized_field().unwrap_or_default(),
        multiplier,
        lag,
        series,
    }
}
