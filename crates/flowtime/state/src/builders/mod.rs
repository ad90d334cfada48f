//! Response builders.
//!
//! Both builders evaluate a node at one bin through [`evaluate_bin`]; the
//! window builder repeats it across its range and transposes the results
//! into named series.

use flowtime_types::{
    BinInfo, NodeColor, NodeData, NodeDerived, NodeKind, NodeMetrics, NodeTelemetry, Signal,
    StateMetadata, TopologyNode,
};

use crate::config::ColoringThresholds;
use crate::context::StateRunContext;
use crate::derivation;
use crate::numeric::{normalize, normalize_opt};

pub mod snapshot;
pub mod window;

pub use self::snapshot::build_snapshot;
pub use self::window::build_window;

/// Run-level metadata for a response.
pub fn metadata(ctx: &StateRunContext) -> StateMetadata {
    let grid = ctx.grid();
    let meta = ctx.metadata();
    StateMetadata {
        run_id: ctx.run_id().to_string(),
        template_id: ctx.run.manifest.template_id.clone(),
        mode: meta.mode.clone(),
        schema: meta.schema.clone(),
        model_hash: ctx.run.manifest.model_hash.clone(),
        provenance_hash: meta.provenance_hash.clone(),
        telemetry_sources: meta.telemetry_sources.clone(),
        total_bins: grid.bins,
        bin_size: grid.bin_size,
        bin_unit: grid.bin_unit.as_str().to_string(),
        bin_duration_minutes: ctx.bin_minutes(),
        start_time_utc: grid.start_time_utc,
        timezone: grid.timezone_or_utc(),
    }
}

pub fn bin_info(ctx: &StateRunContext, bin: usize) -> BinInfo {
    let grid = ctx.grid();
    BinInfo {
        index: bin,
        start_utc: grid.bin_start(bin),
        end_utc: grid.bin_start(bin + 1),
        duration_minutes: ctx.bin_minutes(),
    }
}

pub fn node_telemetry(ctx: &StateRunContext, node: &TopologyNode) -> NodeTelemetry {
    NodeTelemetry {
        sources: ctx.sources_for(node),
        warnings: ctx.warnings_for(&node.id).to_vec(),
    }
}

/// Health color of a node at one bin.
///
/// Services band on utilization; queues band on latency relative to their
/// SLA minutes. Anything without the inputs it needs is gray.
pub fn color(
    kind: NodeKind,
    derived: &NodeDerived,
    sla_minutes: Option<f64>,
    thresholds: &ColoringThresholds,
) -> NodeColor {
    match kind {
        NodeKind::Service => match derived.utilization {
            Some(u) if u < thresholds.utilization_warning => NodeColor::Green,
            Some(u) if u < thresholds.utilization_critical => NodeColor::Yellow,
            Some(_) => NodeColor::Red,
            None => NodeColor::Gray,
        },
        NodeKind::Queue => {
            let (Some(latency), Some(sla)) = (
                derived.latency_minutes,
                sla_minutes.filter(|s| s.is_finite() && *s > 0.0),
            ) else {
                return NodeColor::Gray;
            };
            let ratio = latency / sla;
            if ratio <= thresholds.latency_sla_warning {
                NodeColor::Green
            } else if ratio <= thresholds.latency_sla_critical {
                NodeColor::Yellow
            } else {
                NodeColor::Red
            }
        }
        NodeKind::Const | NodeKind::Expression | NodeKind::Pmf => NodeColor::Gray,
    }
}

fn raw(data: &NodeData, signal: Signal, bin: usize) -> Option<f64> {
    data.sample(signal, bin).and_then(normalize)
}

/// Normalized metrics and derived values of a node at `bin`.
pub(crate) fn evaluate_bin(
    ctx: &StateRunContext,
    node: &TopologyNode,
    data: &NodeData,
    bin: usize,
    flow_latency_ms: Option<f64>,
    thresholds: &ColoringThresholds,
) -> (NodeMetrics, NodeDerived) {
    let service = node.kind == NodeKind::Service;

    let mut metrics = NodeMetrics {
        arrivals: raw(data, Signal::Arrivals, bin),
        served: raw(data, Signal::Served, bin),
        errors: raw(data, Signal::Errors, bin),
        queue: raw(data, Signal::QueueDepth, bin),
        capacity: raw(data, Signal::Capacity, bin),
        external_demand: raw(data, Signal::ExternalDemand, bin),
        ..NodeMetrics::default()
    };

    if service {
        metrics.attempts = normalize_opt(derivation::attempts(data, bin, true));
        metrics.failures = normalize_opt(derivation::failures(data, bin));
        metrics.exhausted_failures = raw(data, Signal::ExhaustedFailures, bin);
        metrics.retry_echo = normalize_opt(derivation::retry_echo(data, bin, ctx.kernel(&node.id)));
        metrics.retry_budget_remaining = raw(data, Signal::RetryBudgetRemaining, bin);
        metrics.max_attempts = node.semantics.max_attempts;
    }

    let mut derived = NodeDerived {
        utilization: normalize_opt(derivation::utilization(data, bin)),
        latency_minutes: match node.kind {
            NodeKind::Queue => {
                normalize_opt(derivation::latency_minutes(data, bin, ctx.bin_minutes()))
            }
            _ => None,
        },
        service_time_ms: if service {
            normalize_opt(derivation::service_time_ms(data, bin))
        } else {
            None
        },
        flow_latency_ms: normalize_opt(flow_latency_ms),
        throughput_ratio: normalize_opt(derivation::throughput_ratio(data, bin)),
        retry_tax: if service {
            normalize_opt(derivation::retry_tax(data, bin, true))
        } else {
            None
        },
        color: NodeColor::Gray,
    };
    derived.color = color(node.kind, &derived, node.semantics.sla_minutes, thresholds);

    (metrics, derived)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derived(utilization: Option<f64>, latency: Option<f64>) -> NodeDerived {
        NodeDerived {
            utilization,
            latency_minutes: latency,
            ..NodeDerived::default()
        }
    }

    #[test]
    fn test_service_color_bands() {
        let t = ColoringThresholds::default();
        assert_eq!(color(NodeKind::Service, &derived(Some(0.5), None), None, &t), NodeColor::Green);
        assert_eq!(color(NodeKind::Service, &derived(Some(0.7), None), None, &t), NodeColor::Yellow);
        assert_eq!(color(NodeKind::Service, &derived(Some(0.95), None), None, &t), NodeColor::Red);
        assert_eq!(color(NodeKind::Service, &derived(None, None), None, &t), NodeColor::Gray);
    }

    #[test]
    fn test_queue_color_uses_sla() {
        let t = ColoringThresholds::default();
        let q = |latency| color(NodeKind::Queue, &derived(None, Some(latency)), Some(10.0), &t);
        assert_eq!(q(10.0), NodeColor::Green);
        assert_eq!(q(15.0), NodeColor::Yellow);
        assert_eq!(q(15.1), NodeColor::Red);
        assert_eq!(
            color(NodeKind::Queue, &derived(None, Some(1.0)), None, &t),
            NodeColor::Gray
        );
    }

    #[test]
    fn test_computed_kinds_are_gray() {
        let t = ColoringThresholds::default();
        assert_eq!(
            color(NodeKind::Pmf, &derived(Some(0.1), None), None, &t),
            NodeColor::Gray
        );
    }
}
