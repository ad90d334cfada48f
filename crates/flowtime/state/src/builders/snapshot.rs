use flowtime_types::{NodeData, NodeSnapshot, SnapshotResponse};
use tracing::debug;

use super::{bin_info, evaluate_bin, metadata, node_telemetry};
use crate::config::ColoringThresholds;
use crate::context::StateRunContext;
use crate::flow_latency::{self, FlowGraph};

/// Point-in-time state of every topology node at `bin`.
///
/// `bin` must already be validated against the grid.
pub fn build_snapshot(
    ctx: &StateRunContext,
    bin: usize,
    thresholds: &ColoringThresholds,
) -> SnapshotResponse {
    let graph = FlowGraph::from_topology(ctx.topology());
    let latency = flow_latency::propagate(&graph, &ctx.node_data, bin..=bin, ctx.bin_minutes());
    let empty = NodeData::default();

    let nodes = ctx
        .topology()
        .nodes
        .iter()
        .map(|node| {
            let data = ctx.data(&node.id).unwrap_or(&empty);
            let (metrics, derived) =
                evaluate_bin(ctx, node, data, bin, latency.at(&node.id, bin), thresholds);
            NodeSnapshot {
                id: node.id.clone(),
                kind: node.kind,
                metrics,
                derived,
                telemetry: node_telemetry(ctx, node),
                aliases: node.semantics.aliases.clone(),
            }
        })
        .collect::<Vec<_>>();

    debug!(run_id = ctx.run_id(), bin, nodes = nodes.len(), "Built state snapshot");

    SnapshotResponse {
        metadata: metadata(ctx),
        bin: bin_info(ctx, bin),
        nodes,
        warnings: ctx.warnings.clone(),
    }
}
