//! Flow-latency propagation.
//!
//! Flow latency approximates end-to-end delay at a node: its own service
//! time (services) or queue latency (queues), plus the flow latency of the
//! dominant upstream predecessor, the one moving the most weighted volume
//! into it at that bin.
//!
//! Nodes are resolved in topology order in a single pass. A predecessor that
//! appears later in the node list has not been resolved yet and contributes
//! nothing to its successor. Cyclic or out-of-order topologies therefore get
//! partial attributions rather than a topological sort.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use flowtime_types::{NodeData, NodeKind, Signal, Topology};

use crate::derivation;

const MS_PER_MINUTE: f64 = 60_000.0;

/// A weighted inbound edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Predecessor {
    pub node: usize,
    pub weight: f64,
}

/// Integer-indexed adjacency for one topology, built once per request.
#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    ids: Vec<String>,
    kinds: Vec<NodeKind>,
    index: HashMap<String, usize>,
    predecessors: Vec<Vec<Predecessor>>,
}

impl FlowGraph {
    pub fn from_topology(topology: &Topology) -> Self {
        let mut graph = FlowGraph::default();
        for node in &topology.nodes {
            let slot = graph.ids.len();
            graph.ids.push(node.id.clone());
            graph.kinds.push(node.kind);
            graph.predecessors.push(Vec::new());
            graph.index.entry(node.id.clone()).or_insert(slot);
        }

        for edge in &topology.edges {
            let (Some(&source), Some(&target)) = (
                graph.index.get(edge.source_node_id()),
                graph.index.get(edge.target_node_id()),
            ) else {
                continue;
            };
            graph.predecessors[target].push(Predecessor {
                node: source,
                weight: edge.effective_weight(),
            });
        }

        graph
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn id(&self, node: usize) -> &str {
        &self.ids[node]
    }

    pub fn predecessors(&self, node: usize) -> &[Predecessor] {
        &self.predecessors[node]
    }
}

/// Flow latency per node over a bin range, in milliseconds.
#[derive(Debug, Clone, Default)]
pub struct FlowLatency {
    start_bin: usize,
    by_node: HashMap<String, Vec<Option<f64>>>,
}

impl FlowLatency {
    /// Series for a node, aligned to the propagated range.
    pub fn series(&self, node_id: &str) -> Option<&[Option<f64>]> {
        self.by_node.get(node_id).map(Vec::as_slice)
    }

    /// Value for a node at an absolute bin.
    pub fn at(&self, node_id: &str, bin: usize) -> Option<f64> {
        let offset = bin.checked_sub(self.start_bin)?;
        self.series(node_id)
            .and_then(|s| s.get(offset).copied())
            .flatten()
    }
}

/// Own latency contribution of a node, in milliseconds.
pub fn base_latency_ms(kind: NodeKind, data: &NodeData, bin: usize, bin_minutes: f64) -> Option<f64> {
    match kind {
        NodeKind::Service => derivation::service_time_ms(data, bin),
        NodeKind::Queue => {
            derivation::latency_minutes(data, bin, bin_minutes).map(|m| m * MS_PER_MINUTE)
        }
        NodeKind::Const | NodeKind::Expression | NodeKind::Pmf => None,
    }
}

/// Propagate flow latency across `graph` for every bin of `range`.
pub fn propagate(
    graph: &FlowGraph,
    node_data: &HashMap<String, NodeData>,
    range: RangeInclusive<usize>,
    bin_minutes: f64,
) -> FlowLatency {
    let data: Vec<Option<&NodeData>> = (0..graph.len())
        .map(|node| node_data.get(graph.id(node)))
        .collect();
    let mut resolved: Vec<Option<Vec<Option<f64>>>> = vec![None; graph.len()];

    for node in 0..graph.len() {
        let series: Vec<Option<f64>> = range
            .clone()
            .enumerate()
            .map(|(offset, bin)| {
                let base = data[node]
                    .and_then(|d| base_latency_ms(graph.kinds[node], d, bin, bin_minutes));
                let upstream = dominant_upstream(graph, node, bin, offset, &data, &resolved);
                combine(base, upstream)
            })
            .collect();
        resolved[node] = Some(series);
    }

    let mut by_node = HashMap::with_capacity(graph.len());
    for (node, series) in resolved.into_iter().enumerate() {
        if let Some(series) = series {
            by_node.entry(graph.id(node).to_string()).or_insert(series);
        }
    }

    FlowLatency {
        start_bin: *range.start(),
        by_node,
    }
}

/// Flow latency of the already-resolved predecessor with the largest
/// `served * weight` at `bin`. Ties keep the first predecessor seen.
fn dominant_upstream(
    graph: &FlowGraph,
    node: usize,
    bin: usize,
    offset: usize,
    data: &[Option<&NodeData>],
    resolved: &[Option<Vec<Option<f64>>>],
) -> Option<f64> {
    let mut best: Option<(usize, f64)> = None;

    for pred in graph.predecessors(node) {
        if resolved[pred.node].is_none() {
            continue;
        }
        let Some(served) = data[pred.node].and_then(|d| d.finite(Signal::Served, bin)) else {
            continue;
        };
        let volume = served * pred.weight;
        match best {
            Some((_, best_volume)) if volume <= best_volume => {}
            _ => best = Some((pred.node, volume)),
        }
    }

    let (source, _) = best?;
    resolved[source]
        .as_ref()
        .and_then(|series| series.get(offset).copied())
        .flatten()
}

fn combine(base: Option<f64>, upstream: Option<f64>) -> Option<f64> {
    match (base, upstream) {
        (Some(b), Some(u)) => Some(b + u),
        (Some(b), None) => Some(b),
        (None, Some(u)) => Some(u),
        (None, None) => None,
    }
}
