//! Topology graph: nodes, semantics, and edges.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::kind::NodeKind;
use crate::series::Signal;

/// Directed graph of flow nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    #[serde(default)]
    pub nodes: Vec<TopologyNode>,
    #[serde(default)]
    pub edges: Vec<TopologyEdge>,
}

impl Topology {
    pub fn node(&self, id: &str) -> Option<&TopologyNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }
}

/// A topology node and the named series that back it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyNode {
    pub id: String,
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub semantics: NodeSemantics,
}

impl TopologyNode {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            semantics: NodeSemantics::default(),
        }
    }
}

/// Named series references for a node.
///
/// Each reference is empty, a node id, or a `file:`-prefixed path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSemantics {
    pub arrivals: Option<String>,
    pub served: Option<String>,
    pub errors: Option<String>,
    pub attempts: Option<String>,
    pub failures: Option<String>,
    pub exhausted_failures: Option<String>,
    pub retry_echo: Option<String>,
    pub retry_budget_remaining: Option<String>,
    pub external_demand: Option<String>,
    #[serde(alias = "queue")]
    pub queue_depth: Option<String>,
    pub capacity: Option<String>,
    pub processing_time_ms_sum: Option<String>,
    pub served_count: Option<String>,
    pub max_attempts: Option<u32>,
    #[serde(alias = "slaMin")]
    pub sla_minutes: Option<f64>,
    pub retry_kernel: Option<Vec<f64>>,
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl NodeSemantics {
    /// Raw reference text for a signal, when non-blank.
    pub fn reference(&self, signal: Signal) -> Option<&str> {
        let raw = match signal {
            Signal::Arrivals => &self.arrivals,
            Signal::Served => &self.served,
            Signal::Errors => &self.errors,
            Signal::Attempts => &self.attempts,
            Signal::Failures => &self.failures,
            Signal::ExhaustedFailures => &self.exhausted_failures,
            Signal::RetryEcho => &self.retry_echo,
            Signal::RetryBudgetRemaining => &self.retry_budget_remaining,
            Signal::ExternalDemand => &self.external_demand,
            Signal::QueueDepth => &self.queue_depth,
            Signal::Capacity => &self.capacity,
            Signal::ProcessingTimeMsSum => &self.processing_time_ms_sum,
            Signal::ServedCount => &self.served_count,
        };
        raw.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }

    /// Parsed reference for a signal.
    pub fn semantic_ref(&self, signal: Signal) -> Option<SemanticRef> {
        self.reference(signal).and_then(SemanticRef::parse)
    }

    /// Signals that carry a non-blank reference.
    pub fn referenced_signals(&self) -> Vec<Signal> {
        Signal::ALL
            .iter()
            .copied()
            .filter(|s| self.reference(*s).is_some())
            .collect()
    }

    /// `file:` paths across all references, in signal order.
    pub fn file_references(&self) -> Vec<String> {
        Signal::ALL
            .iter()
            .filter_map(|s| match self.semantic_ref(*s) {
                Some(SemanticRef::File(path)) => Some(path),
                _ => None,
            })
            .collect()
    }
}

/// A parsed semantic reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticRef {
    /// Another node's series, by id.
    Node(String),
    /// A CSV file, relative to the model directory.
    File(String),
}

impl SemanticRef {
    const FILE_PREFIX: &'static str = "file:";

    /// Parse a reference; blank input has no reference.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        match trimmed.get(..Self::FILE_PREFIX.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(Self::FILE_PREFIX) => {
                let path = trimmed[Self::FILE_PREFIX.len()..].trim_start_matches("//");
                if path.is_empty() {
                    None
                } else {
                    Some(SemanticRef::File(path.to_string()))
                }
            }
            _ => Some(SemanticRef::Node(trimmed.to_string())),
        }
    }
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyEdge {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "from", alias = "source")]
    pub source: String,
    #[serde(rename = "to", alias = "target")]
    pub target: String,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub multiplier: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub lag: Option<i64>,
    #[serde(default, rename = "type", alias = "edgeType")]
    pub edge_type: Option<String>,
}

impl TopologyEdge {
    const RETRY_DEPENDENCY_FIELDS: [&'static str; 3] = ["attempts", "failures", "exhaustedfailures"];

    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
            field: None,
            multiplier: None,
            weight: None,
            lag: None,
            edge_type: None,
        }
    }

    /// Node id of the source endpoint (text before any `:port` suffix).
    pub fn source_node_id(&self) -> &str {
        node_id_of(&self.source)
    }

    /// Node id of the target endpoint (text before any `:port` suffix).
    pub fn target_node_id(&self) -> &str {
        node_id_of(&self.target)
    }

    /// Stable edge id, synthesized from the endpoints when absent.
    pub fn display_id(&self) -> String {
        match self.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("{}->{}", self.source, self.target),
        }
    }

    /// Lowercased field name, if any.
    pub fn normalized_field(&self) -> Option<String> {
        self.field
            .as_deref()
            .map(|f| f.trim().to_ascii_lowercase())
            .filter(|f| !f.is_empty())
    }

    pub fn is_retry_dependency(&self) -> bool {
        self.normalized_field()
            .map(|f| Self::RETRY_DEPENDENCY_FIELDS.contains(&f.as_str()))
            .unwrap_or(false)
    }

    pub fn effective_multiplier(&self) -> f64 {
        positive_or_one(self.multiplier)
    }

    pub fn effective_weight(&self) -> f64 {
        positive_or_one(self.weight)
    }

    /// Lag in bins, never negative.
    pub fn effective_lag(&self) -> usize {
        self.lag.map(|l| l.max(0) as usize).unwrap_or(0)
    }

    pub fn effective_edge_type(&self) -> String {
        match self.edge_type.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => "dependency".to_string(),
        }
    }
}

fn node_id_of(endpoint: &str) -> &str {
    let trimmed = endpoint.trim();
    match trimmed.split_once(':') {
        Some((id, _)) => id,
        None => trimmed,
    }
}

fn positive_or_one(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 1.0,
    }
}
