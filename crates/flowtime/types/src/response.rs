//! Snapshot and window response shapes.
//!
//! Field names are part of the wire contract; absent values serialize as
//! `null` rather than being omitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::kind::NodeKind;
use crate::manifest::RunMode;
use crate::warning::StateWarning;

/// Run-level metadata echoed in every response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMetadata {
    pub run_id: String,
    pub template_id: Option<String>,
    pub mode: RunMode,
    pub schema: Option<String>,
    pub model_hash: Option<String>,
    pub provenance_hash: Option<String>,
    pub telemetry_sources: Vec<String>,
    pub total_bins: usize,
    pub bin_size: f64,
    pub bin_unit: String,
    pub bin_duration_minutes: f64,
    pub start_time_utc: Option<DateTime<Utc>>,
    pub timezone: String,
}

/// The bin a snapshot describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinInfo {
    pub index: usize,
    pub start_utc: Option<DateTime<Utc>>,
    pub end_utc: Option<DateTime<Utc>>,
    pub duration_minutes: f64,
}

/// Raw metrics of one node at one bin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetrics {
    pub arrivals: Option<f64>,
    pub served: Option<f64>,
    pub errors: Option<f64>,
    pub queue: Option<f64>,
    pub capacity: Option<f64>,
    pub external_demand: Option<f64>,
    pub attempts: Option<f64>,
    pub failures: Option<f64>,
    pub exhausted_failures: Option<f64>,
    pub retry_echo: Option<f64>,
    pub retry_budget_remaining: Option<f64>,
    pub max_attempts: Option<u32>,
}

/// Categorical health color of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeColor {
    Green,
    Yellow,
    Red,
    #[default]
    Gray,
}

/// Derived metrics of one node at one bin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDerived {
    pub utilization: Option<f64>,
    pub latency_minutes: Option<f64>,
    pub service_time_ms: Option<f64>,
    pub flow_latency_ms: Option<f64>,
    pub throughput_ratio: Option<f64>,
    pub retry_tax: Option<f64>,
    pub color: NodeColor,
}

/// Telemetry provenance of a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTelemetry {
    pub sources: Vec<String>,
    pub warnings: Vec<StateWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub id: String,
    pub kind: NodeKind,
    pub metrics: NodeMetrics,
    pub derived: NodeDerived,
    pub telemetry: NodeTelemetry,
    pub aliases: BTreeMap<String, String>,
}

/// Point-in-time state of every topology node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse {
    pub metadata: StateMetadata,
    pub bin: BinInfo,
    pub nodes: Vec<NodeSnapshot>,
    pub warnings: Vec<StateWarning>,
}

/// Inclusive bin range of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
    pub start_bin: usize,
    pub end_bin: usize,
    pub bin_count: usize,
}

/// Named series of a node over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSeries {
    pub id: String,
    pub kind: NodeKind,
    pub series: BTreeMap<String, Vec<Option<f64>>>,
    pub telemetry: NodeTelemetry,
    pub aliases: BTreeMap<String, String>,
}

/// Retry-dependency load carried by an edge over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSeries {
    pub id: String,
    pub from: String,
    pub to: String,
    pub edge_type: String,
    pub field: String,
    pub multiplier: f64,
    pub lag: usize,
    pub series: BTreeMap<String, Vec<Option<f64>>>,
}

/// Multi-bin state of every node and retry-dependency edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowResponse {
    pub metadata: StateMetadata,
    pub window: WindowInfo,
    pub timestamps_utc: Vec<DateTime<Utc>>,
    pub nodes: Vec<NodeSeries>,
    pub edges: Vec<EdgeSeries>,
    pub warnings: Vec<StateWarning>,
}

impl WindowResponse {
    pub fn node(&self, id: &str) -> Option<&NodeSeries> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&EdgeSeries> {
        self.edges.iter().find(|e| e.id == id)
    }
}

impl SnapshotResponse {
    pub fn node(&self, id: &str) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_serializes_nulls_and_color() {
        let derived = NodeDerived {
            utilization: Some(0.5),
            ..NodeDerived::default()
        };
        let json = serde_json::to_value(&derived).unwrap();
        assert_eq!(json["utilization"], 0.5);
        assert!(json["latencyMinutes"].is_null());
        assert_eq!(json["color"], "gray");
    }
}
