//! Core type definitions for FlowTime state resolution.
//!
//! This crate holds the run artifact model (topology, model definition,
//! manifests, series index), per-node raw series, warnings, and the
//! field-stable response shapes produced by the state and metrics engines.

pub mod kind;
pub mod manifest;
pub mod metrics;
pub mod model;
pub mod response;
pub mod series;
pub mod topology;
pub mod warning;

pub use kind::{NodeKind, UnknownNodeKind};
pub use manifest::{
    ManifestMetadata, RunManifest, RunMode, SeriesIndex, SeriesIndexEntry, StorageDescriptor,
};
pub use metrics::{MetricsGrid, MetricsResponse, MetricsWindow, ServiceMetrics};
pub use model::{BinUnit, GridDefinition, ModelDefinition, ModelNode, PmfEntry};
pub use response::{
    BinInfo, EdgeSeries, NodeColor, NodeDerived, NodeMetrics, NodeSeries, NodeSnapshot,
    NodeTelemetry, SnapshotResponse, StateMetadata, WindowInfo, WindowResponse,
};
pub use series::{NodeData, Signal};
pub use topology::{NodeSemantics, SemanticRef, Topology, TopologyEdge, TopologyNode};
pub use warning::{StateWarning, WarningSeverity};
