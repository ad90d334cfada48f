//! Model definition: grid, topology, and computed node definitions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::kind::NodeKind;
use crate::topology::Topology;

/// A parsed model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDefinition {
    #[serde(default)]
    pub schema_version: Option<u32>,
    pub grid: GridDefinition,
    #[serde(default)]
    pub topology: Option<Topology>,
    #[serde(default)]
    pub nodes: Vec<ModelNode>,
}

impl ModelDefinition {
    /// Model nodes of a computed kind that are not part of the topology.
    pub fn computed_nodes(&self) -> impl Iterator<Item = &ModelNode> {
        self.nodes.iter().filter(move |node| {
            node.kind.is_computed()
                && !self
                    .topology
                    .as_ref()
                    .map(|t| t.contains(&node.id))
                    .unwrap_or(false)
        })
    }
}

/// Time grid of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridDefinition {
    pub bins: usize,
    pub bin_size: f64,
    #[serde(default)]
    pub bin_unit: BinUnit,
    #[serde(default, alias = "start")]
    pub start_time_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl Default for GridDefinition {
    fn default() -> Self {
        Self {
            bins: 0,
            bin_size: 1.0,
            bin_unit: BinUnit::Minutes,
            start_time_utc: None,
            timezone: None,
        }
    }
}

impl GridDefinition {
    /// Duration of one bin in minutes.
    pub fn bin_duration_minutes(&self) -> f64 {
        self.bin_size * self.bin_unit.minutes()
    }

    pub fn timezone_or_utc(&self) -> String {
        self.timezone
            .as_deref()
            .map(str::trim)
            .filter(|tz| !tz.is_empty())
            .unwrap_or("UTC")
            .to_string()
    }

    /// Start instant of `bin`, when the grid is anchored.
    pub fn bin_start(&self, bin: usize) -> Option<DateTime<Utc>> {
        let start = self.start_time_utc?;
        let offset_ms = self.bin_duration_minutes() * 60_000.0 * bin as f64;
        if !offset_ms.is_finite() {
            return None;
        }
        // `as i64` saturates; out-of-range offsets are rejected by `try_milliseconds`
        let offset = Duration::try_milliseconds(offset_ms.round() as i64)?;
        start.checked_add_signed(offset)
    }
}

/// Unit of a grid bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BinUnit {
    Seconds,
    #[default]
    Minutes,
    Hours,
    Days,
}

impl BinUnit {
    pub fn minutes(&self) -> f64 {
        match self {
            BinUnit::Seconds => 1.0 / 60.0,
            BinUnit::Minutes => 1.0,
            BinUnit::Hours => 60.0,
            BinUnit::Days => 1440.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BinUnit::Seconds => "seconds",
            BinUnit::Minutes => "minutes",
            BinUnit::Hours => "hours",
            BinUnit::Days => "days",
        }
    }
}

impl TryFrom<String> for BinUnit {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "second" | "seconds" => Ok(BinUnit::Seconds),
            "" | "m" | "min" | "minute" | "minutes" => Ok(BinUnit::Minutes),
            "h" | "hour" | "hours" => Ok(BinUnit::Hours),
            "d" | "day" | "days" => Ok(BinUnit::Days),
            other => Err(format!("unknown bin unit: {other}")),
        }
    }
}

impl From<BinUnit> for String {
    fn from(unit: BinUnit) -> Self {
        unit.as_str().to_string()
    }
}

/// A model node definition (const, expression, pmf, or flow).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelNode {
    pub id: String,
    #[serde(default)]
    pub kind: NodeKind,
    /// Inline values for const nodes.
    #[serde(default)]
    pub values: Option<Vec<f64>>,
    #[serde(default)]
    pub expr: Option<String>,
    #[serde(default)]
    pub pmf: Option<Vec<PmfEntry>>,
}

/// One value/probability pair of a PMF node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PmfEntry {
    pub value: f64,
    pub probability: f64,
}
