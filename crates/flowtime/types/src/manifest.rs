//! Run manifest, series index, and manifest metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::series::Signal;

/// Manifest written alongside every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunManifest {
    pub run_id: String,
    #[serde(default)]
    pub model_hash: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub created_utc: Option<DateTime<Utc>>,
}

/// Index of CSV series files produced for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesIndex {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub series: Vec<SeriesIndexEntry>,
}

/// One indexed series file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesIndexEntry {
    /// Series id, conventionally `measure@component[@class]`.
    pub id: String,
    #[serde(default)]
    pub component_id: Option<String>,
    #[serde(default)]
    pub measure: Option<String>,
    /// Path relative to the run directory.
    pub path: String,
    #[serde(default)]
    pub unit: Option<String>,
}

impl SeriesIndexEntry {
    /// `(measure, component)` recovered from a `measure@component` id.
    fn id_parts(&self) -> Option<(&str, &str)> {
        let mut parts = self.id.split('@');
        let measure = parts.next()?;
        let component = parts.next()?;
        Some((measure, component))
    }

    fn component(&self) -> Option<&str> {
        self.component_id
            .as_deref()
            .or_else(|| self.id_parts().map(|(_, c)| c))
    }

    fn measure_name(&self) -> Option<&str> {
        self.measure
            .as_deref()
            .or_else(|| self.id_parts().map(|(m, _)| m))
    }
}

impl SeriesIndex {
    /// Series for a node's signal, e.g. the `served` series of `Orders`.
    pub fn find_measure(&self, component: &str, signal: Signal) -> Option<&SeriesIndexEntry> {
        let measure = signal.measure();
        self.series.iter().find(|entry| {
            entry.component() == Some(component)
                && entry
                    .measure_name()
                    .map(|m| m.eq_ignore_ascii_case(measure))
                    .unwrap_or(false)
        })
    }

    /// The value series of a node referenced by id.
    pub fn find_values(&self, component: &str) -> Option<&SeriesIndexEntry> {
        self.series
            .iter()
            .find(|entry| entry.id == component)
            .or_else(|| {
                self.series.iter().find(|entry| {
                    entry.component_id.as_deref() == Some(component)
                        && entry
                            .measure
                            .as_deref()
                            .map(|m| m.eq_ignore_ascii_case("values"))
                            .unwrap_or(true)
                })
            })
    }
}

/// Classification of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunMode {
    #[default]
    Simulation,
    Telemetry,
    Other(String),
}

impl RunMode {
    pub fn as_str(&self) -> &str {
        match self {
            RunMode::Simulation => "simulation",
            RunMode::Telemetry => "telemetry",
            RunMode::Other(other) => other,
        }
    }

    pub fn is_telemetry(&self) -> bool {
        matches!(self, RunMode::Telemetry)
    }

    pub fn is_simulation(&self) -> bool {
        matches!(self, RunMode::Simulation)
    }
}

impl From<String> for RunMode {
    fn from(value: String) -> Self {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "simulation" => RunMode::Simulation,
            "telemetry" => RunMode::Telemetry,
            _ => RunMode::Other(normalized),
        }
    }
}

impl From<RunMode> for String {
    fn from(mode: RunMode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata read from the model directory of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestMetadata {
    pub mode: RunMode,
    #[serde(default)]
    pub telemetry_sources: Vec<String>,
    #[serde(default)]
    pub node_sources: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub provenance_hash: Option<String>,
    #[serde(default)]
    pub storage: Option<StorageDescriptor>,
}

/// Where the run's model artifacts were stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageDescriptor {
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default)]
    pub metadata_path: Option<String>,
    #[serde(default)]
    pub provenance_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, component: Option<&str>, measure: Option<&str>) -> SeriesIndexEntry {
        SeriesIndexEntry {
            id: id.to_string(),
            component_id: component.map(str::to_string),
            measure: measure.map(str::to_string),
            path: format!("series/{id}.csv"),
            unit: None,
        }
    }

    #[test]
    fn test_find_measure_by_fields_and_id() {
        let index = SeriesIndex {
            schema_version: Some(1),
            series: vec![
                entry("served@Orders@DEFAULT", None, None),
                entry("x", Some("Orders"), Some("QueueDepth")),
            ],
        };
        assert_eq!(
            index.find_measure("Orders", Signal::Served).unwrap().id,
            "served@Orders@DEFAULT"
        );
        assert_eq!(index.find_measure("Orders", Signal::QueueDepth).unwrap().id, "x");
        assert!(index.find_measure("Orders", Signal::Arrivals).is_none());
    }

    #[test]
    fn test_find_values() {
        let index = SeriesIndex {
            schema_version: None,
            series: vec![entry("base_rate", Some("base_rate"), None)],
        };
        assert!(index.find_values("base_rate").is_some());
        assert!(index.find_values("missing").is_none());
    }

    #[test]
    fn test_run_mode_from_string() {
        assert_eq!(RunMode::from("Telemetry".to_string()), RunMode::Telemetry);
        assert_eq!(
            RunMode::from("replay".to_string()),
            RunMode::Other("replay".into())
        );
        let metadata: ManifestMetadata = serde_json::from_str(r#"{"mode":"simulation"}"#).unwrap();
        assert!(metadata.mode.is_simulation());
        assert!(metadata.telemetry_sources.is_empty());
    }

    #[test]
    fn test_metadata_requires_mode() {
        assert!(serde_json::from_str::<ManifestMetadata>(r#"{"schema":"1"}"#).is_err());
    }
}
