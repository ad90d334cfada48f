//! File-system backed artifact collaborators.
//!
//! Layout of a run directory:
//!
//! ```text
//! <run>/manifest.json
//! <run>/series/index.json
//! <run>/series/*.csv
//! <run>/model/model.yaml     (or <run>/spec.yaml)
//! <run>/model/metadata.json
//! ```

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use flowtime_types::{
    ManifestMetadata, ModelDefinition, NodeData, RunManifest, SemanticRef, SeriesIndex,
    TopologyNode,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, trace};

use super::{
    CsvSeriesReader, FsCsvSeriesReader, ManifestMetadataReader, ModelParser, RunArtifactReader,
    SeriesLoader, SeriesLocation,
};
use crate::error::{ArtifactError, ArtifactResult};

const MANIFEST_FILE: &str = "manifest.json";
const SERIES_INDEX_FILE: &str = "series/index.json";
const METADATA_FILE: &str = "metadata.json";
const PROVENANCE_FILE: &str = "provenance.json";

async fn read_json<T: DeserializeOwned>(path: &Path) -> ArtifactResult<T> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ArtifactError::from_io(path, e))?;
    serde_json::from_str(&contents).map_err(|e| ArtifactError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Reads `manifest.json` and `series/index.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsRunArtifactReader;

#[async_trait]
impl RunArtifactReader for FsRunArtifactReader {
    async fn read_manifest(&self, run_dir: &Path) -> ArtifactResult<RunManifest> {
        read_json(&run_dir.join(MANIFEST_FILE)).await
    }

    async fn read_series_index(&self, run_dir: &Path) -> ArtifactResult<SeriesIndex> {
        match read_json(&run_dir.join(SERIES_INDEX_FILE)).await {
            Err(err) if err.is_not_found() => {
                debug!(run_dir = %run_dir.display(), "No series index; using empty index");
                Ok(SeriesIndex::default())
            }
            other => other,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProvenanceFile {
    #[serde(default, alias = "modelHash")]
    provenance_hash: Option<String>,
}

/// Reads `metadata.json` (and `provenance.json` when present) from the model
/// directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsManifestMetadataReader;

#[async_trait]
impl ManifestMetadataReader for FsManifestMetadataReader {
    async fn read(&self, model_dir: &Path) -> ArtifactResult<ManifestMetadata> {
        let path = model_dir.join(METADATA_FILE);
        let raw: serde_json::Value = read_json(&path).await?;
        let mut metadata: ManifestMetadata =
            serde_json::from_value(raw).map_err(|e| ArtifactError::Incomplete {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        if metadata.provenance_hash.is_none() {
            match read_json::<ProvenanceFile>(&model_dir.join(PROVENANCE_FILE)).await {
                Ok(provenance) => metadata.provenance_hash = provenance.provenance_hash,
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }

        Ok(metadata)
    }
}

/// Parses model YAML with `serde_yaml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlModelParser;

impl ModelParser for YamlModelParser {
    fn parse(&self, yaml: &str) -> ArtifactResult<ModelDefinition> {
        serde_yaml::from_str(yaml).map_err(|e| ArtifactError::Parse(e.to_string()))
    }
}

/// Resolves node semantics to CSV files.
///
/// `file:` references resolve against the model directory, then the run
/// directory. Node-id references resolve through the series index; an id
/// the index does not know leaves the signal absent.
#[derive(Clone)]
pub struct FsSeriesLoader {
    csv: Arc<dyn CsvSeriesReader>,
}

impl FsSeriesLoader {
    pub fn new(csv: Arc<dyn CsvSeriesReader>) -> Self {
        Self { csv }
    }
}

impl Default for FsSeriesLoader {
    fn default() -> Self {
        Self::new(Arc::new(FsCsvSeriesReader))
    }
}

#[async_trait]
impl SeriesLoader for FsSeriesLoader {
    async fn load_node_data(
        &self,
        node: &TopologyNode,
        location: SeriesLocation<'_>,
        total_bins: usize,
    ) -> ArtifactResult<NodeData> {
        let mut data = NodeData::default();

        for signal in node.semantics.referenced_signals() {
            let path = match node.semantics.semantic_ref(signal) {
                Some(SemanticRef::File(relative)) => location.resolve(&relative).await,
                Some(SemanticRef::Node(id)) => match location.series_index.find_values(&id) {
                    Some(entry) => location.run_dir.join(&entry.path),
                    None => {
                        trace!(node_id = %node.id, reference = %id, "Unindexed node reference");
                        continue;
                    }
                },
                None => continue,
            };

            let values = self.csv.read(&path, total_bins).await?;
            data.set(signal, values);
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowtime_types::{NodeKind, SeriesIndexEntry, Signal};

    #[tokio::test]
    async fn test_missing_series_index_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = FsRunArtifactReader
            .read_series_index(dir.path())
            .await
            .unwrap();
        assert!(index.series.is_empty());
    }

    #[tokio::test]
    async fn test_metadata_without_mode_is_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(METADATA_FILE), r#"{"schema":"1"}"#).unwrap();
        let err = FsManifestMetadataReader.read(dir.path()).await.unwrap_err();
        assert!(matches!(err, ArtifactError::Incomplete { .. }));
    }

    #[tokio::test]
    async fn test_metadata_reads_provenance_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(METADATA_FILE), r#"{"mode":"telemetry"}"#).unwrap();
        std::fs::write(
            dir.path().join(PROVENANCE_FILE),
            r#"{"modelHash":"sha256:abc"}"#,
        )
        .unwrap();
        let metadata = FsManifestMetadataReader.read(dir.path()).await.unwrap();
        assert!(metadata.mode.is_telemetry());
        assert_eq!(metadata.provenance_hash.as_deref(), Some("sha256:abc"));
    }

    #[test]
    fn test_yaml_parse_error() {
        let err = YamlModelParser.parse("grid: [unclosed").unwrap_err();
        assert!(matches!(err, ArtifactError::Parse(_)));
    }

    #[tokio::test]
    async fn test_loader_resolves_file_and_node_refs() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("model");
        std::fs::create_dir_all(model_dir.join("telemetry")).unwrap();
        std::fs::create_dir_all(dir.path().join("series")).unwrap();
        std::fs::write(model_dir.join("telemetry/arrivals.csv"), "bin,value\n0,4\n1,5\n").unwrap();
        std::fs::write(dir.path().join("series/served.csv"), "bin,value\n0,3\n1,5\n").unwrap();

        let mut node = TopologyNode::new("orders", NodeKind::Service);
        node.semantics.arrivals = Some("file:telemetry/arrivals.csv".into());
        node.semantics.served = Some("orders_served".into());
        node.semantics.errors = Some("unknown_node".into());

        let index = SeriesIndex {
            schema_version: None,
            series: vec![SeriesIndexEntry {
                id: "orders_served".into(),
                component_id: None,
                measure: None,
                path: "series/served.csv".into(),
                unit: None,
            }],
        };
        let location = SeriesLocation {
            run_dir: dir.path(),
            model_dir: &model_dir,
            series_index: &index,
        };

        let data = FsSeriesLoader::default()
            .load_node_data(&node, location, 2)
            .await
            .unwrap();
        assert_eq!(data.get(Signal::Arrivals), Some(&[4.0, 5.0][..]));
        assert_eq!(data.get(Signal::Served), Some(&[3.0, 5.0][..]));
        assert!(!data.has(Signal::Errors));
    }

    #[tokio::test]
    async fn test_file_refs_prefer_model_dir_then_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("model");
        std::fs::create_dir_all(&model_dir).unwrap();
        std::fs::write(model_dir.join("served.csv"), "1\n").unwrap();
        std::fs::write(dir.path().join("served.csv"), "2\n").unwrap();
        std::fs::write(dir.path().join("arrivals.csv"), "3\n").unwrap();

        let index = SeriesIndex::default();
        let location = SeriesLocation {
            run_dir: dir.path(),
            model_dir: &model_dir,
            series_index: &index,
        };
        assert_eq!(location.resolve("served.csv").await, model_dir.join("served.csv"));
        assert_eq!(
            location.resolve("arrivals.csv").await,
            dir.path().join("arrivals.csv")
        );
        assert_eq!(
            location.resolve("missing.csv").await,
            dir.path().join("missing.csv")
        );
    }

    #[tokio::test]
    async fn test_loader_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut node = TopologyNode::new("orders", NodeKind::Service);
        node.semantics.arrivals = Some("file:missing.csv".into());
        let index = SeriesIndex::default();
        let location = SeriesLocation {
            run_dir: dir.path(),
            model_dir: dir.path(),
            series_index: &index,
        };
        let err = FsSeriesLoader::default()
            .load_node_data(&node, location, 2)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
