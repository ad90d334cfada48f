//! Run artifact collaborators.
//!
//! The state engine reads manifests, models, and series through these
//! traits. [`fs`] provides the file-system implementations used in
//! production; tests substitute their own where needed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flowtime_types::{
    ManifestMetadata, ModelDefinition, NodeData, RunManifest, SeriesIndex, TopologyNode,
};

use crate::error::ArtifactResult;

pub mod csv;
pub mod fs;

pub use self::csv::FsCsvSeriesReader;
pub use self::fs::{FsManifestMetadataReader, FsRunArtifactReader, FsSeriesLoader, YamlModelParser};

/// Reads the run manifest and series index of a run directory.
#[async_trait]
pub trait RunArtifactReader: Send + Sync {
    async fn read_manifest(&self, run_dir: &Path) -> ArtifactResult<RunManifest>;

    async fn read_series_index(&self, run_dir: &Path) -> ArtifactResult<SeriesIndex>;
}

/// Reads the manifest metadata stored next to a run's model.
#[async_trait]
pub trait ManifestMetadataReader: Send + Sync {
    async fn read(&self, model_dir: &Path) -> ArtifactResult<ManifestMetadata>;
}

/// Parses model text into a definition.
pub trait ModelParser: Send + Sync {
    fn parse(&self, yaml: &str) -> ArtifactResult<ModelDefinition>;
}

/// Reads a single-series CSV file.
#[async_trait]
pub trait CsvSeriesReader: Send + Sync {
    /// Values for bins `0..total_bins`; bins past the end of the file are NaN.
    async fn read(&self, path: &Path, total_bins: usize) -> ArtifactResult<Vec<f64>>;
}

/// Where a node's series are resolved from.
#[derive(Debug, Clone, Copy)]
pub struct SeriesLocation<'a> {
    pub run_dir: &'a Path,
    pub model_dir: &'a Path,
    pub series_index: &'a SeriesIndex,
}

impl SeriesLocation<'_> {
    /// Resolve a path relative to the model directory, then the run directory.
    pub async fn resolve(&self, relative: &str) -> PathBuf {
        let path = Path::new(relative);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        let in_model = self.model_dir.join(path);
        if tokio::fs::try_exists(&in_model).await.unwrap_or(false) {
            in_model
        } else {
            self.run_dir.join(path)
        }
    }
}

/// Loads the raw series a node's semantics reference.
#[async_trait]
pub trait SeriesLoader: Send + Sync {
    async fn load_node_data(
        &self,
        node: &TopologyNode,
        location: SeriesLocation<'_>,
        total_bins: usize,
    ) -> ArtifactResult<NodeData>;
}

/// Evaluates a model graph into one series per node.
pub trait GraphEvaluator: Send + Sync {
    fn evaluate(&self, model: &ModelDefinition) -> ArtifactResult<HashMap<String, Vec<f64>>>;
}
