//! Run context loading.
//!
//! A [`StateRunContext`] is assembled once per request: the loader resolves
//! the run directory, reads the manifest, model, and metadata, loads each
//! topology node's raw series, fills gaps from the series index, applies the
//! retry kernel policy, and records data-quality warnings. Structural
//! failures abort the load; data gaps become warnings.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flowtime_types::{
    GridDefinition, ManifestMetadata, ModelDefinition, ModelNode, NodeData, NodeKind,
    RunManifest, SeriesIndex, Signal, StateWarning, Topology, TopologyNode,
};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::artifacts::{
    CsvSeriesReader, FsCsvSeriesReader, FsManifestMetadataReader, FsRunArtifactReader,
    FsSeriesLoader, ManifestMetadataReader, ModelParser, RunArtifactReader, SeriesLoader,
    SeriesLocation, YamlModelParser,
};
use crate::config::StateConfig;
use crate::derivation;
use crate::error::{ArtifactError, StateQueryError, StateResult};
use crate::retry_kernel::{RetryKernelPolicy, RETRY_KERNEL_POLICY_CODE};

const MODEL_DIR: &str = "model";
const MODEL_FILE: &str = "model.yaml";
const SPEC_FILE: &str = "spec.yaml";

pub const PROVENANCE_MISMATCH_CODE: &str = "provenance_mismatch";
pub const TELEMETRY_SOURCES_MISSING_CODE: &str = "telemetry_sources_missing";
pub const TELEMETRY_SOURCES_UNRESOLVED_CODE: &str = "telemetry_sources_unresolved";
pub const CONSERVATION_MISMATCH_CODE: &str = "attempts_conservation_mismatch";
pub const VALUE_SERIES_MISSING_CODE: &str = "value_series_missing";

/// Whether a query resolves computed (const/expr/pmf) node series too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    /// Topology nodes only.
    #[default]
    Operational,
    /// Topology nodes plus computed model nodes.
    Full,
}

impl QueryMode {
    pub fn includes_computed(&self) -> bool {
        matches!(self, QueryMode::Full)
    }
}

/// Accumulates global and node-scoped warnings while a context loads.
#[derive(Debug, Clone, Default)]
pub struct WarningBuilder {
    global: Vec<StateWarning>,
    by_node: BTreeMap<String, Vec<StateWarning>>,
}

impl WarningBuilder {
    pub fn push(&mut self, warning: StateWarning) {
        self.global.push(warning);
    }

    pub fn push_node(&mut self, node_id: &str, warning: StateWarning) {
        self.by_node
            .entry(node_id.to_string())
            .or_default()
            .push(warning.for_node(node_id));
    }

    pub fn has_global(&self, code: &str) -> bool {
        self.global.iter().any(|w| w.code == code)
    }

    pub fn node_count(&self, node_id: &str) -> usize {
        self.by_node.get(node_id).map(Vec::len).unwrap_or(0)
    }

    pub fn finish(self) -> (Vec<StateWarning>, BTreeMap<String, Vec<StateWarning>>) {
        (self.global, self.by_node)
    }
}

/// Value series of a computed model node.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedSeries {
    pub id: String,
    pub kind: NodeKind,
    pub values: Vec<f64>,
}

/// Run artifacts resolved before any series are loaded.
#[derive(Debug, Clone)]
pub struct LoadedRun {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub model_dir: PathBuf,
    pub manifest: RunManifest,
    pub series_index: SeriesIndex,
    pub model: ModelDefinition,
    pub topology: Topology,
    pub metadata: ManifestMetadata,
}

/// Everything a state query needs, built once per request.
#[derive(Debug, Clone)]
pub struct StateRunContext {
    pub run: LoadedRun,
    pub node_data: HashMap<String, NodeData>,
    /// Retry kernel per node after policy application.
    pub kernels: HashMap<String, Vec<f64>>,
    pub computed: Vec<ComputedSeries>,
    pub warnings: Vec<StateWarning>,
    pub node_warnings: BTreeMap<String, Vec<StateWarning>>,
}

impl StateRunContext {
    pub fn run_id(&self) -> &str {
        &self.run.run_id
    }

    pub fn grid(&self) -> &GridDefinition {
        &self.run.model.grid
    }

    pub fn total_bins(&self) -> usize {
        self.run.model.grid.bins
    }

    pub fn bin_minutes(&self) -> f64 {
        self.run.model.grid.bin_duration_minutes()
    }

    pub fn topology(&self) -> &Topology {
        &self.run.topology
    }

    pub fn metadata(&self) -> &ManifestMetadata {
        &self.run.metadata
    }

    pub fn data(&self, node_id: &str) -> Option<&NodeData> {
        self.node_data.get(node_id)
    }

    pub fn kernel(&self, node_id: &str) -> &[f64] {
        self.kernels
            .get(node_id)
            .map(Vec::as_slice)
            .unwrap_or(&crate::retry_kernel::DEFAULT_RETRY_KERNEL)
    }

    pub fn warnings_for(&self, node_id: &str) -> &[StateWarning] {
        self.node_warnings
            .get(node_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Merge warnings produced after loading, such as by mode validation.
    pub fn absorb_warnings(
        &mut self,
        warnings: Vec<StateWarning>,
        node_warnings: BTreeMap<String, Vec<StateWarning>>,
    ) {
        self.warnings.extend(warnings);
        for (node_id, extra) in node_warnings {
            self.node_warnings.entry(node_id).or_default().extend(extra);
        }
    }

    /// Telemetry sources of a node: manifest node sources, else `file:` refs.
    pub fn sources_for(&self, node: &TopologyNode) -> Vec<String> {
        match self.run.metadata.node_sources.get(&node.id) {
            Some(sources) if !sources.is_empty() => sources.clone(),
            _ => node.semantics.file_references(),
        }
    }
}

/// Builds [`StateRunContext`]s from run directories.
#[derive(Clone)]
pub struct RunContextLoader {
    config: Arc<StateConfig>,
    artifacts: Arc<dyn RunArtifactReader>,
    metadata_reader: Arc<dyn ManifestMetadataReader>,
    parser: Arc<dyn ModelParser>,
    series_loader: Arc<dyn SeriesLoader>,
    csv: Arc<dyn CsvSeriesReader>,
}

impl RunContextLoader {
    /// Loader backed by the file-system collaborators.
    pub fn new(config: Arc<StateConfig>) -> Self {
        let csv: Arc<dyn CsvSeriesReader> = Arc::new(FsCsvSeriesReader);
        Self {
            config,
            artifacts: Arc::new(FsRunArtifactReader),
            metadata_reader: Arc::new(FsManifestMetadataReader),
            parser: Arc::new(YamlModelParser),
            series_loader: Arc::new(FsSeriesLoader::new(csv.clone())),
            csv,
        }
    }

    pub fn with_artifact_reader(mut self, artifacts: Arc<dyn RunArtifactReader>) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn with_metadata_reader(mut self, reader: Arc<dyn ManifestMetadataReader>) -> Self {
        self.metadata_reader = reader;
        self
    }

    pub fn with_model_parser(mut self, parser: Arc<dyn ModelParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_series_loader(mut self, loader: Arc<dyn SeriesLoader>) -> Self {
        self.series_loader = loader;
        self
    }

    pub fn with_csv_reader(mut self, csv: Arc<dyn CsvSeriesReader>) -> Self {
        self.csv = csv;
        self
    }

    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    /// Resolve and validate the run's artifacts without loading series.
    #[instrument(skip(self))]
    pub async fn load_run(&self, run_id: &str) -> StateResult<LoadedRun> {
        validate_run_id(run_id)?;

        let run_dir = self.config.data_dir.join(run_id);
        if !dir_exists(&run_dir).await {
            return Err(StateQueryError::NotFound(format!("run '{run_id}' not found")));
        }

        let manifest = self
            .artifacts
            .read_manifest(&run_dir)
            .await
            .map_err(|e| artifact_failure(run_id, "manifest", e))?;
        let series_index = self
            .artifacts
            .read_series_index(&run_dir)
            .await
            .map_err(|e| artifact_failure(run_id, "series index", e))?;

        let (model_dir, model_path) = resolve_model_path(&run_dir).await.ok_or_else(|| {
            StateQueryError::NotFound(format!("model for run '{run_id}' not found"))
        })?;
        let model_text = tokio::fs::read_to_string(&model_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StateQueryError::NotFound(format!("model file {} not found", model_path.display()))
            } else {
                error!(run_id, path = %model_path.display(), error = %e, "Failed to read model");
                StateQueryError::Internal(format!("failed to read model: {e}"))
            }
        })?;

        let model = self.parser.parse(&model_text).map_err(|e| {
            warn!(run_id, error = %e, "Model failed to parse");
            StateQueryError::conflict(format!("model for run '{run_id}' could not be parsed: {e}"))
        })?;

        let topology = match &model.topology {
            Some(topology) if !topology.nodes.is_empty() => topology.clone(),
            _ => {
                return Err(StateQueryError::PreconditionFailed(format!(
                    "model for run '{run_id}' has no topology"
                )))
            }
        };

        let metadata = self
            .metadata_reader
            .read(&model_dir)
            .await
            .map_err(|e| match e {
                ArtifactError::Incomplete { .. } | ArtifactError::Malformed { .. } => {
                    StateQueryError::conflict(format!(
                        "manifest metadata for run '{run_id}' is incomplete: {e}"
                    ))
                }
                other => artifact_failure(run_id, "manifest metadata", other),
            })?;

        check_provenance(run_id, &manifest, &metadata)?;

        debug!(
            run_id,
            mode = %metadata.mode,
            nodes = topology.nodes.len(),
            bins = model.grid.bins,
            "Resolved run artifacts"
        );

        Ok(LoadedRun {
            run_id: run_id.to_string(),
            run_dir,
            model_dir,
            manifest,
            series_index,
            model,
            topology,
            metadata,
        })
    }

    /// Build the full context for a state query.
    #[instrument(skip(self))]
    pub async fn load(&self, run_id: &str, mode: QueryMode) -> StateResult<StateRunContext> {
        let run = self.load_run(run_id).await?;
        let bins = run.model.grid.bins;
        let telemetry = run.metadata.mode.is_telemetry();

        let mut warnings = WarningBuilder::default();
        let mut node_data = HashMap::with_capacity(run.topology.nodes.len());
        let mut kernels = HashMap::with_capacity(run.topology.nodes.len());

        for node in &run.topology.nodes {
            let location = SeriesLocation {
                run_dir: &run.run_dir,
                model_dir: &run.model_dir,
                series_index: &run.series_index,
            };

            let (mut data, fallback) = match self
                .series_loader
                .load_node_data(node, location, bins)
                .await
            {
                Ok(data) => (data, false),
                Err(err) if telemetry && err.is_not_found() => {
                    warn!(run_id, node_id = %node.id, error = %err, "Telemetry source unresolved; zero-filling node");
                    warnings.push_node(
                        &node.id,
                        StateWarning::new(
                            TELEMETRY_SOURCES_UNRESOLVED_CODE,
                            format!(
                                "Telemetry sources for node '{}' could not be resolved ({err}); series are zero-filled.",
                                node.id
                            ),
                        ),
                    );
                    if !warnings.has_global(TELEMETRY_SOURCES_MISSING_CODE) {
                        warnings.push(StateWarning::new(
                            TELEMETRY_SOURCES_MISSING_CODE,
                            "One or more telemetry sources are missing; affected nodes are zero-filled.",
                        ));
                    }
                    let referenced = node.semantics.referenced_signals();
                    (NodeData::zeroed(bins, &referenced), true)
                }
                Err(err) => {
                    error!(run_id, node_id = %node.id, error = %err, "Failed to load node series");
                    return Err(StateQueryError::Internal(format!(
                        "failed to load series for node '{}': {err}",
                        node.id
                    )));
                }
            };

            if !fallback {
                self.augment_from_index(&run, node, &mut data, bins).await?;
                check_series_presence(node, &data, bins, &mut warnings);
            }

            let kernel = apply_kernel_policy(node, &data, &mut warnings);
            check_conservation(
                node,
                &data,
                bins,
                self.config.conservation_tolerance,
                &mut warnings,
            );

            kernels.insert(node.id.clone(), kernel);
            node_data.insert(node.id.clone(), data);
        }

        let computed = if mode.includes_computed() {
            self.load_computed(&run, &mut warnings).await?
        } else {
            Vec::new()
        };

        let (warnings, node_warnings) = warnings.finish();
        info!(
            run_id,
            nodes = node_data.len(),
            computed = computed.len(),
            warnings = warnings.len() + node_warnings.values().map(Vec::len).sum::<usize>(),
            "Loaded state run context"
        );

        Ok(StateRunContext {
            run,
            node_data,
            kernels,
            computed,
            warnings,
            node_warnings,
        })
    }

    /// Fill absent signals from series the index lists for this node.
    async fn augment_from_index(
        &self,
        run: &LoadedRun,
        node: &TopologyNode,
        data: &mut NodeData,
        bins: usize,
    ) -> StateResult<()> {
        for signal in Signal::ALL {
            if data.has(signal) {
                continue;
            }
            let Some(entry) = run.series_index.find_measure(&node.id, signal) else {
                continue;
            };

            let path = run.run_dir.join(&entry.path);
            match self.csv.read(&path, bins).await {
                Ok(values) => {
                    trace!(node_id = %node.id, measure = signal.measure(), "Augmented series from index");
                    data.set(signal, values);
                }
                Err(err) if err.is_not_found() => {
                    debug!(node_id = %node.id, path = %path.display(), "Indexed series file missing");
                }
                Err(err) => {
                    error!(node_id = %node.id, path = %path.display(), error = %err, "Failed to read indexed series");
                    return Err(StateQueryError::Internal(format!(
                        "failed to read series {}: {err}",
                        path.display()
                    )));
                }
            }
        }
        Ok(())
    }

    async fn load_computed(
        &self,
        run: &LoadedRun,
        warnings: &mut WarningBuilder,
    ) -> StateResult<Vec<ComputedSeries>> {
        let bins = run.model.grid.bins;
        let mut computed = Vec::new();

        for node in run.model.computed_nodes() {
            match self.resolve_values(run, node, bins).await? {
                Some(values) => computed.push(ComputedSeries {
                    id: node.id.clone(),
                    kind: node.kind,
                    values,
                }),
                None => warnings.push(
                    StateWarning::new(
                        VALUE_SERIES_MISSING_CODE,
                        format!("No value series found for {} node '{}'.", node.kind, node.id),
                    )
                    .for_node(&node.id),
                ),
            }
        }

        Ok(computed)
    }

    async fn resolve_values(
        &self,
        run: &LoadedRun,
        node: &ModelNode,
        bins: usize,
    ) -> StateResult<Option<Vec<f64>>> {
        if let Some(values) = node.values.as_ref().filter(|v| !v.is_empty()) {
            return Ok(Some(pad_values(values, bins)));
        }

        let Some(entry) = run.series_index.find_values(&node.id) else {
            return Ok(None);
        };
        let path = run.run_dir.join(&entry.path);
        match self.csv.read(&path, bins).await {
            Ok(values) => Ok(Some(values)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(StateQueryError::Internal(format!(
                "failed to read value series for '{}': {err}",
                node.id
            ))),
        }
    }
}

fn validate_run_id(run_id: &str) -> StateResult<()> {
    let trimmed = run_id.trim();
    if trimmed.is_empty() {
        return Err(StateQueryError::InvalidRequest("runId must be provided".into()));
    }
    if trimmed != run_id
        || trimmed.contains(['/', '\\'])
        || trimmed == "."
        || trimmed.contains("..")
    {
        return Err(StateQueryError::InvalidRequest(format!(
            "runId '{run_id}' is not a valid run identifier"
        )));
    }
    Ok(())
}

async fn dir_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// `model/model.yaml`, falling back to `spec.yaml` in the run directory.
async fn resolve_model_path(run_dir: &Path) -> Option<(PathBuf, PathBuf)> {
    let model_dir = run_dir.join(MODEL_DIR);
    let model_path = model_dir.join(MODEL_FILE);
    if file_exists(&model_path).await {
        return Some((model_dir, model_path));
    }

    let spec_path = run_dir.join(SPEC_FILE);
    if file_exists(&spec_path).await {
        let model_dir = if dir_exists(&model_dir).await {
            model_dir
        } else {
            run_dir.to_path_buf()
        };
        return Some((model_dir, spec_path));
    }

    None
}

fn artifact_failure(run_id: &str, what: &str, err: ArtifactError) -> StateQueryError {
    if err.is_not_found() {
        StateQueryError::NotFound(format!("{what} for run '{run_id}' not found"))
    } else {
        error!(run_id, artifact = what, error = %err, "Failed to read run artifact");
        StateQueryError::Internal(format!("failed to read {what} for run '{run_id}': {err}"))
    }
}

fn normalize_hash(hash: &str) -> String {
    let lower = hash.trim().to_ascii_lowercase();
    lower
        .strip_prefix("sha256:")
        .map(str::to_string)
        .unwrap_or(lower)
}

fn check_provenance(
    run_id: &str,
    manifest: &RunManifest,
    metadata: &ManifestMetadata,
) -> StateResult<()> {
    let (Some(model_hash), Some(provenance_hash)) = (
        manifest.model_hash.as_deref().filter(|h| !h.trim().is_empty()),
        metadata.provenance_hash.as_deref().filter(|h| !h.trim().is_empty()),
    ) else {
        return Ok(());
    };

    if normalize_hash(model_hash) != normalize_hash(provenance_hash) {
        warn!(run_id, model_hash, provenance_hash, "Provenance hash mismatch");
        return Err(StateQueryError::conflict_with_code(
            format!(
                "model hash '{model_hash}' does not match provenance hash '{provenance_hash}' for run '{run_id}'"
            ),
            PROVENANCE_MISMATCH_CODE,
        ));
    }
    Ok(())
}

/// Warn for every referenced signal with no finite samples.
fn check_series_presence(
    node: &TopologyNode,
    data: &NodeData,
    bins: usize,
    warnings: &mut WarningBuilder,
) {
    for signal in node.semantics.referenced_signals() {
        let has_samples = data
            .get(signal)
            .map(|values| values.iter().take(bins).any(|v| v.is_finite()))
            .unwrap_or(false);
        if has_samples {
            continue;
        }

        warnings.push_node(
            &node.id,
            StateWarning::new(
                format!("{}_series_missing", signal.warning_key()),
                format!(
                    "Node '{}' references {} but no samples were found.",
                    node.id,
                    signal.measure()
                ),
            ),
        );
    }
}

/// Apply the retry kernel policy and record its messages.
///
/// A substituted default is reported only where it feeds a derived retry
/// echo: service nodes with failures or errors and no recorded echo.
fn apply_kernel_policy(
    node: &TopologyNode,
    data: &NodeData,
    warnings: &mut WarningBuilder,
) -> Vec<f64> {
    let decision = RetryKernelPolicy::apply(node.semantics.retry_kernel.as_deref());

    if decision.defaulted && !feeds_retry_echo(node, data) {
        return decision.kernel;
    }

    for message in &decision.messages {
        let warning = if decision.defaulted {
            StateWarning::info(RETRY_KERNEL_POLICY_CODE, message.clone())
        } else {
            StateWarning::new(RETRY_KERNEL_POLICY_CODE, message.clone())
        };
        warnings.push_node(&node.id, warning);
    }

    decision.kernel
}

fn feeds_retry_echo(node: &TopologyNode, data: &NodeData) -> bool {
    node.kind == NodeKind::Service
        && !data.has(Signal::RetryEcho)
        && (data.has(Signal::Failures) || data.has(Signal::Errors))
}

/// Warn once when recorded attempts disagree with `served + failures`.
fn check_conservation(
    node: &TopologyNode,
    data: &NodeData,
    bins: usize,
    tolerance: f64,
    warnings: &mut WarningBuilder,
) {
    if !data.has(Signal::Attempts) || !data.has(Signal::Served) {
        return;
    }

    for bin in 0..bins {
        let (Some(attempts), Some(served), Some(failures)) = (
            data.finite(Signal::Attempts, bin),
            data.finite(Signal::Served, bin),
            derivation::failures(data, bin),
        ) else {
            continue;
        };

        let delta = (attempts - (served + failures)).abs();
        if delta > tolerance {
            warnings.push_node(
                &node.id,
                StateWarning::new(
                    CONSERVATION_MISMATCH_CODE,
                    format!(
                        "Node '{}' bin {bin}: attempts {attempts} != served {served} + failures {failures} (delta {delta}).",
                        node.id
                    ),
                ),
            );
            return;
        }
    }
}

/// Inline values truncated or NaN-padded to `bins`.
fn pad_values(values: &[f64], bins: usize) -> Vec<f64> {
    (0..bins)
        .map(|i| {
            values
                .get(i)
                .copied()
                .filter(|v| v.is_finite())
                .unwrap_or(f64::NAN)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowtime_types::WarningSeverity;

    fn data(signals: &[(Signal, Vec<f64>)]) -> NodeData {
        let mut data = NodeData::default();
        for (signal, values) in signals {
            data.set(*signal, values.clone());
        }
        data
    }

    #[test]
    fn test_run_id_validation() {
        assert!(validate_run_id("run_20250101").is_ok());
        assert!(matches!(
            validate_run_id(""),
            Err(StateQueryError::InvalidRequest(_))
        ));
        assert!(validate_run_id("../etc").is_err());
        assert!(validate_run_id("a/b").is_err());
        assert!(validate_run_id(" padded").is_err());
    }

    #[test]
    fn test_conservation_mismatch_warns_once() {
        let node = TopologyNode::new("orders", NodeKind::Service);
        let node_data = data(&[
            (Signal::Attempts, vec![10.0, 50.0]),
            (Signal::Served, vec![6.0, 1.0]),
            (Signal::Failures, vec![3.0, 1.0]),
        ]);
        let mut warnings = WarningBuilder::default();
        check_conservation(&node, &node_data, 2, 1e-4, &mut warnings);

        let (_, by_node) = warnings.finish();
        let node_warnings = &by_node["orders"];
        assert_eq!(node_warnings.len(), 1);
        assert_eq!(node_warnings[0].code, CONSERVATION_MISMATCH_CODE);
        assert!(node_warnings[0].message.contains("bin 0"));
    }

    #[test]
    fn test_conservation_within_tolerance() {
        let node = TopologyNode::new("orders", NodeKind::Service);
        let node_data = data(&[
            (Signal::Attempts, vec![10.00005]),
            (Signal::Served, vec![7.0]),
            (Signal::Errors, vec![3.0]),
        ]);
        let mut warnings = WarningBuilder::default();
        check_conservation(&node, &node_data, 1, 1e-4, &mut warnings);
        assert_eq!(warnings.node_count("orders"), 0);
    }

    #[test]
    fn test_invalid_kernel_records_one_policy_warning() {
        let mut node = TopologyNode::new("orders", NodeKind::Service);
        node.semantics.retry_kernel = Some(vec![-1.0, 2.0]);
        let mut warnings = WarningBuilder::default();
        let kernel = apply_kernel_policy(&node, &NodeData::default(), &mut warnings);

        assert_eq!(kernel, crate::retry_kernel::DEFAULT_RETRY_KERNEL.to_vec());
        let (_, by_node) = warnings.finish();
        assert_eq!(by_node["orders"].len(), 1);
        assert_eq!(by_node["orders"][0].code, RETRY_KERNEL_POLICY_CODE);
        assert_eq!(by_node["orders"][0].node_id.as_deref(), Some("orders"));
    }

    #[test]
    fn test_default_kernel_reported_where_it_feeds_retry_echo() {
        let errors = data(&[(Signal::Errors, vec![1.0, 0.0])]);
        let failures = data(&[(Signal::Failures, vec![2.0, 0.0])]);
        let echoed = data(&[
            (Signal::Failures, vec![2.0, 0.0]),
            (Signal::RetryEcho, vec![0.0, 1.0]),
        ]);

        let mut warnings = WarningBuilder::default();
        let plain = TopologyNode::new("plain", NodeKind::Service);
        apply_kernel_policy(&plain, &NodeData::default(), &mut warnings);
        let with_errors = TopologyNode::new("with_errors", NodeKind::Service);
        apply_kernel_policy(&with_errors, &errors, &mut warnings);
        let with_failures = TopologyNode::new("with_failures", NodeKind::Service);
        apply_kernel_policy(&with_failures, &failures, &mut warnings);
        let recorded = TopologyNode::new("recorded", NodeKind::Service);
        apply_kernel_policy(&recorded, &echoed, &mut warnings);
        let queue = TopologyNode::new("queue", NodeKind::Queue);
        apply_kernel_policy(&queue, &errors, &mut warnings);

        assert_eq!(warnings.node_count("plain"), 0);
        assert_eq!(warnings.node_count("with_errors"), 1);
        assert_eq!(warnings.node_count("with_failures"), 1);
        assert_eq!(warnings.node_count("recorded"), 0);
        assert_eq!(warnings.node_count("queue"), 0);

        let (_, by_node) = warnings.finish();
        assert_eq!(by_node["with_errors"][0].code, RETRY_KERNEL_POLICY_CODE);
        assert_eq!(by_node["with_errors"][0].severity, WarningSeverity::Info);
    }

    #[test]
    fn test_series_presence_warns_for_empty_reference() {
        let mut node = TopologyNode::new("orders", NodeKind::Service);
        node.semantics.arrivals = Some("file:arrivals.csv".into());
        node.semantics.served = Some("file:served.csv".into());
        let node_data = data(&[
            (Signal::Arrivals, vec![f64::NAN, f64::NAN]),
            (Signal::Served, vec![1.0, f64::NAN]),
        ]);

        let mut warnings = WarningBuilder::default();
        check_series_presence(&node, &node_data, 2, &mut warnings);
        let (_, by_node) = warnings.finish();
        assert_eq!(by_node["orders"].len(), 1);
        assert_eq!(by_node["orders"][0].code, "arrivals_series_missing");
    }

    #[test]
    fn test_provenance_hash_comparison() {
        let manifest = RunManifest {
            run_id: "r".into(),
            model_hash: Some("sha256:ABC".into()),
            ..RunManifest::default()
        };
        let mut metadata = ManifestMetadata {
            provenance_hash: Some("abc".into()),
            ..ManifestMetadata::default()
        };
        assert!(check_provenance("r", &manifest, &metadata).is_ok());

        metadata.provenance_hash = Some("def".into());
        let err = check_provenance("r", &manifest, &metadata).unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.code(), Some(PROVENANCE_MISMATCH_CODE));
    }

    #[test]
    fn test_pad_values() {
        let padded = pad_values(&[1.0, f64::INFINITY, 3.0], 4);
        assert_eq!(padded[0], 1.0);
        assert!(padded[1].is_nan());
        assert_eq!(padded[2], 3.0);
        assert!(padded[3].is_nan());
        assert_eq!(pad_values(&[1.0, 2.0, 3.0], 2), vec![1.0, 2.0]);
    }
}
