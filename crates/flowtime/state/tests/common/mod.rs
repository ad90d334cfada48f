//! Run-directory fixtures shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use flowtime_state::{StateConfig, StateQueryService};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A data directory holding a single run.
pub struct RunFixture {
    root: TempDir,
    run_id: String,
}

impl RunFixture {
    pub fn new(run_id: &str) -> Self {
        init_tracing();
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join(run_id).join("model")).unwrap();
        Self {
            root,
            run_id: run_id.to_string(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn data_dir(&self) -> &Path {
        self.root.path()
    }

    pub fn run_dir(&self) -> PathBuf {
        self.root.path().join(&self.run_id)
    }

    pub fn model_dir(&self) -> PathBuf {
        self.run_dir().join("model")
    }

    fn write(&self, path: PathBuf, contents: &str) -> &Self {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
        self
    }

    pub fn manifest(&self, json: &str) -> &Self {
        self.write(self.run_dir().join("manifest.json"), json)
    }

    pub fn default_manifest(&self) -> &Self {
        self.manifest(&format!(r#"{{"runId":"{}"}}"#, self.run_id))
    }

    pub fn model(&self, yaml: &str) -> &Self {
        self.write(self.model_dir().join("model.yaml"), yaml)
    }

    pub fn metadata(&self, json: &str) -> &Self {
        self.write(self.model_dir().join("metadata.json"), json)
    }

    pub fn mode(&self, mode: &str) -> &Self {
        self.metadata(&format!(r#"{{"mode":"{mode}"}}"#))
    }

    pub fn series_index(&self, json: &str) -> &Self {
        self.write(self.run_dir().join("series").join("index.json"), json)
    }

    /// Write `bin,value` rows relative to the model directory.
    pub fn csv(&self, relative: &str, values: &[f64]) -> &Self {
        self.write(self.model_dir().join(relative), &csv_text(values))
    }

    /// Write `bin,value` rows relative to the run directory.
    pub fn run_csv(&self, relative: &str, values: &[f64]) -> &Self {
        self.write(self.run_dir().join(relative), &csv_text(values))
    }

    pub fn config(&self) -> StateConfig {
        StateConfig::with_data_dir(self.data_dir())
    }

    pub fn service(&self) -> StateQueryService {
        StateQueryService::new(self.config())
    }
}

fn csv_text(values: &[f64]) -> String {
    let mut text = String::from("bin,value\n");
    for (bin, value) in values.iter().enumerate() {
        text.push_str(&format!("{bin},{value}\n"));
    }
    text
}

/// Two services, `ingress` feeding `orders` through a lagged attempts edge.
pub const CHAIN_MODEL: &str = r#"
schemaVersion: 1
grid:
  bins: 4
  binSize: 5
  binUnit: minutes
  startTimeUtc: "2025-01-01T00:00:00Z"
topology:
  nodes:
    - id: ingress
      kind: service
      semantics:
        arrivals: file:telemetry/ingress_arrivals.csv
        served: file:telemetry/ingress_served.csv
        errors: file:telemetry/ingress_errors.csv
        capacity: file:telemetry/ingress_capacity.csv
        aliases:
          served: Requests handled
    - id: orders
      kind: service
      semantics:
        arrivals: file:telemetry/orders_arrivals.csv
        served: file:telemetry/orders_served.csv
        attempts: file:telemetry/orders_attempts.csv
        failures: file:telemetry/orders_failures.csv
        processingTimeMsSum: file:telemetry/orders_processing.csv
        servedCount: file:telemetry/orders_served.csv
        retryKernel: [0.0, 0.5, 0.5]
  edges:
    - id: ingress_to_orders
      from: ingress:out
      to: orders:in
      field: attempts
      multiplier: 2
      lag: 1
nodes:
  - id: base_demand
    kind: const
    values: [1, 2]
  - id: demand_shape
    kind: expr
    expr: "base_demand * 2"
"#;

/// Writes the chain model and all of its series.
pub fn chain_run(run_id: &str, mode: &str) -> RunFixture {
    let fixture = RunFixture::new(run_id);
    fixture
        .default_manifest()
        .model(CHAIN_MODEL)
        .mode(mode)
        .csv("telemetry/ingress_arrivals.csv", &[10.0, 10.0, 10.0, 10.0])
        .csv("telemetry/ingress_served.csv", &[9.0, 10.0, 8.0, 10.0])
        .csv("telemetry/ingress_errors.csv", &[1.0, 0.0, 2.0, 0.0])
        .csv("telemetry/ingress_capacity.csv", &[20.0, 20.0, 10.0, 10.0])
        .csv("telemetry/orders_arrivals.csv", &[10.0, 10.0, 10.0, 10.0])
        .csv("telemetry/orders_served.csv", &[8.0, 9.0, 10.0, 7.0])
        .csv("telemetry/orders_attempts.csv", &[10.0, 10.0, 10.0, 10.0])
        .csv("telemetry/orders_failures.csv", &[2.0, 1.0, 0.0, 3.0])
        .csv("telemetry/orders_processing.csv", &[400.0, 450.0, 500.0, 350.0]);
    fixture
}
