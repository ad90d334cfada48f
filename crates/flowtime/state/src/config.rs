//! State engine configuration.
//!
//! Defines the data directory, window limits, invariant tolerances, and
//! coloring thresholds. Loaded once and shared read-only.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable that overrides [`StateConfig::data_dir`].
pub const DATA_DIR_ENV: &str = "FLOWTIME_DATA_DIR";

/// Served/arrivals ratio at or above which a bin meets its SLA.
pub const DEFAULT_SLA_THRESHOLD: f64 = 0.95;

/// Configuration for state and metrics queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Directory holding one sub-directory per run.
    pub data_dir: PathBuf,

    /// Largest window, in bins, a single query may request.
    pub max_window_bins: usize,

    /// Allowed `|attempts - (served + failures)|` before warning.
    pub conservation_tolerance: f64,

    /// Served/arrivals ratio at which a bin meets its SLA.
    pub sla_threshold: f64,

    /// Node color thresholds.
    pub coloring: ColoringThresholds,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            max_window_bins: 500,
            conservation_tolerance: 1e-4,
            sla_threshold: DEFAULT_SLA_THRESHOLD,
            coloring: ColoringThresholds::default(),
        }
    }
}

impl StateConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// A missing file yields defaults. `FLOWTIME_DATA_DIR` overrides the
    /// data directory either way.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_toml_str(&contents)?
        } else {
            Self::default()
        };

        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }

        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: StateConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_window_bins == 0 {
            return Err(ConfigError::Invalid("max_window_bins must be positive".into()));
        }
        if !(self.sla_threshold > 0.0 && self.sla_threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "sla_threshold must be in (0, 1], got {}",
                self.sla_threshold
            )));
        }
        if !self.conservation_tolerance.is_finite() || self.conservation_tolerance < 0.0 {
            return Err(ConfigError::Invalid(
                "conservation_tolerance must be a non-negative number".into(),
            ));
        }
        Ok(())
    }
}

/// Thresholds that map derived metrics to node colors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColoringThresholds {
    /// Service utilization below this is green.
    pub utilization_warning: f64,

    /// Service utilization at or above this is red.
    pub utilization_critical: f64,

    /// Queue latency / SLA ratio at or below this is green.
    pub latency_sla_warning: f64,

    /// Queue latency / SLA ratio above this is red.
    pub latency_sla_critical: f64,
}

impl Default for ColoringThresholds {
    fn default() -> Self {
        Self {
            utilization_warning: 0.7,
            utilization_critical: 0.9,
            latency_sla_warning: 1.0,
            latency_sla_critical: 1.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StateConfig::default();
        assert_eq!(config.max_window_bins, 500);
        assert_eq!(config.sla_threshold, DEFAULT_SLA_THRESHOLD);
        assert_eq!(DEFAULT_SLA_THRESHOLD, 0.95);
        assert_eq!(config.conservation_tolerance, 1e-4);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = StateConfig::from_toml_str(
            r#"
data_dir = "/srv/flowtime/runs"

[coloring]
utilization_critical = 0.95
"#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/flowtime/runs"));
        assert_eq!(config.max_window_bins, 500);
        assert_eq!(config.coloring.utilization_critical, 0.95);
        assert_eq!(config.coloring.utilization_warning, 0.7);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let err = StateConfig::from_toml_str("sla_threshold = 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_missing_config() {
        let config = StateConfig::load("/nonexistent/path/flowtime.toml").unwrap();
        assert_eq!(config.max_window_bins, 500);
    }
}
