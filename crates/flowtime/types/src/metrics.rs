//! Service-level metrics response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Start and timezone of the aggregated range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsWindow {
    pub start: Option<DateTime<Utc>>,
    pub timezone: String,
}

/// Bin geometry of the aggregated range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsGrid {
    pub bin_minutes: f64,
    pub bins: usize,
}

/// SLA attainment of one service over the range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetrics {
    pub id: String,
    /// Fraction of evaluated bins that met the SLA threshold.
    pub sla_pct: f64,
    pub bins_met: usize,
    pub bins_total: usize,
    /// Per-bin served/arrivals ratio, clamped to `[0, 1]`.
    pub mini: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub window: MetricsWindow,
    pub grid: MetricsGrid,
    pub services: Vec<ServiceMetrics>,
}

impl MetricsResponse {
    pub fn service(&self, id: &str) -> Option<&ServiceMetrics> {
        self.services.iter().find(|s| s.id == id)
    }
}
