//! SLA aggregation.
//!
//! Every resolution strategy reduces its data to [`ResolvedService`]s and
//! hands them to [`aggregate`], so the threshold and ratio policy live in one
//! place regardless of where the series came from.

use flowtime_state::numeric::{normalize, normalize_series};
use flowtime_types::ServiceMetrics;

/// Arrivals and served of one service over the aggregated range.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedService {
    pub id: String,
    pub arrivals: Vec<Option<f64>>,
    pub served: Vec<Option<f64>>,
}

impl ResolvedService {
    pub fn new(id: impl Into<String>, arrivals: Vec<Option<f64>>, served: Vec<Option<f64>>) -> Self {
        Self {
            id: id.into(),
            arrivals,
            served,
        }
    }

    /// Build from raw samples, treating non-finite values as unavailable.
    pub fn from_raw(id: impl Into<String>, arrivals: &[f64], served: &[f64]) -> Self {
        let lift = |values: &[f64]| -> Vec<Option<f64>> {
            values
                .iter()
                .map(|v| Some(*v).filter(|v| v.is_finite()))
                .collect()
        };
        Self::new(id, lift(arrivals), lift(served))
    }
}

/// Ratio of one bin, or `None` when either side is unavailable.
///
/// No arrivals means nothing was owed, so the bin counts as met.
pub fn bin_ratio(arrivals: Option<f64>, served: Option<f64>) -> Option<f64> {
    let (arrivals, served) = (arrivals?, served?);
    if !arrivals.is_finite() || !served.is_finite() {
        return None;
    }
    if arrivals <= 0.0 {
        return Some(1.0);
    }
    Some((served / arrivals).clamp(0.0, 1.0))
}

/// SLA attainment of a service.
pub fn aggregate(service: &ResolvedService, threshold: f64) -> ServiceMetrics {
    let len = service.arrivals.len().min(service.served.len());
    let ratios: Vec<Option<f64>> = (0..len)
        .map(|i| bin_ratio(service.arrivals[i], service.served[i]))
        .collect();

    let bins_total = ratios.iter().flatten().count();
    let bins_met = ratios.iter().flatten().filter(|r| **r >= threshold).count();
    let sla_pct = if bins_total == 0 {
        1.0
    } else {
        normalize(bins_met as f64 / bins_total as f64).unwrap_or(0.0)
    };

    ServiceMetrics {
        id: service.id.clone(),
        sla_pct,
        bins_met,
        bins_total,
        mini: normalize_series(ratios),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowtime_state::DEFAULT_SLA_THRESHOLD;

    #[test]
    fn test_sla_example() {
        let service = ResolvedService::from_raw("orders", &[100.0, 100.0, 100.0], &[96.0, 94.0, 99.0]);
        let metrics = aggregate(&service, DEFAULT_SLA_THRESHOLD);

        assert_eq!(metrics.bins_met, 2);
        assert_eq!(metrics.bins_total, 3);
        assert_eq!(metrics.sla_pct, 0.666667);
        assert_eq!(metrics.mini, vec![Some(0.96), Some(0.94), Some(0.99)]);
    }

    #[test]
    fn test_zero_arrivals_counts_as_met() {
        assert_eq!(bin_ratio(Some(0.0), Some(0.0)), Some(1.0));
        assert_eq!(bin_ratio(Some(-1.0), Some(3.0)), Some(1.0));
    }

    #[test]
    fn test_ratio_is_clamped() {
        assert_eq!(bin_ratio(Some(10.0), Some(12.0)), Some(1.0));
        assert_eq!(bin_ratio(Some(10.0), Some(-2.0)), Some(0.0));
    }

    #[test]
    fn test_unavailable_bins_are_not_evaluated() {
        let service = ResolvedService::new(
            "orders",
            vec![Some(100.0), None, Some(100.0)],
            vec![Some(100.0), Some(50.0), Some(f64::NAN)],
        );
        let metrics = aggregate(&service, DEFAULT_SLA_THRESHOLD);
        assert_eq!(metrics.bins_total, 1);
        assert_eq!(metrics.bins_met, 1);
        assert_eq!(metrics.mini, vec![Some(1.0), None, None]);
    }

    #[test]
    fn test_no_evaluated_bins_is_full_attainment() {
        let service = ResolvedService::new("idle", vec![None, None], vec![None, None]);
        let metrics = aggregate(&service, DEFAULT_SLA_THRESHOLD);
        assert_eq!(metrics.sla_pct, 1.0);
        assert_eq!(metrics.bins_total, 0);
    }

    #[test]
    fn test_exact_threshold_is_met() {
        let service = ResolvedService::from_raw("edge", &[100.0], &[95.0]);
        assert_eq!(aggregate(&service, DEFAULT_SLA_THRESHOLD).bins_met, 1);
    }
}
