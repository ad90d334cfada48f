//! Series derivation.
//!
//! Pure, index-aligned functions that fill in signals a run did not record
//! and compute derived metrics. Every function returns `None` instead of
//! producing NaN or infinity; callers still pass results through
//! [`normalize`](crate::numeric::normalize) before they reach a response.

use flowtime_types::{NodeData, Signal};

use crate::numeric::ZERO_EPSILON;

/// Attempts at bin `i`.
///
/// A finite recorded sample wins. Otherwise, when `allow_derived` is set,
/// attempts are `served + failures`.
pub fn attempts(data: &NodeData, i: usize, allow_derived: bool) -> Option<f64> {
    if let Some(recorded) = data.finite(Signal::Attempts, i) {
        return Some(recorded);
    }
    if !allow_derived {
        return None;
    }

    let served = data.finite(Signal::Served, i)?;
    let failures = failures(data, i)?;
    finite(served + failures)
}

/// Failures at bin `i`, falling back to errors.
pub fn failures(data: &NodeData, i: usize) -> Option<f64> {
    if data.has(Signal::Failures) {
        data.finite(Signal::Failures, i)
    } else {
        data.finite(Signal::Errors, i)
    }
}

/// Retry echo at bin `i`.
///
/// A finite recorded sample wins. Otherwise the echo is the convolution of
/// past failures with `kernel`: `sum(failures[i - k] * kernel[k])`. Returns
/// `None` when no term contributed.
pub fn retry_echo(data: &NodeData, i: usize, kernel: &[f64]) -> Option<f64> {
    if let Some(recorded) = data.finite(Signal::RetryEcho, i) {
        return Some(recorded);
    }

    let mut sum = 0.0;
    let mut contributed = false;
    for (k, weight) in kernel.iter().enumerate() {
        let Some(source) = i.checked_sub(k) else {
            break;
        };
        if let Some(f) = failures(data, source) {
            sum += f * weight;
            contributed = true;
        }
    }

    if contributed {
        finite(sum)
    } else {
        None
    }
}

/// `served / capacity`; `None` unless capacity is positive.
pub fn compute_utilization(served: Option<f64>, capacity: Option<f64>) -> Option<f64> {
    let served = served.filter(|v| v.is_finite())?;
    let capacity = capacity.filter(|c| c.is_finite() && *c > 0.0)?;
    finite(served / capacity)
}

pub fn utilization(data: &NodeData, i: usize) -> Option<f64> {
    compute_utilization(
        data.finite(Signal::Served, i),
        data.finite(Signal::Capacity, i),
    )
}

/// Little's-law queue latency in minutes: `queue * bin_minutes / served`.
pub fn compute_latency_minutes(
    queue_depth: Option<f64>,
    served: Option<f64>,
    bin_minutes: f64,
) -> Option<f64> {
    let queue = queue_depth.filter(|v| v.is_finite())?;
    let served = served.filter(|v| v.is_finite() && *v > 0.0)?;
    finite(queue * bin_minutes / served)
}

pub fn latency_minutes(data: &NodeData, i: usize, bin_minutes: f64) -> Option<f64> {
    compute_latency_minutes(
        data.finite(Signal::QueueDepth, i),
        data.finite(Signal::Served, i),
        bin_minutes,
    )
}

/// Mean service time: `processing_time_ms_sum / served_count`.
///
/// Both zero yields zero; a non-positive count with a non-zero sum divides
/// by one.
pub fn compute_service_time_ms(sum_ms: Option<f64>, count: Option<f64>) -> Option<f64> {
    let sum = sum_ms.filter(|v| v.is_finite())?;
    let count = count.filter(|v| v.is_finite())?;

    if sum == 0.0 && count == 0.0 {
        return Some(0.0);
    }
    let denominator = if count > 0.0 { count } else { 1.0 };
    finite(sum / denominator)
}

pub fn service_time_ms(data: &NodeData, i: usize) -> Option<f64> {
    compute_service_time_ms(
        data.finite(Signal::ProcessingTimeMsSum, i),
        data.finite(Signal::ServedCount, i),
    )
}

/// `served / arrivals`; `None` when arrivals are effectively zero.
pub fn compute_throughput_ratio(served: Option<f64>, arrivals: Option<f64>) -> Option<f64> {
    let served = served.filter(|v| v.is_finite())?;
    let arrivals = arrivals.filter(|v| v.is_finite() && v.abs() >= ZERO_EPSILON)?;
    finite(served / arrivals)
}

pub fn throughput_ratio(data: &NodeData, i: usize) -> Option<f64> {
    compute_throughput_ratio(
        data.finite(Signal::Served, i),
        data.finite(Signal::Arrivals, i),
    )
}

/// Share of attempts that did not result in service.
pub fn compute_retry_tax(attempts: Option<f64>, served: Option<f64>) -> Option<f64> {
    let attempts = attempts.filter(|v| v.is_finite() && *v > 0.0)?;
    let served = served.filter(|v| v.is_finite())?;

    let retried = attempts - served;
    if retried <= 0.0 {
        return Some(0.0);
    }
    finite(retried / attempts)
}

pub fn retry_tax(data: &NodeData, i: usize, allow_derived: bool) -> Option<f64> {
    compute_retry_tax(
        attempts(data, i, allow_derived),
        data.finite(Signal::Served, i),
    )
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(signals: &[(Signal, Vec<f64>)]) -> NodeData {
        let mut data = NodeData::default();
        for (signal, values) in signals {
            data.set(*signal, values.clone());
        }
        data
    }

    #[test]
    fn test_attempts_derived_from_served_and_failures() {
        let node = data(&[
            (Signal::Served, vec![10.0, 20.0]),
            (Signal::Failures, vec![2.0, 0.0]),
        ]);
        let derived: Vec<_> = (0..=1).map(|i| attempts(&node, i, true)).collect();
        assert_eq!(derived, vec![Some(12.0), Some(20.0)]);
        assert_eq!(attempts(&node, 0, false), None);
    }

    #[test]
    fn test_attempts_prefers_recorded() {
        let node = data(&[
            (Signal::Attempts, vec![15.0, f64::NAN]),
            (Signal::Served, vec![10.0, 10.0]),
            (Signal::Errors, vec![1.0, 3.0]),
        ]);
        assert_eq!(attempts(&node, 0, true), Some(15.0));
        // NaN recorded sample falls through to served + errors
        assert_eq!(attempts(&node, 1, true), Some(13.0));
    }

    #[test]
    fn test_failures_fall_back_to_errors() {
        let node = data(&[(Signal::Errors, vec![4.0])]);
        assert_eq!(failures(&node, 0), Some(4.0));
        let node = data(&[
            (Signal::Failures, vec![f64::NAN]),
            (Signal::Errors, vec![4.0]),
        ]);
        assert_eq!(failures(&node, 0), None);
    }

    #[test]
    fn test_retry_echo_convolution() {
        let node = data(&[(Signal::Failures, vec![10.0, 0.0, 5.0])]);
        let kernel = [0.0, 0.6, 0.3, 0.1];
        assert_eq!(retry_echo(&node, 0, &kernel), Some(0.0));
        let echo = retry_echo(&node, 1, &kernel).unwrap();
        assert!((echo - 6.0).abs() < 1e-12);
        let echo = retry_echo(&node, 2, &kernel).unwrap();
        assert!((echo - 3.0).abs() < 1e-12);
        // bin 3 has no failures sample of its own but earlier ones contribute
        let echo = retry_echo(&node, 3, &kernel).unwrap();
        assert!((echo - (5.0 * 0.6 + 0.0 * 0.3 + 10.0 * 0.1)).abs() < 1e-12);
    }

    #[test]
    fn test_retry_echo_without_failures_is_none() {
        let node = data(&[(Signal::Served, vec![1.0])]);
        assert_eq!(retry_echo(&node, 0, &[1.0]), None);
        let node = data(&[(Signal::RetryEcho, vec![2.5])]);
        assert_eq!(retry_echo(&node, 0, &[1.0]), Some(2.5));
    }

    #[test]
    fn test_utilization() {
        assert_eq!(compute_utilization(Some(5.0), Some(10.0)), Some(0.5));
        assert_eq!(compute_utilization(Some(5.0), Some(0.0)), None);
        assert_eq!(compute_utilization(Some(5.0), None), None);
        assert_eq!(compute_utilization(None, Some(10.0)), None);
    }

    #[test]
    fn test_latency_minutes() {
        assert_eq!(compute_latency_minutes(Some(10.0), Some(5.0), 5.0), Some(10.0));
        assert_eq!(compute_latency_minutes(Some(10.0), Some(0.0), 5.0), None);
        assert_eq!(compute_latency_minutes(None, Some(5.0), 5.0), None);
    }

    #[test]
    fn test_service_time() {
        assert_eq!(compute_service_time_ms(Some(500.0), Some(10.0)), Some(50.0));
        assert_eq!(compute_service_time_ms(Some(0.0), Some(0.0)), Some(0.0));
        assert_eq!(compute_service_time_ms(Some(120.0), Some(0.0)), Some(120.0));
        assert_eq!(compute_service_time_ms(Some(120.0), None), None);
    }

    #[test]
    fn test_throughput_ratio_zero_arrivals() {
        assert_eq!(compute_throughput_ratio(Some(5.0), Some(0.0)), None);
        assert_eq!(compute_throughput_ratio(Some(5.0), Some(10.0)), Some(0.5));
        assert_eq!(compute_throughput_ratio(None, Some(10.0)), None);
    }

    #[test]
    fn test_retry_tax_boundaries() {
        assert_eq!(compute_retry_tax(Some(0.0), Some(0.0)), None);
        assert_eq!(compute_retry_tax(Some(10.0), Some(10.0)), Some(0.0));
        assert_eq!(compute_retry_tax(Some(10.0), Some(12.0)), Some(0.0));
        let tax = compute_retry_tax(Some(10.0), Some(8.0)).unwrap();
        assert!((tax - 0.2).abs() < 1e-12);
        assert_eq!(compute_retry_tax(None, Some(8.0)), None);
    }
}
