//! Raw per-node series.

use serde::{Deserialize, Serialize};

/// A semantic signal a node may record or derive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Signal {
    Arrivals,
    Served,
    Errors,
    Attempts,
    Failures,
    ExhaustedFailures,
    RetryEcho,
    RetryBudgetRemaining,
    ExternalDemand,
    QueueDepth,
    Capacity,
    ProcessingTimeMsSum,
    ServedCount,
}

impl Signal {
    pub const ALL: [Signal; 13] = [
        Signal::Arrivals,
        Signal::Served,
        Signal::Errors,
        Signal::Attempts,
        Signal::Failures,
        Signal::ExhaustedFailures,
        Signal::RetryEcho,
        Signal::RetryBudgetRemaining,
        Signal::ExternalDemand,
        Signal::QueueDepth,
        Signal::Capacity,
        Signal::ProcessingTimeMsSum,
        Signal::ServedCount,
    ];

    /// Measure name as it appears in series indexes and semantics.
    pub fn measure(&self) -> &'static str {
        match self {
            Signal::Arrivals => "arrivals",
            Signal::Served => "served",
            Signal::Errors => "errors",
            Signal::Attempts => "attempts",
            Signal::Failures => "failures",
            Signal::ExhaustedFailures => "exhaustedFailures",
            Signal::RetryEcho => "retryEcho",
            Signal::RetryBudgetRemaining => "retryBudgetRemaining",
            Signal::ExternalDemand => "externalDemand",
            Signal::QueueDepth => "queueDepth",
            Signal::Capacity => "capacity",
            Signal::ProcessingTimeMsSum => "processingTimeMsSum",
            Signal::ServedCount => "servedCount",
        }
    }

    /// Snake-case key used to build warning codes.
    pub fn warning_key(&self) -> &'static str {
        match self {
            Signal::Arrivals => "arrivals",
            Signal::Served => "served",
            Signal::Errors => "errors",
            Signal::Attempts => "attempts",
            Signal::Failures => "failures",
            Signal::ExhaustedFailures => "exhausted_failures",
            Signal::RetryEcho => "retry_echo",
            Signal::RetryBudgetRemaining => "retry_budget_remaining",
            Signal::ExternalDemand => "external_demand",
            Signal::QueueDepth => "queue_depth",
            Signal::Capacity => "capacity",
            Signal::ProcessingTimeMsSum => "processing_time_ms_sum",
            Signal::ServedCount => "served_count",
        }
    }
}

/// Per-node raw series for one run, index-aligned by bin.
///
/// Absent signals are `None`; unavailable samples inside a present series
/// are NaN.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeData {
    pub arrivals: Option<Vec<f64>>,
    pub served: Option<Vec<f64>>,
    pub errors: Option<Vec<f64>>,
    pub attempts: Option<Vec<f64>>,
    pub failures: Option<Vec<f64>>,
    pub exhausted_failures: Option<Vec<f64>>,
    pub retry_echo: Option<Vec<f64>>,
    pub retry_budget_remaining: Option<Vec<f64>>,
    pub external_demand: Option<Vec<f64>>,
    pub queue_depth: Option<Vec<f64>>,
    pub capacity: Option<Vec<f64>>,
    pub processing_time_ms_sum: Option<Vec<f64>>,
    pub served_count: Option<Vec<f64>>,
}

impl NodeData {
    /// All-zero data for the given signals, plus arrivals/served/errors.
    pub fn zeroed<'a>(bins: usize, signals: impl IntoIterator<Item = &'a Signal>) -> Self {
        let mut data = NodeData::default();
        for signal in [Signal::Arrivals, Signal::Served, Signal::Errors] {
            data.set(signal, vec![0.0; bins]);
        }
        for signal in signals {
            data.set(*signal, vec![0.0; bins]);
        }
        data
    }

    pub fn get(&self, signal: Signal) -> Option<&[f64]> {
        self.slot(signal).as_deref()
    }

    pub fn set(&mut self, signal: Signal, values: Vec<f64>) {
        *self.slot_mut(signal) = Some(values);
    }

    pub fn has(&self, signal: Signal) -> bool {
        self.slot(signal).is_some()
    }

    /// Sample at `index`, or `None` when the series is absent or too short.
    ///
    /// Non-finite samples are returned as-is; callers decide how to treat them.
    pub fn sample(&self, signal: Signal, index: usize) -> Option<f64> {
        self.get(signal).and_then(|values| values.get(index).copied())
    }

    /// Finite sample at `index`.
    pub fn finite(&self, signal: Signal, index: usize) -> Option<f64> {
        self.sample(signal, index).filter(|v| v.is_finite())
    }

    fn slot(&self, signal: Signal) -> &Option<Vec<f64>> {
        match signal {
            Signal::Arrivals => &self.arrivals,
            Signal::Served => &self.served,
            Signal::Errors => &self.errors,
            Signal::Attempts => &self.attempts,
            Signal::Failures => &self.failures,
            Signal::ExhaustedFailures => &self.exhausted_failures,
            Signal::RetryEcho => &self.retry_echo,
            Signal::RetryBudgetRemaining => &self.retry_budget_remaining,
            Signal::ExternalDemand => &self.external_demand,
            Signal::QueueDepth => &self.queue_depth,
            Signal::Capacity => &self.capacity,
            Signal::ProcessingTimeMsSum => &self.processing_time_ms_sum,
            Signal::ServedCount => &self.served_count,
        }
    }

    fn slot_mut(&mut self, signal: Signal) -> &mut Option<Vec<f64>> {
        match signal {
            Signal::Arrivals => &mut self.arrivals,
            Signal::Served => &mut self.served,
            Signal::Errors => &mut self.errors,
            Signal::Attempts => &mut self.attempts,
            Signal::Failures => &mut self.failures,
            Signal::ExhaustedFailures => &mut self.exhausted_failures,
            Signal::RetryEcho => &mut self.retry_echo,
            Signal::RetryBudgetRemaining => &mut self.retry_budget_remaining,
            Signal::ExternalDemand => &mut self.external_demand,
            Signal::QueueDepth => &mut self.queue_depth,
            Signal::Capacity => &mut self.capacity,
            Signal::ProcessingTimeMsSum => &mut self.processing_time_ms_sum,
            Signal::ServedCount => &mut self.served_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_includes_flow_signals() {
        let data = NodeData::zeroed(3, &[Signal::QueueDepth]);
        assert_eq!(data.get(Signal::Served), Some(&[0.0, 0.0, 0.0][..]));
        assert_eq!(data.get(Signal::QueueDepth).map(<[f64]>::len), Some(3));
        assert!(!data.has(Signal::Capacity));
    }

    #[test]
    fn test_finite_filters_nan() {
        let mut data = NodeData::default();
        data.set(Signal::Arrivals, vec![1.0, f64::NAN]);
        assert_eq!(data.finite(Signal::Arrivals, 0), Some(1.0));
        assert_eq!(data.finite(Signal::Arrivals, 1), None);
        assert_eq!(data.finite(Signal::Arrivals, 5), None);
    }
}
