//! Retry kernel policy.
//!
//! A retry kernel spreads failures from one bin into retry attempts over the
//! following bins. Kernels supplied by a model are validated here; absent or
//! invalid kernels fall back to [`DEFAULT_RETRY_KERNEL`].

/// Kernel used when a node supplies none or an invalid one.
pub const DEFAULT_RETRY_KERNEL: [f64; 4] = [0.0, 0.6, 0.3, 0.1];

/// Warning code for messages produced by this policy.
pub const RETRY_KERNEL_POLICY_CODE: &str = "retry_kernel_policy";

/// Outcome of applying the policy to a node's kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelDecision {
    pub kernel: Vec<f64>,
    pub messages: Vec<String>,
    /// True when the default kernel was substituted for a missing one.
    pub defaulted: bool,
}

/// Validates retry kernels.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryKernelPolicy;

impl RetryKernelPolicy {
    pub fn apply(kernel: Option<&[f64]>) -> KernelDecision {
        let kernel = match kernel {
            Some(k) if !k.is_empty() => k,
            _ => {
                return KernelDecision {
                    kernel: DEFAULT_RETRY_KERNEL.to_vec(),
                    messages: vec![format!(
                        "No retry kernel specified; using default kernel {:?}.",
                        DEFAULT_RETRY_KERNEL
                    )],
                    defaulted: true,
                }
            }
        };

        if let Some((index, weight)) = kernel
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            let problem = if weight.is_finite() {
                "is negative"
            } else {
                "is not a finite number"
            };
            return KernelDecision {
                kernel: DEFAULT_RETRY_KERNEL.to_vec(),
                messages: vec![format!(
                    "Retry kernel weight at index {index} ({weight}) {problem}; using default kernel {:?}.",
                    DEFAULT_RETRY_KERNEL
                )],
                defaulted: false,
            };
        }

        KernelDecision {
            kernel: kernel.to_vec(),
            messages: Vec::new(),
            defaulted: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_kernel_uses_default() {
        let decision = RetryKernelPolicy::apply(None);
        assert_eq!(decision.kernel, DEFAULT_RETRY_KERNEL.to_vec());
        assert_eq!(decision.messages.len(), 1);
        assert!(decision.defaulted);

        let decision = RetryKernelPolicy::apply(Some(&[]));
        assert!(decision.defaulted);
    }

    #[test]
    fn test_negative_weight_falls_back_with_one_message() {
        let decision = RetryKernelPolicy::apply(Some(&[-1.0, 2.0]));
        assert_eq!(decision.kernel, DEFAULT_RETRY_KERNEL.to_vec());
        assert_eq!(decision.messages.len(), 1);
        assert!(decision.messages[0].contains("negative"));
        assert!(!decision.defaulted);
    }

    #[test]
    fn test_non_finite_weight_falls_back() {
        let decision = RetryKernelPolicy::apply(Some(&[0.5, f64::NAN]));
        assert_eq!(decision.kernel, DEFAULT_RETRY_KERNEL.to_vec());
        assert!(decision.messages[0].contains("finite"));
    }

    #[test]
    fn test_valid_kernel_passes_through() {
        let decision = RetryKernelPolicy::apply(Some(&[0.0, 0.5, 0.5]));
        assert_eq!(decision.kernel, vec![0.0, 0.5, 0.5]);
        assert!(decision.messages.is_empty());
    }
}
