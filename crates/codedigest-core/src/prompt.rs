//! Interactive override collaborator.
//!
//! Crossing the 80% mark of a resource quota consults an injected
//! [`OverridePrompt`]; declining converts into a typed cancellation for that
//! invocation. Non-interactive contexts substitute [`AutoApprove`].

/// Usage snapshot handed to an override prompt.
#[derive(Debug, Clone)]
pub struct QuotaUsage {
    /// Current (or projected) usage.
    pub current: u64,
    /// Configured limit.
    pub limit: u64,
    /// Short description of what is being exhausted.
    pub what: String,
}

impl QuotaUsage {
    /// Create a new usage snapshot.
    pub fn new(current: u64, limit: u64, what: impl Into<String>) -> Self {
        Self {
            current,
            limit,
            what: what.into(),
        }
    }

    /// Usage as a percentage of the limit.
    pub fn percent(&self) -> f64 {
        if self.limit == 0 {
            100.0
        } else {
            self.current as f64 / self.limit as f64 * 100.0
        }
    }
}

/// Injected capability for one-shot quota overrides.
///
/// Implementations must be cheap to call and must not panic; a `false`
/// return aborts the invocation with a cancellation error.
pub trait OverridePrompt: Send + Sync {
    /// Ask whether to grant a one-shot cumulative-size override.
    fn confirm_size_override(&self, usage: &QuotaUsage) -> bool;

    /// Ask whether to grant a one-shot file-count override.
    fn confirm_file_count_override(&self, usage: &QuotaUsage) -> bool;

    /// Ask whether to proceed past the token budget threshold.
    fn confirm_token_override(&self, usage: &QuotaUsage) -> bool;
}

/// Prompt that approves every override; used in non-interactive contexts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl OverridePrompt for AutoApprove {
    fn confirm_size_override(&self, _usage: &QuotaUsage) -> bool {
        true
    }

    fn confirm_file_count_override(&self, _usage: &QuotaUsage) -> bool {
        true
    }

    fn confirm_token_override(&self, _usage: &QuotaUsage) -> bool {
        true
    }
}

/// Prompt that declines every override; useful in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl OverridePrompt for DenyAll {
    fn confirm_size_override(&self, _usage: &QuotaUsage) -> bool {
        false
    }

    fn confirm_file_count_override(&self, _usage: &QuotaUsage) -> bool {
        false
    }

    fn confirm_token_override(&self, _usage: &QuotaUsage) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        let usage = QuotaUsage::new(80, 100, "files");
        assert!((usage.percent() - 80.0).abs() < f64::EPSILON);
        let degenerate = QuotaUsage::new(5, 0, "files");
        assert!((degenerate.percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_auto_approve() {
        let usage = QuotaUsage::new(80, 100, "bytes");
        assert!(AutoApprove.confirm_size_override(&usage));
        assert!(!DenyAll.confirm_token_override(&usage));
    }
}
