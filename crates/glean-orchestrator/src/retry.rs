use glean_core::{AbandonReason, ErrorKind};

/// Exponential backoff settings for failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Base delay in milliseconds.
    pub backoff_base_ms: u64,
    /// Maximum delay in milliseconds.
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
        }
    }
}

/// What to do with a task whose attempt just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-queue, not before `delay_ms` from now.
    Retry {
        /// Backoff delay.
        delay_ms: u64,
    },
    /// Give up.
    Abandon(AbandonReason),
}

/// `base * 2^attempt`, capped at `backoff_max_ms`.
pub fn compute_backoff(policy: &RetryPolicy, attempt: u32) -> u64 {
    let delay = policy
        .backoff_base_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    delay.min(policy.backoff_max_ms)
}

/// Classifies a failed attempt. `attempt_count` includes the failed attempt.
pub fn decide(
    policy: &RetryPolicy,
    kind: ErrorKind,
    attempt_count: u32,
    max_attempts: u32,
) -> RetryDecision {
    if !kind.is_retriable() {
        RetryDecision::Abandon(AbandonReason::NonRetriable)
    } else if attempt_count >= max_attempts {
        RetryDecision::Abandon(AbandonReason::AttemptsExhausted)
    } else {
        RetryDecision::Retry {
            delay_ms: compute_backoff(policy, attempt_count),
        }
    }
}
