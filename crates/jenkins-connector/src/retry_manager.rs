//! Retry decisions with exponential backoff.
//!
//! Transient failures (connection refused, DNS failure, timeouts, 5xx) are
//! retried until the attempt budget is spent. Everything else stops at once.

use crate::config::RetryPolicy;
use std::time::Duration;

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// May succeed if tried again.
    Transient,
    /// Retrying cannot help (4xx, malformed request).
    Permanent,
}

/// Result of retry decision making
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Retry the operation after the specified delay
    Retry { delay: Duration, next_attempt: u32 },
    /// Stop retrying and surface the failure
    Stop { reason: String },
}

#[derive(Debug, Clone)]
pub struct RetryManager {
    policy: RetryPolicy,
}

impl RetryManager {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts.max(1)
    }

    /// Classify an HTTP status for retry purposes.
    pub fn classify_status(&self, status: u16) -> FailureClass {
        match status {
            500..=599 => FailureClass::Transient,
            _ => FailureClass::Permanent,
        }
    }

    /// Decide what to do after `attempts_made` attempts have failed.
    pub fn should_retry(&self, attempts_made: u32, class: FailureClass) -> RetryDecision {
        if class == FailureClass::Permanent {
            return RetryDecision::Stop {
                reason: "failure is not retryable".to_string(),
            };
        }
        if attempts_made >= self.max_attempts() {
            return RetryDecision::Stop {
                reason: format!("maximum attempts ({}) exhausted", self.max_attempts()),
            };
        }
        RetryDecision::Retry {
            delay: self.calculate_delay(attempts_made),
            next_attempt: attempts_made + 1,
        }
    }

    /// Delay before the attempt following attempt number `attempt` (1-based).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let delay = self.policy.initial_delay_ms as f64 * self.policy.backoff_multiplier.powi(exponent);
        let capped = delay.min(self.policy.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Upper bound on wall-clock time for one call: every attempt timing out
    /// plus every backoff delay.
    pub fn worst_case(&self, per_attempt: Duration) -> Duration {
        let attempts = self.max_attempts();
        let backoff: Duration = (1..attempts).map(|a| self.calculate_delay(a)).sum();
        per_attempt * attempts + backoff
    }
}
