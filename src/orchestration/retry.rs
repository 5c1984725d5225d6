//! Bounded retry policy for provider attempts.
//!
//! Retries apply only to transient-classified provider failures. The
//! delay grows exponentially from `base_delay`, capped at `max_delay`.

use std::time::Duration;

/// Default number of attempts per task (including the first).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Bounded retry policy with exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first. Minimum 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Upper bound on the backoff delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy with the given bounds.
    ///
    /// `max_attempts` is clamped to at least 1 so every task gets one
    /// attempt.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Backoff delay after the given (1-based) failed attempt.
    ///
    /// Attempt 1 waits `base_delay`, attempt 2 waits double, and so
    /// on, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let millis = self
            .base_delay
            .as_millis()
            .saturating_mul(1u128 << exponent)
            .min(self.max_delay.as_millis());
        Duration::from_millis(millis as u64)
    }

    /// Check whether another attempt is allowed after `attempt`
    /// attempts have completed.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(500),
            Duration::from_secs(10),
        )
    }
}
