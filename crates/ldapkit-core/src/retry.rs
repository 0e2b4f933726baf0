//! Backoff policy for establishing new directory sessions.
//!
//! Only session creation is retried. Protocol operations are never retried by this layer: a
//! failed add/modify/delete is surfaced to the caller as-is.

use std::time::Duration;

/// Default number of extra attempts made when dialing or binding a new session fails.
pub const DEFAULT_CREATE_RETRIES: u32 = 2;

/// Default delay before the first retry, in milliseconds.
pub const DEFAULT_CREATE_RETRY_DELAY_MS: u64 = 200;

/// Default cap on the delay between attempts, in milliseconds.
pub const DEFAULT_CREATE_RETRY_MAX_DELAY_MS: u64 = 2000;

/// Retry policy with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first failure
    pub max_retries: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Maximum delay between retries (cap for exponential backoff)
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: u32,
}

impl RetryPolicy {
    /// Create a retry policy with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_retries: DEFAULT_CREATE_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_CREATE_RETRY_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_CREATE_RETRY_MAX_DELAY_MS),
            backoff_multiplier: 2,
        }
    }

    /// Create a policy that gives up after the first failure.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
            backoff_multiplier: 1,
        }
    }

    /// Set the maximum number of retries.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the initial delay.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Total number of attempts, counting the first one.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait before `attempt` (zero-based; attempt 0 never waits).
    ///
    /// `delay = min(initial_delay * multiplier^(attempt - 1), max_delay)`
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let factor = self.backoff_multiplier.saturating_pow(attempt - 1);
        let delay = self.initial_delay.saturating_mul(factor);

        std::cmp::min(delay, self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}
