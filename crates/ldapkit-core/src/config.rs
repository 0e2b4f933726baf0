//! Configuration for the session pool.

use crate::retry::{RetryPolicy, DEFAULT_CREATE_RETRIES, DEFAULT_CREATE_RETRY_DELAY_MS};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Default number of sessions opened by a pool warm-up.
pub const DEFAULT_MIN_SESSIONS: usize = 1;

/// Default upper bound on concurrently borrowed sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 10;

/// Sizing and health-check settings for a [`SessionPool`](crate::pool::SessionPool).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_bounds"))]
pub struct PoolConfig {
    /// Sessions opened eagerly by `warm_up`
    #[serde(default = "default_min_sessions")]
    pub min_sessions: usize,

    /// Maximum sessions in existence at once; further borrowers wait
    #[validate(range(min = 1, max = 1024))]
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Give up waiting for a free session after this many seconds
    #[validate(range(min = 1, max = 3600))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acquire_timeout_secs: Option<u64>,

    /// Probe idle sessions before handing them out
    #[serde(default)]
    pub test_on_checkout: bool,

    /// Extra attempts when dialing or binding a new session fails
    #[validate(range(min = 0, max = 10))]
    #[serde(default = "default_create_retries")]
    pub max_create_retries: u32,

    /// Initial backoff between session creation attempts
    #[serde(default = "default_create_retry_delay_ms")]
    pub create_retry_delay_ms: u64,
}

const fn default_min_sessions() -> usize {
    DEFAULT_MIN_SESSIONS
}

const fn default_max_sessions() -> usize {
    DEFAULT_MAX_SESSIONS
}

const fn default_create_retries() -> u32 {
    DEFAULT_CREATE_RETRIES
}

const fn default_create_retry_delay_ms() -> u64 {
    DEFAULT_CREATE_RETRY_DELAY_MS
}

fn validate_bounds(config: &PoolConfig) -> std::result::Result<(), ValidationError> {
    if config.min_sessions > config.max_sessions {
        let mut err = ValidationError::new("pool_bounds");
        err.message = Some("min_sessions must not exceed max_sessions".into());
        return Err(err);
    }
    Ok(())
}

impl PoolConfig {
    /// Create a pool configuration with the given bounds.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `min` exceeds `max` or `max` is zero.
    pub fn with_bounds(min: usize, max: usize) -> Result<Self> {
        let config = Self {
            min_sessions: min,
            max_sessions: max,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Sets a bounded wait for session checkout.
    #[must_use]
    pub const fn with_acquire_timeout_secs(mut self, seconds: u64) -> Self {
        self.acquire_timeout_secs = Some(seconds);
        self
    }

    /// Enables or disables the liveness probe on checkout.
    #[must_use]
    pub const fn with_test_on_checkout(mut self, enabled: bool) -> Self {
        self.test_on_checkout = enabled;
        self
    }

    /// Overrides the number of session creation retries.
    #[must_use]
    pub const fn with_create_retries(mut self, retries: u32) -> Self {
        self.max_create_retries = retries;
        self
    }

    /// Overrides the initial creation backoff in milliseconds.
    #[must_use]
    pub const fn with_create_retry_delay_ms(mut self, millis: u64) -> Self {
        self.create_retry_delay_ms = millis;
        self
    }

    /// Checkout wait limit, if configured.
    #[must_use]
    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_secs.map(Duration::from_secs)
    }

    /// Backoff policy applied when creating sessions.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(self.max_create_retries)
            .with_initial_delay(Duration::from_millis(self.create_retry_delay_ms))
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_sessions: DEFAULT_MIN_SESSIONS,
            max_sessions: DEFAULT_MAX_SESSIONS,
            acquire_timeout_secs: None,
            test_on_checkout: false,
            max_create_retries: DEFAULT_CREATE_RETRIES,
            create_retry_delay_ms: DEFAULT_CREATE_RETRY_DELAY_MS,
        }
    }
}
