//! Retry configuration
//!
//! Each provider manifest declares its own defaults; callers may override any
//! field through [`RetryOverrides`].

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default attempts per quality tier
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default fixed part of the retry delay
pub const DEFAULT_MIN_RETRY_DELAY_MILLIS: u64 = 5_000;
/// Default upper bound of the random part of the retry delay
pub const DEFAULT_MAX_RETRY_ADDITIONAL_DELAY_MILLIS: u64 = 10_000;
/// Default per-attempt timeout
pub const DEFAULT_REQUEST_TIMEOUT_MILLIS: u64 = 5 * 60 * 1000;

/// Retry behaviour for one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per quality tier, retries and crops included
    pub max_attempts: u32,
    /// Fixed part of the delay between attempts
    pub min_retry_delay_millis: u64,
    /// Upper bound of the random part of the delay
    pub max_retry_additional_delay_millis: u64,
    /// Timeout for a single vendor call
    pub request_timeout_millis: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_retry_delay_millis: DEFAULT_MIN_RETRY_DELAY_MILLIS,
            max_retry_additional_delay_millis: DEFAULT_MAX_RETRY_ADDITIONAL_DELAY_MILLIS,
            request_timeout_millis: DEFAULT_REQUEST_TIMEOUT_MILLIS,
        }
    }
}

impl RetryConfig {
    /// Create a configuration with the default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum attempts per tier (at least one)
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the fixed and random parts of the retry delay
    #[must_use]
    pub fn with_retry_delay(mut self, min_millis: u64, max_additional_millis: u64) -> Self {
        self.min_retry_delay_millis = min_millis;
        self.max_retry_additional_delay_millis = max_additional_millis;
        self
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub fn with_request_timeout_millis(mut self, millis: u64) -> Self {
        self.request_timeout_millis = millis;
        self
    }

    /// Apply caller overrides on top of these values
    #[must_use]
    pub fn with_overrides(self, overrides: &RetryOverrides) -> Self {
        Self {
            max_attempts: overrides
                .max_attempts
                .map_or(self.max_attempts, |a| a.max(1)),
            min_retry_delay_millis: overrides
                .min_retry_delay_millis
                .unwrap_or(self.min_retry_delay_millis),
            max_retry_additional_delay_millis: overrides
                .max_retry_additional_delay_millis
                .unwrap_or(self.max_retry_additional_delay_millis),
            request_timeout_millis: overrides
                .request_timeout_millis
                .unwrap_or(self.request_timeout_millis),
        }
    }

    /// Per-attempt timeout
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_millis)
    }

    /// Delay before the next attempt: the fixed part plus random jitter
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        let jitter = if self.max_retry_additional_delay_millis == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.max_retry_additional_delay_millis)
        };
        Duration::from_millis(self.min_retry_delay_millis.saturating_add(jitter))
    }
}

/// Caller supplied replacements for individual [`RetryConfig`] fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOverrides {
    /// Replacement for `max_attempts`
    pub max_attempts: Option<u32>,
    /// Replacement for `min_retry_delay_millis`
    pub min_retry_delay_millis: Option<u64>,
    /// Replacement for `max_retry_additional_delay_millis`
    pub max_retry_additional_delay_millis: Option<u64>,
    /// Replacement for `request_timeout_millis`
    pub request_timeout_millis: Option<u64>,
}
