use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::retry::RetrySchedule;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 6000;
const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;
const DEFAULT_BACKOFF_CAP_MS: u64 = 4000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("upstream origin must be an http(s) URL, got '{0}'")]
    InvalidOrigin(String),
    #[error("default_template must not be empty")]
    EmptyTemplate,
    #[error("retry.max_attempts must be at least 1")]
    ZeroAttempts,
    #[error("retry.attempt_timeout_ms must be at least 1")]
    ZeroTimeout,
}

/// Where the upstream identity API lives and how hard to try it.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    /// Scheme and authority of the upstream API, e.g. `https://identity.example.com`.
    pub origin: Url,
    /// Template name sent with lookups that do not specify their own.
    pub default_template: String,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl UpstreamConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.origin.cannot_be_a_base()
            || !matches!(self.origin.scheme(), "http" | "https")
        {
            return Err(ValidationError::InvalidOrigin(self.origin.to_string()));
        }
        if self.default_template.is_empty() {
            return Err(ValidationError::EmptyTemplate);
        }
        if self.retry.max_attempts == 0 {
            return Err(ValidationError::ZeroAttempts);
        }
        if self.retry.attempt_timeout_ms == 0 {
            return Err(ValidationError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Attempt count, per-attempt timeout and backoff shape for upstream calls.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub attempt_timeout_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_timeout_ms: DEFAULT_ATTEMPT_TIMEOUT_MS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_cap_ms: DEFAULT_BACKOFF_CAP_MS,
        }
    }
}

impl RetryConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn schedule(&self) -> RetrySchedule {
        RetrySchedule::new(
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_cap_ms),
        )
    }
}
