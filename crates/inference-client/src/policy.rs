use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per endpoint, including the first one.
    pub max_attempts: u32,
    /// Base delay for network-error backoff (`base * 2^attempt`).
    pub base_backoff_ms: u64,
    /// Base delay for 503 backoff.
    pub unavailable_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Wait used for a 429 without a parseable hint.
    pub rate_limit_default_wait_ms: u64,
    /// Longest 429 wait honoured before failing over to the next endpoint.
    pub rate_limit_ceiling_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 1_000,
            unavailable_backoff_ms: 500,
            max_backoff_ms: 30_000,
            rate_limit_default_wait_ms: 5_000,
            rate_limit_ceiling_ms: 10_000,
            connect_timeout_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn unavailable_backoff(&self) -> Duration {
        Duration::from_millis(self.unavailable_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn rate_limit_default_wait(&self) -> Duration {
        Duration::from_millis(self.rate_limit_default_wait_ms)
    }

    pub fn rate_limit_ceiling(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ceiling_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
