use std::time::Duration;

use http::header::RETRY_AFTER;
use http::HeaderMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::errors::InferenceError;
use crate::policy::RetryPolicy;

static RETRY_DELAY_FIELD: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#""retryDelay"\s*:\s*"([0-9]+(?:\.[0-9]+)?)s""#).ok());

static RETRY_PHRASE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)retry\s+(?:after|in)\s+([0-9]+(?:\.[0-9]+)?)\s*(ms|milliseconds?|s|secs?|seconds?)?\b",
    )
    .ok()
});

/// Attempt bookkeeping for one endpoint.
#[derive(Debug, Default)]
pub struct RetryState {
    attempts: u32,
}

impl RetryState {
    pub fn new() -> Self {
        Self { attempts: 0 }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether another attempt fits the per-endpoint budget.
    pub fn can_retry(&self, policy: &RetryPolicy) -> bool {
        self.attempts + 1 < policy.max_attempts
    }

    /// Exponential delay `base * 2^n` for the retry about to happen, capped
    /// at the policy maximum. Records the attempt.
    pub fn next_backoff(&mut self, base: Duration, policy: &RetryPolicy) -> Duration {
        let factor = 2u32.saturating_pow(self.attempts.min(16));
        self.attempts += 1;
        let delay = base.saturating_mul(factor);
        let max = policy.max_backoff();
        if !max.is_zero() && delay > max {
            max
        } else {
            delay
        }
    }

    /// Records an attempt whose delay was dictated by the server.
    pub fn record(&mut self) {
        self.attempts += 1;
    }
}

/// Best-effort wait hint for a rate-limited response. Checks the
/// `Retry-After` header, then a `"retryDelay": "<n>s"` field, then free-text
/// phrases such as "retry after 3 seconds".
pub fn retry_after_hint(headers: &HeaderMap, body: &str) -> Option<Duration> {
    if let Some(secs) = headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
    {
        return seconds(secs);
    }
    if let Some(secs) = RETRY_DELAY_FIELD
        .as_ref()
        .and_then(|re| re.captures(body))
        .and_then(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
    {
        return seconds(secs);
    }
    let caps = RETRY_PHRASE.as_ref()?.captures(body)?;
    let value = caps.get(1)?.as_str().parse::<f64>().ok()?;
    match caps.get(2).map(|unit| unit.as_str().to_ascii_lowercase()) {
        Some(unit) if unit.starts_with("ms") || unit.starts_with("milli") => {
            seconds(value / 1_000.0)
        }
        _ => seconds(value),
    }
}

/// Hints too large for a `Duration` saturate, so they land over any ceiling.
fn seconds(value: f64) -> Option<Duration> {
    if value.is_nan() || value < 0.0 {
        return None;
    }
    Some(Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX))
}

/// Sleep for `delay` unless `cancel` trips first.
pub async fn sleep_or_cancel(
    delay: Duration,
    cancel: &CancellationToken,
) -> Result<(), InferenceError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(InferenceError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
