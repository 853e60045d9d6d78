use std::time::Duration;

use thiserror::Error;

/// Failure taxonomy of one streaming call.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum InferenceError {
    #[error("network error: {0}")]
    TransientNetwork(String),
    #[error("rate limited (retry after {retry_after:?}): {message}")]
    RateLimited {
        retry_after: Option<Duration>,
        message: String,
    },
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("api error {status}: {message}")]
    TerminalApi { status: u16, message: String },
    #[error("no inference endpoints configured")]
    NoEndpoints,
    #[error("request cancelled")]
    Cancelled,
    #[error("credentials unavailable: {0}")]
    Credentials(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl InferenceError {
    pub fn terminal(status: u16, message: impl Into<String>) -> Self {
        Self::TerminalApi {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Whether the failure could go away by retrying later.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            InferenceError::TransientNetwork(_)
                | InferenceError::RateLimited { .. }
                | InferenceError::ServiceUnavailable(_)
        )
    }
}

impl From<reqwest::Error> for InferenceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            InferenceError::InvalidRequest(err.to_string())
        } else {
            InferenceError::TransientNetwork(err.to_string())
        }
    }
}
