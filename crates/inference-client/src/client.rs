use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use http::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec;
use crate::credentials::CredentialSupplier;
use crate::errors::InferenceError;
use crate::model::{InferenceRequest, StreamChunk};
use crate::policy::RetryPolicy;
use crate::provider::{is_thinking_model, ProviderProfile, THINKING_BETA_HEADER};
use crate::retry::{retry_after_hint, sleep_or_cancel, RetryState};
use crate::sse::SseDecoder;

const ERROR_SNIPPET_CHARS: usize = 500;

/// Anything that can turn a request into a stream of chunks.
///
/// The stream is finite and not restartable. A failed call yields exactly one
/// [`StreamChunk::Error`] and ends; a cancelled call simply ends.
pub trait InferenceBackend: Send + Sync {
    fn stream(
        &self,
        request: InferenceRequest,
        cancel: CancellationToken,
    ) -> BoxStream<'static, StreamChunk>;
}

#[derive(Clone)]
pub struct InferenceClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    profile: ProviderProfile,
    policy: RetryPolicy,
    credentials: Arc<dyn CredentialSupplier>,
}

impl InferenceClient {
    pub fn new(
        profile: ProviderProfile,
        policy: RetryPolicy,
        credentials: Arc<dyn CredentialSupplier>,
    ) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .connect_timeout(policy.connect_timeout())
            .build()
            .map_err(|err| {
                InferenceError::invalid_request(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                profile,
                policy,
                credentials,
            }),
        })
    }

    pub fn profile(&self) -> &ProviderProfile {
        &self.inner.profile
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.inner.policy
    }
}

impl InferenceBackend for InferenceClient {
    fn stream(
        &self,
        request: InferenceRequest,
        cancel: CancellationToken,
    ) -> BoxStream<'static, StreamChunk> {
        let inner = Arc::clone(&self.inner);
        let stream = async_stream::stream! {
            let response = match inner.connect(&request, &cancel).await {
                Ok(response) => response,
                Err(InferenceError::Cancelled) => {
                    info!(target: "inference", model = %request.model, "request cancelled before a response arrived");
                    return;
                }
                Err(err) => {
                    error!(target: "inference", model = %request.model, error = %err, "inference call failed");
                    yield StreamChunk::Error(err);
                    return;
                }
            };

            let mut body = response.bytes_stream();
            let mut decoder = SseDecoder::new();
            loop {
                let next = tokio::select! {
                    _ = cancel.cancelled() => None,
                    next = body.next() => Some(next),
                };
                match next {
                    None => {
                        info!(target: "inference", "stream cancelled by caller");
                        return;
                    }
                    Some(Some(Ok(bytes))) => {
                        for data in decoder.push(&bytes) {
                            for chunk in codec::decode_event(&data) {
                                yield chunk;
                            }
                        }
                    }
                    Some(Some(Err(err))) => {
                        warn!(target: "inference", error = %err, "response stream interrupted");
                        yield StreamChunk::Error(InferenceError::TransientNetwork(err.to_string()));
                        return;
                    }
                    Some(None) => break,
                }
            }
            for data in decoder.finish() {
                for chunk in codec::decode_event(&data) {
                    yield chunk;
                }
            }
        };
        Box::pin(stream)
    }
}

impl ClientInner {
    fn headers(&self, model: &str) -> Result<HeaderMap, InferenceError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers.insert(USER_AGENT, header_value(&self.profile.user_agent)?);
        for (name, value) in &self.profile.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                InferenceError::invalid_request(format!("invalid header name '{name}': {err}"))
            })?;
            headers.insert(name, header_value(value)?);
        }
        if is_thinking_model(model) {
            let (name, value) = THINKING_BETA_HEADER;
            headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }
        Ok(headers)
    }

    /// Walk the endpoint list until one answers 2xx.
    async fn connect(
        &self,
        request: &InferenceRequest,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, InferenceError> {
        let endpoints = &self.profile.endpoints;
        if endpoints.is_empty() {
            return Err(InferenceError::NoEndpoints);
        }
        let credentials = self.credentials.credentials().await?;
        let payload = codec::build_payload(request, &credentials.project_id);
        let headers = self.headers(&request.model)?;
        let policy = &self.policy;
        let mut last_error = InferenceError::NoEndpoints;

        for (index, endpoint) in endpoints.iter().enumerate() {
            let url = ProviderProfile::stream_url(endpoint);
            let mut state = RetryState::new();
            loop {
                if cancel.is_cancelled() {
                    return Err(InferenceError::Cancelled);
                }
                let send = self
                    .http
                    .post(&url)
                    .headers(headers.clone())
                    .bearer_auth(&credentials.access_token)
                    .json(&payload)
                    .send();
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => return Err(InferenceError::Cancelled),
                    outcome = send => outcome,
                };

                let response = match outcome {
                    Ok(response) => response,
                    Err(err) => {
                        last_error = InferenceError::from(err);
                        if !last_error.is_retriable() {
                            return Err(last_error);
                        }
                        if !state.can_retry(policy) {
                            warn!(target: "inference", endpoint = %endpoint, error = %last_error, "network retries exhausted");
                            break;
                        }
                        let delay = state.next_backoff(policy.base_backoff(), policy);
                        warn!(
                            target: "inference",
                            endpoint = %endpoint,
                            attempt = state.attempts(),
                            delay_ms = delay.as_millis() as u64,
                            error = %last_error,
                            "request failed; backing off"
                        );
                        sleep_or_cancel(delay, cancel).await?;
                        continue;
                    }
                };

                let status = response.status();
                if status.is_success() {
                    debug!(target: "inference", endpoint = %endpoint, model = %request.model, "stream opened");
                    return Ok(response);
                }
                let response_headers = response.headers().clone();
                let body = tokio::select! {
                    _ = cancel.cancelled() => return Err(InferenceError::Cancelled),
                    body = response.text() => body.unwrap_or_default(),
                };

                match status.as_u16() {
                    429 => {
                        let wait = retry_after_hint(&response_headers, &body)
                            .unwrap_or_else(|| policy.rate_limit_default_wait());
                        last_error = InferenceError::RateLimited {
                            retry_after: Some(wait),
                            message: error_message(&body),
                        };
                        if wait > policy.rate_limit_ceiling() {
                            warn!(
                                target: "inference",
                                endpoint = %endpoint,
                                wait_ms = wait.as_millis() as u64,
                                "rate limit wait exceeds ceiling; skipping endpoint"
                            );
                            break;
                        }
                        if !state.can_retry(policy) {
                            warn!(target: "inference", endpoint = %endpoint, "rate limit retries exhausted");
                            break;
                        }
                        state.record();
                        warn!(
                            target: "inference",
                            endpoint = %endpoint,
                            attempt = state.attempts(),
                            wait_ms = wait.as_millis() as u64,
                            "rate limited; waiting before retry"
                        );
                        sleep_or_cancel(wait, cancel).await?;
                    }
                    503 => {
                        last_error = InferenceError::ServiceUnavailable(error_message(&body));
                        if !state.can_retry(policy) {
                            warn!(target: "inference", endpoint = %endpoint, "service unavailable; retries exhausted");
                            break;
                        }
                        let delay = state.next_backoff(policy.unavailable_backoff(), policy);
                        warn!(
                            target: "inference",
                            endpoint = %endpoint,
                            attempt = state.attempts(),
                            delay_ms = delay.as_millis() as u64,
                            "service unavailable; backing off"
                        );
                        sleep_or_cancel(delay, cancel).await?;
                    }
                    code => {
                        last_error = terminal_error(code, &body, &request.model);
                        warn!(target: "inference", endpoint = %endpoint, status = code, "endpoint rejected request; skipping endpoint");
                        break;
                    }
                }
            }
            if let Some(next) = endpoints.get(index + 1) {
                info!(target: "inference", from = %endpoint, to = %next, "failing over to next endpoint");
            }
        }
        Err(last_error)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, InferenceError> {
    HeaderValue::from_str(value)
        .map_err(|err| InferenceError::invalid_request(format!("invalid header value: {err}")))
}

fn terminal_error(status: u16, body: &str, model: &str) -> InferenceError {
    if status == 404 && is_thinking_model(model) {
        return InferenceError::terminal(
            status,
            format!(
                "model '{model}' is not available to this account; thinking variants need explicit access"
            ),
        );
    }
    InferenceError::terminal(status, error_message(body))
}

/// `error.message` from a JSON error body, else a trimmed prefix of the body.
fn error_message(body: &str) -> String {
    let structured = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        value
            .get("error")
            .and_then(|error| error.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    match structured {
        Some(message) => message,
        None => body.trim().chars().take(ERROR_SNIPPET_CHARS).collect(),
    }
}
