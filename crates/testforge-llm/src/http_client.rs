//! Shared HTTP client infrastructure for HTTP-based LLM providers
//!
//! One `reqwest::Client` per backend, with per-request timeouts, optional
//! bounded retry and a single place where HTTP statuses become `LlmError`s.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::LlmError;
use testforge_utils::redaction::redact_error_message;

/// Default connect timeout (30 seconds)
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest provider error detail kept in an error message
const MAX_ERROR_DETAIL_CHARS: usize = 500;

/// Bounded exponential backoff for 5xx and network failures.
///
/// `max_retries == 0` means a single round trip per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// No retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::from_secs(1),
        }
    }

    #[must_use]
    pub fn from_config(config: &testforge_config::Config) -> Self {
        Self {
            max_retries: config.max_retries(),
            initial_backoff: config.initial_backoff(),
        }
    }

    /// Delay before retry number `attempt` (1-based): initial, 2x, 4x, ...
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// HTTP client shared by the HTTP backends.
#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    client: Client,
    retry: RetryPolicy,
}

impl HttpClient {
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the client cannot be constructed
    pub fn new(retry: RetryPolicy) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| LlmError::Misconfiguration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, retry })
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// Execute an HTTP request with timeout and retry policy
    ///
    /// - Per-attempt timeout: `request_timeout`
    /// - 5xx and network failures are retried according to the [`RetryPolicy`]
    /// - 4xx responses and timeouts are never retried
    ///
    /// # Errors
    ///
    /// - `LlmError::ProviderAuth` for 401/403
    /// - `LlmError::ProviderQuota` for 429
    /// - `LlmError::Rejected` for other 4xx
    /// - `LlmError::ProviderOutage` for 5xx (after retries)
    /// - `LlmError::Timeout` for timeouts
    /// - `LlmError::Transport` for network errors (after retries)
    pub async fn execute(
        &self,
        request_builder: RequestBuilder,
        request_timeout: Duration,
        provider_name: &str,
    ) -> Result<Response, LlmError> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let request = request_builder
                .try_clone()
                .ok_or_else(|| LlmError::Transport("Failed to clone request for retry".to_string()))?
                .timeout(request_timeout)
                .build()
                .map_err(|e| {
                    LlmError::Transport(redact_error_message(&format!(
                        "Failed to build request: {e}"
                    )))
                })?;

            debug!(
                provider = provider_name,
                attempt = attempt,
                timeout_secs = request_timeout.as_secs(),
                "Executing HTTP request"
            );

            let error = match self.client.execute(request).await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    map_status_error(status, &body, provider_name)
                }
                Err(e) if e.is_timeout() => {
                    return Err(LlmError::Timeout {
                        duration: request_timeout,
                    });
                }
                Err(e) => LlmError::Transport(format!(
                    "{provider_name} request failed: {}",
                    redact_error_message(&error_chain(&e))
                )),
            };

            if error.is_transient() && attempt <= self.retry.max_retries {
                let backoff = self.retry.backoff_for(attempt);
                warn!(
                    provider = provider_name,
                    attempt = attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %error,
                    "Transient failure, will retry"
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            return Err(error);
        }
    }
}

/// Render an error together with its sources; reqwest hides the interesting
/// part (connection refused, DNS failure) in the source chain.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// Pull a human-readable message out of a provider error body.
///
/// Understands `{"error": "..."}` (Ollama), `{"error": {"message": "..."}}`
/// (OpenAI-compatible, Anthropic) and `{"message": "..."}`. Falls back to the
/// raw body text.
pub(crate) fn extract_error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let detail = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => value
            .get("error")
            .and_then(|e| {
                e.as_str()
                    .map(str::to_string)
                    .or_else(|| e.get("message").and_then(|m| m.as_str()).map(str::to_string))
            })
            .or_else(|| value.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_else(|| trimmed.to_string()),
        Err(_) => trimmed.to_string(),
    };

    let truncated: String = detail.chars().take(MAX_ERROR_DETAIL_CHARS).collect();
    Some(redact_error_message(&truncated))
}

/// Map a non-success HTTP status to an `LlmError` variant
///
/// - 401/403 → `LlmError::ProviderAuth`
/// - 429 → `LlmError::ProviderQuota`
/// - 5xx → `LlmError::ProviderOutage`
/// - Other 4xx → `LlmError::Rejected`
pub(crate) fn map_status_error(status: StatusCode, body: &str, provider_name: &str) -> LlmError {
    let code = status.as_u16();
    let detail = extract_error_detail(body);
    let describe = |what: &str| match &detail {
        Some(d) => format!("{provider_name} {what}: {d}"),
        None => format!("{provider_name} {what}"),
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::ProviderAuth {
            status: code,
            message: describe("authentication failed"),
        },
        StatusCode::TOO_MANY_REQUESTS => LlmError::ProviderQuota {
            status: code,
            message: describe("rate limit exceeded"),
        },
        s if s.is_server_error() => LlmError::ProviderOutage {
            status: code,
            message: describe("returned server error"),
        },
        _ => LlmError::Rejected {
            status: code,
            message: describe("rejected the request"),
        },
    }
}
