//! OpenRouter HTTP backend implementation
//!
//! OpenRouter exposes many models behind one OpenAI-compatible chat
//! completions API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::LlmError;
use crate::http_client::{HttpClient, RetryPolicy};
use crate::types::{LlmBackend, LlmInvocation, LlmResult, Message};
use testforge_config::Config;

/// Default OpenRouter API endpoint
const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default API key environment variable
const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Default X-Title header value
const DEFAULT_TITLE: &str = "testforge";

const DEFAULT_MAX_TOKENS: u32 = 4096;

/// OpenRouter accepts temperatures in this range
const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);

const PROVIDER: &str = "openrouter";

#[derive(Debug, Clone)]
pub struct OpenRouterBackend {
    client: HttpClient,
    base_url: String,
    api_key: String,
    default_model: String,
    default_max_tokens: u32,
}

impl OpenRouterBackend {
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the HTTP client cannot be constructed
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        default_model: String,
        default_max_tokens: u32,
        retry: RetryPolicy,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: HttpClient::new(retry)?,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            default_model,
            default_max_tokens,
        })
    }

    /// Create a new OpenRouter backend from configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if:
    /// - The API key environment variable is not set
    /// - `[llm.openrouter] model` is missing
    /// - The HTTP client cannot be constructed
    pub fn new_from_config(config: &Config) -> Result<Self, LlmError> {
        let section = config.llm.openrouter.as_ref();

        let api_key_env = section
            .and_then(|or| or.api_key_env.as_deref())
            .unwrap_or(DEFAULT_API_KEY_ENV);

        let api_key = std::env::var(api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                LlmError::Misconfiguration(format!(
                    "OpenRouter API key not found in environment variable '{api_key_env}'. \
                     Please set this variable or configure a different api_key_env in [llm.openrouter]."
                ))
            })?;

        let default_model = section
            .and_then(|or| or.model.clone())
            .or_else(|| config.defaults.model.clone())
            .ok_or_else(|| {
                LlmError::Misconfiguration(
                    "OpenRouter model not specified in configuration. \
                     Please set [llm.openrouter] model = \"model-name\"."
                        .to_string(),
                )
            })?;

        let max_tokens = section
            .and_then(|or| or.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS);

        Self::new(
            api_key,
            section.and_then(|or| or.base_url.clone()),
            default_model,
            max_tokens,
            RetryPolicy::from_config(config),
        )
    }

    /// Resolve model, max_tokens and temperature for this invocation
    fn resolve_params(&self, inv: &LlmInvocation) -> (String, u32, Option<f32>) {
        let model = if inv.model.is_empty() {
            self.default_model.clone()
        } else {
            inv.model.clone()
        };
        let max_tokens = inv.max_tokens().unwrap_or(self.default_max_tokens);
        let temperature = inv
            .temperature()
            .map(|t| t.clamp(TEMPERATURE_RANGE.0, TEMPERATURE_RANGE.1));
        (model, max_tokens, temperature)
    }
}

#[async_trait]
impl LlmBackend for OpenRouterBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let (model, max_tokens, temperature) = self.resolve_params(&inv);

        debug!(
            provider = PROVIDER,
            stage = %inv.stage,
            model = %model,
            max_tokens = max_tokens,
            temperature = ?temperature,
            timeout_secs = inv.timeout.as_secs(),
            "Invoking OpenRouter backend"
        );

        let request_body = OpenRouterRequest {
            model: &model,
            messages: &inv.messages,
            max_tokens,
            temperature,
            stream: false,
        };

        let request = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .header("X-Title", DEFAULT_TITLE)
            .json(&request_body);

        let response = self.client.execute(request, inv.timeout, PROVIDER).await?;

        let response_body: OpenRouterResponse = response.json().await.map_err(|e| {
            LlmError::MalformedResponse(format!("Failed to parse OpenRouter response: {e}"))
        })?;

        let choice = response_body.choices.into_iter().next().ok_or_else(|| {
            LlmError::MalformedResponse("OpenRouter response missing choices[0]".to_string())
        })?;

        let content = choice.message.content.ok_or_else(|| {
            LlmError::MalformedResponse(
                "OpenRouter response missing content in choices[0]".to_string(),
            )
        })?;

        let (tokens_input, tokens_output) = response_body
            .usage
            .map_or((None, None), |u| (Some(u.prompt_tokens), Some(u.completion_tokens)));

        let result = LlmResult::new(content, PROVIDER, response_body.model.unwrap_or(model))
            .with_tokens(tokens_input, tokens_output);

        debug!(
            provider = PROVIDER,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "OpenRouter invocation completed"
        );

        Ok(result)
    }

    fn provider_name(&self) -> &str {
        PROVIDER
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

/// OpenRouter request body (OpenAI-compatible)
#[derive(Debug, Serialize)]
struct OpenRouterRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use testforge_utils::types::StageId;

    fn backend() -> OpenRouterBackend {
        OpenRouterBackend::new(
            "test-key".to_string(),
            None,
            "qwen/qwen-2.5-coder-32b-instruct".to_string(),
            1024,
            RetryPolicy::none(),
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_params_defaults() {
        let inv = LlmInvocation::new(StageId::Analysis, "", Duration::from_secs(5), vec![]);
        let (model, max_tokens, temperature) = backend().resolve_params(&inv);
        assert_eq!(model, "qwen/qwen-2.5-coder-32b-instruct");
        assert_eq!(max_tokens, 1024);
        assert_eq!(temperature, None);
    }

    #[test]
    fn test_resolve_params_overrides_and_clamps() {
        let inv = LlmInvocation::new(StageId::TestCode, "other/model", Duration::from_secs(5), vec![])
            .with_metadata("temperature", serde_json::json!(5.0))
            .with_metadata("max_tokens", serde_json::json!(256));
        let (model, max_tokens, temperature) = backend().resolve_params(&inv);
        assert_eq!(model, "other/model");
        assert_eq!(max_tokens, 256);
        assert_eq!(temperature, Some(2.0));
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "model": "qwen/qwen-2.5-coder-32b-instruct",
            "choices": [{"message": {"role": "assistant", "content": "hello"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let parsed: OpenRouterResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hello"));
        assert_eq!(parsed.usage.unwrap().completion_tokens, 3);
    }
}
