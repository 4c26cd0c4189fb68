//! Ollama HTTP backend
//!
//! Talks to a local (or remote) Ollama server through `POST /api/chat` with
//! streaming disabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::LlmError;
use crate::http_client::{HttpClient, RetryPolicy};
use crate::types::{LlmBackend, LlmInvocation, LlmResult, Message};
use testforge_config::Config;

/// Default Ollama server
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default model when neither the invocation nor the config names one
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5-coder:7b";

/// Environment variable the Ollama tooling uses for the server address
const OLLAMA_HOST_ENV: &str = "OLLAMA_HOST";

/// Ollama accepts temperatures in this range
const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);

const PROVIDER: &str = "ollama";

#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: HttpClient,
    chat_url: String,
    default_model: String,
}

impl OllamaBackend {
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the HTTP client cannot be constructed
    pub fn new(
        base_url: impl AsRef<str>,
        default_model: impl Into<String>,
        retry: RetryPolicy,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: HttpClient::new(retry)?,
            chat_url: format!("{}/api/chat", base_url.as_ref().trim_end_matches('/')),
            default_model: default_model.into(),
        })
    }

    /// Build from configuration.
    ///
    /// Base URL: `[llm.ollama] base_url` > `OLLAMA_HOST` > `http://localhost:11434`.
    /// Default model: `[llm.ollama] model` > `qwen2.5-coder:7b`.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the HTTP client cannot be constructed
    pub fn new_from_config(config: &Config) -> Result<Self, LlmError> {
        let section = config.llm.ollama.as_ref();

        let base_url = section
            .and_then(|o| o.base_url.clone())
            .or_else(|| {
                std::env::var(OLLAMA_HOST_ENV)
                    .ok()
                    .filter(|h| !h.trim().is_empty())
                    .map(|h| normalize_host(&h))
            })
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        let default_model = section
            .and_then(|o| o.model.clone())
            .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string());

        Self::new(base_url, default_model, RetryPolicy::from_config(config))
    }

    /// Endpoint this backend posts to.
    #[must_use]
    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    fn resolve_model(&self, inv: &LlmInvocation) -> String {
        if inv.model.is_empty() {
            self.default_model.clone()
        } else {
            inv.model.clone()
        }
    }
}

/// `OLLAMA_HOST` may be a bare `host:port`.
fn normalize_host(host: &str) -> String {
    let host = host.trim();
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let model = self.resolve_model(&inv);
        let temperature = inv
            .temperature()
            .map(|t| t.clamp(TEMPERATURE_RANGE.0, TEMPERATURE_RANGE.1));

        debug!(
            provider = PROVIDER,
            stage = %inv.stage,
            model = %model,
            temperature = ?temperature,
            timeout_secs = inv.timeout.as_secs(),
            "Invoking Ollama backend"
        );

        let body = ChatRequest {
            model: &model,
            messages: &inv.messages,
            stream: false,
            options: ChatOptions {
                temperature,
                num_predict: inv.max_tokens(),
            },
        };

        let request = self.client.post(&self.chat_url).json(&body);
        let response = self.client.execute(request, inv.timeout, PROVIDER).await?;

        let text = response.text().await.map_err(|e| {
            LlmError::MalformedResponse(format!("Failed to read Ollama response body: {e}"))
        })?;
        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            LlmError::MalformedResponse(format!("Failed to parse Ollama response: {e}"))
        })?;

        if let Some(error) = parsed.error {
            return Err(LlmError::Rejected {
                status: 200,
                message: format!("ollama returned an error: {error}"),
            });
        }

        let message = parsed.message.ok_or_else(|| {
            LlmError::MalformedResponse("Ollama response missing message".to_string())
        })?;

        let result = LlmResult::new(
            message.content,
            PROVIDER,
            parsed.model.unwrap_or(model),
        )
        .with_tokens(parsed.prompt_eval_count, parsed.eval_count);

        debug!(
            provider = PROVIDER,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "Ollama invocation completed"
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

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: Option<String>,
    message: Option<ChatMessage>,
    error: Option<String>,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_url_strips_trailing_slash() {
        let backend =
            OllamaBackend::new("http://localhost:11434/", "m", RetryPolicy::none()).unwrap();
        assert_eq!(backend.chat_url(), "http://localhost:11434/api/chat");
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("0.0.0.0:11434"), "http://0.0.0.0:11434");
        assert_eq!(
            normalize_host("https://ollama.internal"),
            "https://ollama.internal"
        );
    }

    #[test]
    fn test_new_from_config_defaults() {
        let config = Config::minimal_for_testing();
        let backend = OllamaBackend::new_from_config(&config).unwrap();
        assert_eq!(backend.default_model(), DEFAULT_OLLAMA_MODEL);
        assert_eq!(backend.provider_name(), "ollama");
    }

    #[test]
    fn test_new_from_config_uses_section() {
        let mut config = Config::minimal_for_testing();
        config.llm.ollama = Some(testforge_config::OllamaConfig {
            base_url: Some("http://gpu-box:11434".to_string()),
            model: Some("codellama:13b".to_string()),
        });
        let backend = OllamaBackend::new_from_config(&config).unwrap();
        assert_eq!(backend.chat_url(), "http://gpu-box:11434/api/chat");
        assert_eq!(backend.default_model(), "codellama:13b");
    }

    #[test]
    fn test_request_shape() {
        let messages = vec![Message::system("sys"), Message::user("usr")];
        let body = ChatRequest {
            model: "qwen2.5-coder:7b",
            messages: &messages,
            stream: false,
            options: ChatOptions {
                temperature: Some(0.3),
                num_predict: None,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "qwen2.5-coder:7b");
        assert_eq!(value["stream"], false);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "usr");
        assert!(value["options"].get("num_predict").is_none());
        let temp = value["options"]["temperature"].as_f64().unwrap();
        assert!((temp - 0.3).abs() < 1e-6);
    }
}
