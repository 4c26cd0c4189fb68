//! Anthropic HTTP backend implementation (Messages API)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::LlmError;
use crate::http_client::{HttpClient, RetryPolicy};
use crate::types::{LlmBackend, LlmInvocation, LlmResult, Message, Role};
use testforge_config::Config;

/// Default Anthropic API endpoint
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_MAX_TOKENS: u32 = 4096;

/// The Messages API rejects temperatures outside [0, 1]
const TEMPERATURE_RANGE: (f32, f32) = (0.0, 1.0);

const PROVIDER: &str = "anthropic";

#[derive(Debug, Clone)]
pub struct AnthropicBackend {
    client: HttpClient,
    base_url: String,
    api_key: String,
    default_model: String,
    default_max_tokens: u32,
}

impl AnthropicBackend {
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

    /// Create a new Anthropic backend from configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if:
    /// - The API key environment variable is not set
    /// - `[llm.anthropic] model` is missing
    /// - The HTTP client cannot be constructed
    pub fn new_from_config(config: &Config) -> Result<Self, LlmError> {
        let section = config.llm.anthropic.as_ref();

        let api_key_env = section
            .and_then(|a| a.api_key_env.as_deref())
            .unwrap_or(DEFAULT_API_KEY_ENV);

        let api_key = std::env::var(api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                LlmError::Misconfiguration(format!(
                    "Anthropic API key not found in environment variable '{api_key_env}'. \
                     Please set this variable or configure a different api_key_env in [llm.anthropic]."
                ))
            })?;

        let default_model = section
            .and_then(|a| a.model.clone())
            .or_else(|| config.defaults.model.clone())
            .ok_or_else(|| {
                LlmError::Misconfiguration(
                    "Anthropic model not specified in configuration. \
                     Please set [llm.anthropic] model = \"model-name\"."
                        .to_string(),
                )
            })?;

        let max_tokens = section
            .and_then(|a| a.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS);

        Self::new(
            api_key,
            section.and_then(|a| a.base_url.clone()),
            default_model,
            max_tokens,
            RetryPolicy::from_config(config),
        )
    }

    /// Split system messages out of the conversation.
    ///
    /// The Messages API takes the system prompt as a top-level field; multiple
    /// system messages are joined with a blank line.
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage<'_>>) {
        let mut system_prompt: Option<String> = None;
        let mut conversation = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => match system_prompt.as_mut() {
                    Some(existing) => {
                        existing.push_str("\n\n");
                        existing.push_str(&msg.content);
                    }
                    None => system_prompt = Some(msg.content.clone()),
                },
                Role::User | Role::Assistant => conversation.push(AnthropicMessage {
                    role: msg.role.as_str(),
                    content: &msg.content,
                }),
            }
        }

        (system_prompt, conversation)
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let model = if inv.model.is_empty() {
            self.default_model.clone()
        } else {
            inv.model.clone()
        };
        let max_tokens = inv.max_tokens().unwrap_or(self.default_max_tokens);
        let temperature = inv
            .temperature()
            .map(|t| t.clamp(TEMPERATURE_RANGE.0, TEMPERATURE_RANGE.1));

        debug!(
            provider = PROVIDER,
            stage = %inv.stage,
            model = %model,
            max_tokens = max_tokens,
            temperature = ?temperature,
            timeout_secs = inv.timeout.as_secs(),
            "Invoking Anthropic backend"
        );

        let (system, messages) = Self::convert_messages(&inv.messages);
        let request_body = AnthropicRequest {
            model: &model,
            messages,
            max_tokens,
            temperature,
            system,
        };

        let request = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request_body);

        let response = self.client.execute(request, inv.timeout, PROVIDER).await?;

        let response_body: AnthropicResponse = response.json().await.map_err(|e| {
            LlmError::MalformedResponse(format!("Failed to parse Anthropic response: {e}"))
        })?;

        let content: String = response_body
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if response_body.content.is_empty() {
            return Err(LlmError::MalformedResponse(
                "Anthropic response missing content blocks".to_string(),
            ));
        }

        let (tokens_input, tokens_output) = response_body
            .usage
            .map_or((None, None), |u| (Some(u.input_tokens), Some(u.output_tokens)));

        let result = LlmResult::new(content, PROVIDER, response_body.model.unwrap_or(model))
            .with_tokens(tokens_input, tokens_output);

        debug!(
            provider = PROVIDER,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "Anthropic invocation completed"
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
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: Option<String>,
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_messages_separates_system() {
        let messages = vec![
            Message::system("persona"),
            Message::system("rules"),
            Message::user("question"),
        ];
        let (system, conversation) = AnthropicBackend::convert_messages(&messages);
        assert_eq!(system.as_deref(), Some("persona\n\nrules"));
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation[0].role, "user");
        assert_eq!(conversation[0].content, "question");
    }

    #[test]
    fn test_response_parsing_concatenates_text_blocks() {
        let json = r#"{
            "id": "msg_1",
            "type": "message",
            "model": "claude-3-5-haiku-latest",
            "content": [
                {"type": "text", "text": "func TestAdd"},
                {"type": "text", "text": "(t *testing.T) {}"}
            ],
            "usage": {"input_tokens": 40, "output_tokens": 9}
        }"#;
        let parsed: AnthropicResponse = serde_json::from_str(json).unwrap();
        let text: String = parsed
            .content
            .iter()
            .filter_map(|b| b.text.as_deref())
            .collect();
        assert_eq!(text, "func TestAdd(t *testing.T) {}");
    }

    #[test]
    fn test_request_omits_missing_temperature() {
        let request = AnthropicRequest {
            model: "claude-3-5-haiku-latest",
            messages: vec![],
            max_tokens: 10,
            temperature: None,
            system: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("temperature").is_none());
        assert!(value.get("system").is_none());
    }
}
