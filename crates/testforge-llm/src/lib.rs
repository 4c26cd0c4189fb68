//! LLM backend abstraction for testforge
//!
//! Every provider implements [`LlmBackend`]; the orchestrator drives them
//! through [`BackendAdapter`], which normalizes all failures into
//! [`BackendFailure`].

mod adapter;
mod anthropic_backend;
pub(crate) mod http_client;
mod ollama_backend;
mod openrouter_backend;
mod types;

#[cfg(any(test, feature = "test-utils"))]
mod scripted;

pub use adapter::{BackendAdapter, BackendFailure, BackendRequest, FailureKind};
pub use anthropic_backend::AnthropicBackend;
pub use http_client::RetryPolicy;
pub use ollama_backend::{DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL, OllamaBackend};
pub use openrouter_backend::OpenRouterBackend;
pub use testforge_utils::error::LlmError;
pub use types::{LlmBackend, LlmFallbackInfo, LlmInvocation, LlmResult, Message, Role};

#[cfg(any(test, feature = "test-utils"))]
pub use scripted::{ScriptedBackend, ScriptedReply};

use std::sync::Arc;
use testforge_config::Config;
use testforge_utils::redaction::redact_error_message;
use tracing::warn;

/// Construct a backend for a specific provider, without fallback.
///
/// # Errors
///
/// Returns `LlmError::Unsupported` if the provider is unknown, or
/// `LlmError::Misconfiguration` if its configuration is incomplete.
fn construct_backend_for_provider(
    provider: &str,
    config: &Config,
) -> Result<Arc<dyn LlmBackend>, LlmError> {
    match provider {
        "ollama" => Ok(Arc::new(OllamaBackend::new_from_config(config)?)),
        "openrouter" => Ok(Arc::new(OpenRouterBackend::new_from_config(config)?)),
        "anthropic" => Ok(Arc::new(AnthropicBackend::new_from_config(config)?)),
        unknown => Err(LlmError::Unsupported(format!(
            "Unknown LLM provider '{unknown}'. Supported providers: ollama, openrouter, anthropic."
        ))),
    }
}

/// Create an LLM backend from configuration, returning fallback metadata when used.
///
/// If the primary provider cannot be constructed (missing API key, missing
/// model) and `[llm] fallback_provider` is set, the fallback is tried. When
/// both fail the primary error is returned.
///
/// # Errors
///
/// Returns the primary provider's construction error.
pub fn from_config_with_fallback(
    config: &Config,
) -> Result<(Arc<dyn LlmBackend>, Option<LlmFallbackInfo>), LlmError> {
    let provider = config.provider();

    let primary_error = match construct_backend_for_provider(provider, config) {
        Ok(backend) => return Ok((backend, None)),
        Err(err) => err,
    };

    let Some(fallback_provider) = config.llm.fallback_provider.as_deref() else {
        return Err(primary_error);
    };

    let reason = redact_error_message(&primary_error.to_string());
    warn!(
        primary = provider,
        fallback = fallback_provider,
        reason = %reason,
        "Primary provider failed during construction, trying fallback"
    );

    match construct_backend_for_provider(fallback_provider, config) {
        Ok(backend) => Ok((
            backend,
            Some(LlmFallbackInfo {
                primary_provider: provider.to_string(),
                fallback_provider: fallback_provider.to_string(),
                reason,
            }),
        )),
        Err(fallback_error) => {
            warn!(
                fallback = fallback_provider,
                error = %redact_error_message(&fallback_error.to_string()),
                "Fallback provider also failed"
            );
            Err(primary_error)
        }
    }
}

/// Create an LLM backend from configuration.
///
/// # Errors
///
/// See [`from_config_with_fallback`].
pub fn from_config(config: &Config) -> Result<Arc<dyn LlmBackend>, LlmError> {
    from_config_with_fallback(config).map(|(backend, _)| backend)
}

#[cfg(test)]
mod factory_tests {
    use super::*;
    use serial_test::serial;

    fn clear_keys() {
        unsafe {
            std::env::remove_var("OPENROUTER_API_KEY");
            std::env::remove_var("ANTHROPIC_API_KEY");
            std::env::remove_var("TESTFORGE_TEST_KEY");
        }
    }

    #[test]
    #[serial]
    fn test_default_provider_is_ollama() {
        let config = Config::minimal_for_testing();
        let backend = from_config(&config).unwrap();
        assert_eq!(backend.provider_name(), "ollama");
        assert_eq!(backend.default_model(), DEFAULT_OLLAMA_MODEL);
    }

    #[test]
    #[serial]
    fn test_unsupported_provider_fails_cleanly() {
        let mut config = Config::minimal_for_testing();
        config.llm.provider = Some("gpt4all".to_string());
        let err = from_config(&config).err().expect("construction should fail");
        assert!(matches!(err, LlmError::Unsupported(ref msg) if msg.contains("gpt4all")));
    }

    #[test]
    #[serial]
    fn test_openrouter_requires_api_key() {
        clear_keys();
        let mut config = Config::minimal_for_testing();
        config.llm.provider = Some("openrouter".to_string());
        config.llm.openrouter = Some(testforge_config::OpenRouterConfig {
            model: Some("qwen/qwen-2.5-coder-32b-instruct".to_string()),
            ..Default::default()
        });
        let err = from_config(&config).err().expect("construction should fail");
        assert!(matches!(err, LlmError::Misconfiguration(ref msg) if msg.contains("OPENROUTER_API_KEY")));
    }

    #[test]
    #[serial]
    fn test_openrouter_with_custom_key_env() {
        clear_keys();
        unsafe {
            std::env::set_var("TESTFORGE_TEST_KEY", "sk-test");
        }
        let mut config = Config::minimal_for_testing();
        config.llm.provider = Some("openrouter".to_string());
        config.llm.openrouter = Some(testforge_config::OpenRouterConfig {
            api_key_env: Some("TESTFORGE_TEST_KEY".to_string()),
            model: Some("qwen/qwen-2.5-coder-32b-instruct".to_string()),
            ..Default::default()
        });
        let backend = from_config(&config).unwrap();
        assert_eq!(backend.provider_name(), "openrouter");
        clear_keys();
    }

    #[test]
    #[serial]
    fn test_anthropic_requires_model() {
        clear_keys();
        unsafe {
            std::env::set_var("ANTHROPIC_API_KEY", "sk-ant-test");
        }
        let mut config = Config::minimal_for_testing();
        config.llm.provider = Some("anthropic".to_string());
        let err = from_config(&config).err().expect("construction should fail");
        assert!(matches!(err, LlmError::Misconfiguration(ref msg) if msg.contains("model")));
        clear_keys();
    }

    #[test]
    #[serial]
    fn test_fallback_on_missing_api_key() {
        clear_keys();
        let mut config = Config::minimal_for_testing();
        config.llm.provider = Some("openrouter".to_string());
        config.llm.fallback_provider = Some("ollama".to_string());

        let (backend, info) = from_config_with_fallback(&config).unwrap();
        assert_eq!(backend.provider_name(), "ollama");
        let info = info.expect("fallback info");
        assert_eq!(info.primary_provider, "openrouter");
        assert_eq!(info.fallback_provider, "ollama");
        assert!(info.reason.contains("OPENROUTER_API_KEY"));
    }

    #[test]
    #[serial]
    fn test_primary_error_returned_when_fallback_fails() {
        clear_keys();
        let mut config = Config::minimal_for_testing();
        config.llm.provider = Some("openrouter".to_string());
        config.llm.fallback_provider = Some("anthropic".to_string());

        let err = from_config_with_fallback(&config)
            .err()
            .expect("construction should fail");
        assert!(matches!(err, LlmError::Misconfiguration(ref msg) if msg.contains("OpenRouter")));
    }
}
