use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use testforge_utils::types::{ConfigSource, StageId};

/// Default stage timeout in seconds (10 minutes)
pub const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 600;

/// Default LLM provider
pub const DEFAULT_PROVIDER: &str = "ollama";

/// Default target language for generated tests
pub const DEFAULT_LANGUAGE: &str = "go";

/// Providers accepted in `[llm] provider` and `[llm] fallback_provider`
pub const SUPPORTED_PROVIDERS: [&str; 3] = ["ollama", "openrouter", "anthropic"];

/// Configuration for testforge.
///
/// `Config` provides hierarchical configuration with discovery and precedence:
/// CLI arguments > `TESTFORGE_*` environment > config file > built-in defaults.
///
/// # Discovery
///
/// Use [`Config::discover()`] for CLI-like behavior that:
/// - Uses `TESTFORGE_HOME/config.toml` when the variable is set
/// - Otherwise searches for `.testforge/config.toml` upward from the current directory
/// - Applies built-in defaults for unspecified values
///
/// # Example
///
/// ```rust,no_run
/// use testforge_config::{CliArgs, Config};
///
/// let config = Config::discover(&CliArgs::default())?;
/// println!("Provider: {}", config.provider());
/// # Ok::<(), anyhow::Error>(())
/// ```
///
/// # Configuration File Format
///
/// ```toml
/// [defaults]
/// model = "qwen2.5-coder:7b"
/// stage_timeout = 600
/// language = "go"
///
/// [llm]
/// provider = "ollama"
///
/// [llm.ollama]
/// base_url = "http://localhost:11434"
///
/// [stages.test_code]
/// temperature = 0.2
/// model = "qwen2.5-coder:14b"
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Default values for various settings.
    pub defaults: Defaults,
    /// LLM provider configuration.
    pub llm: LlmConfig,
    /// Per-stage overrides.
    pub stages: StagesConfig,
    /// Source attribution for each setting (for `testforge config`).
    pub source_attribution: HashMap<String, ConfigSource>,
}

/// Default configuration values
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    /// Model used by every stage without its own override.
    pub model: Option<String>,
    /// Per-stage backend timeout in seconds.
    pub stage_timeout: Option<u64>,
    /// Target language for the generated test code.
    pub language: Option<String>,
    pub verbose: Option<bool>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            model: None,
            stage_timeout: Some(DEFAULT_STAGE_TIMEOUT_SECS),
            language: Some(DEFAULT_LANGUAGE.to_string()),
            verbose: Some(false),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LlmConfig {
    pub provider: Option<String>,
    /// Provider tried when the primary one cannot be constructed.
    pub fallback_provider: Option<String>,
    pub ollama: Option<OllamaConfig>,
    pub openrouter: Option<OpenRouterConfig>,
    pub anthropic: Option<AnthropicConfig>,
    pub retry: Option<RetryConfig>,
}

/// Local Ollama server configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OllamaConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
}

/// OpenRouter HTTP provider configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OpenRouterConfig {
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

/// Anthropic HTTP provider configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AnthropicConfig {
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

/// Bounded retry for transient backend failures.
///
/// Off unless `max_retries` is set above zero.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RetryConfig {
    pub max_retries: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
}

/// Per-stage configuration overrides
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StageConfig {
    /// Model to use for this stage (overrides defaults.model)
    pub model: Option<String>,
    /// Sampling temperature for this stage, in [0, 1]
    pub temperature: Option<f32>,
}

/// `[stages.*]` section
///
/// ```toml
/// [stages.analysis]
/// temperature = 0.3
///
/// [stages.test_code]
/// model = "qwen2.5-coder:14b"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StagesConfig {
    pub analysis: Option<StageConfig>,
    pub test_cases: Option<StageConfig>,
    pub test_code: Option<StageConfig>,
}

impl StagesConfig {
    /// Override block for a stage, if configured.
    #[must_use]
    pub fn get(&self, stage: StageId) -> Option<&StageConfig> {
        match stage {
            StageId::Analysis => self.analysis.as_ref(),
            StageId::TestCases => self.test_cases.as_ref(),
            StageId::TestCode => self.test_code.as_ref(),
        }
    }

    /// Mutable override block for a stage, created on demand.
    pub fn get_or_insert(&mut self, stage: StageId) -> &mut StageConfig {
        let slot = match stage {
            StageId::Analysis => &mut self.analysis,
            StageId::TestCases => &mut self.test_cases,
            StageId::TestCode => &mut self.test_code,
        };
        slot.get_or_insert_with(StageConfig::default)
    }
}
