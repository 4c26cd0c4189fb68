//! Configuration model, discovery, and validation for testforge.

pub mod config;

pub use config::{
    AnthropicConfig, CliArgs, Config, ConfigBuilder, ConfigSource, Defaults, LlmConfig,
    OllamaConfig, OpenRouterConfig, RetryConfig, StageConfig, StagesConfig,
};
