//! Configuration management for testforge
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > env > file > defaults.

mod builder;
mod cli_args;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use cli_args::CliArgs;
pub use discovery::{CONFIG_DIR_NAME, HOME_ENV, PROVIDER_ENV};
pub use model::*;
pub use testforge_utils::types::ConfigSource;
pub use validation::MAX_RETRIES_LIMIT;

use std::time::Duration;
use testforge_utils::types::StageId;

/// Default initial backoff between retries
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1000;

impl Config {
    /// Selected provider name. Discovery and the builder always set one.
    #[must_use]
    pub fn provider(&self) -> &str {
        self.llm.provider.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }

    /// Get the model to use for a specific stage.
    ///
    /// Precedence (highest to lowest):
    /// 1. Stage-specific override (`[stages.<stage>].model`)
    /// 2. Global default (`[defaults].model`)
    ///
    /// `None` means the backend picks its own default model.
    #[must_use]
    pub fn model_for_stage(&self, stage: StageId) -> Option<String> {
        self.stages
            .get(stage)
            .and_then(|s| s.model.clone())
            .or_else(|| self.defaults.model.clone())
    }

    /// Temperature override for a stage, if one is configured.
    #[must_use]
    pub fn stage_temperature(&self, stage: StageId) -> Option<f32> {
        self.stages.get(stage).and_then(|s| s.temperature)
    }

    #[must_use]
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(
            self.defaults
                .stage_timeout
                .unwrap_or(DEFAULT_STAGE_TIMEOUT_SECS),
        )
    }

    #[must_use]
    pub fn language(&self) -> &str {
        self.defaults.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.defaults.verbose.unwrap_or(false)
    }

    /// Retries after the first attempt. Zero disables retrying.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.llm
            .retry
            .as_ref()
            .and_then(|r| r.max_retries)
            .unwrap_or(0)
    }

    #[must_use]
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(
            self.llm
                .retry
                .as_ref()
                .and_then(|r| r.initial_backoff_ms)
                .unwrap_or(DEFAULT_INITIAL_BACKOFF_MS),
        )
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Config {
    /// Create a minimal Config for testing purposes
    ///
    /// Built-in defaults only, no discovery, provider `ollama`.
    pub fn minimal_for_testing() -> Self {
        Config {
            defaults: Defaults::default(),
            llm: LlmConfig {
                provider: Some(DEFAULT_PROVIDER.to_string()),
                ..LlmConfig::default()
            },
            stages: StagesConfig::default(),
            source_attribution: std::collections::HashMap::new(),
        }
    }
}
