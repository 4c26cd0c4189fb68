use std::collections::HashMap;
use std::time::Duration;

use testforge_utils::error::ConfigError;
use testforge_utils::types::StageId;

use super::{
    Config, ConfigSource, DEFAULT_PROVIDER, Defaults, LlmConfig, OllamaConfig, RetryConfig,
    StagesConfig,
};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this when embedding testforge and the result must not depend on
    /// environment variables or config files.
    ///
    /// # Example
    ///
    /// ```rust
    /// use testforge_config::Config;
    /// use std::time::Duration;
    ///
    /// let config = Config::builder()
    ///     .llm_provider("ollama")
    ///     .model("qwen2.5-coder:7b")
    ///     .stage_timeout(Duration::from_secs(120))
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.provider(), "ollama");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Fluent builder for [`Config`].
///
/// All values set via the builder are attributed to `ConfigSource::Programmatic`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    model: Option<String>,
    stage_timeout: Option<Duration>,
    language: Option<String>,
    verbose: Option<bool>,
    llm_provider: Option<String>,
    fallback_provider: Option<String>,
    ollama_base_url: Option<String>,
    max_retries: Option<u32>,
    initial_backoff_ms: Option<u64>,
    stage_models: Vec<(StageId, String)>,
    stage_temperatures: Vec<(StageId, f32)>,
}

impl ConfigBuilder {
    /// Create a new `ConfigBuilder` with no values set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Model used by every stage without an override.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Per-stage backend timeout. Must be between 5 seconds and 2 hours.
    #[must_use]
    pub fn stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    /// Target language for generated tests (e.g. `"go"`, `"rust"`).
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    #[must_use]
    pub fn llm_provider(mut self, provider: impl Into<String>) -> Self {
        self.llm_provider = Some(provider.into());
        self
    }

    #[must_use]
    pub fn fallback_provider(mut self, provider: impl Into<String>) -> Self {
        self.fallback_provider = Some(provider.into());
        self
    }

    #[must_use]
    pub fn ollama_base_url(mut self, url: impl Into<String>) -> Self {
        self.ollama_base_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    #[must_use]
    pub fn initial_backoff_ms(mut self, millis: u64) -> Self {
        self.initial_backoff_ms = Some(millis);
        self
    }

    /// Model override for a single stage.
    #[must_use]
    pub fn stage_model(mut self, stage: StageId, model: impl Into<String>) -> Self {
        self.stage_models.push((stage, model.into()));
        self
    }

    /// Temperature override for a single stage, in [0, 1].
    #[must_use]
    pub fn stage_temperature(mut self, stage: StageId, temperature: f32) -> Self {
        self.stage_temperatures.push((stage, temperature));
        self
    }

    /// Build the configuration, validating every value.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut source_attribution = HashMap::new();
        let mut defaults = Defaults::default();
        let mut llm = LlmConfig::default();
        let mut stages = StagesConfig::default();

        for key in ["stage_timeout", "language", "verbose", "llm_provider"] {
            source_attribution.insert(key.to_string(), ConfigSource::Default);
        }

        if let Some(model) = self.model {
            defaults.model = Some(model);
            source_attribution.insert("model".to_string(), ConfigSource::Programmatic);
        }
        if let Some(timeout) = self.stage_timeout {
            defaults.stage_timeout = Some(timeout.as_secs());
            source_attribution.insert("stage_timeout".to_string(), ConfigSource::Programmatic);
        }
        if let Some(language) = self.language {
            defaults.language = Some(language);
            source_attribution.insert("language".to_string(), ConfigSource::Programmatic);
        }
        if let Some(verbose) = self.verbose {
            defaults.verbose = Some(verbose);
            source_attribution.insert("verbose".to_string(), ConfigSource::Programmatic);
        }

        match self.llm_provider {
            Some(provider) => {
                llm.provider = Some(provider);
                source_attribution.insert("llm_provider".to_string(), ConfigSource::Programmatic);
            }
            None => llm.provider = Some(DEFAULT_PROVIDER.to_string()),
        }
        if let Some(fallback) = self.fallback_provider {
            llm.fallback_provider = Some(fallback);
            source_attribution.insert(
                "llm_fallback_provider".to_string(),
                ConfigSource::Programmatic,
            );
        }
        if let Some(base_url) = self.ollama_base_url {
            llm.ollama = Some(OllamaConfig {
                base_url: Some(base_url),
                model: None,
            });
            source_attribution.insert("llm_ollama".to_string(), ConfigSource::Programmatic);
        }
        if self.max_retries.is_some() || self.initial_backoff_ms.is_some() {
            llm.retry = Some(RetryConfig {
                max_retries: self.max_retries,
                initial_backoff_ms: self.initial_backoff_ms,
            });
            source_attribution.insert("llm_retry".to_string(), ConfigSource::Programmatic);
        }

        for (stage, model) in self.stage_models {
            stages.get_or_insert(stage).model = Some(model);
            source_attribution.insert(format!("stages.{stage}"), ConfigSource::Programmatic);
        }
        for (stage, temperature) in self.stage_temperatures {
            stages.get_or_insert(stage).temperature = Some(temperature);
            source_attribution.insert(format!("stages.{stage}"), ConfigSource::Programmatic);
        }

        let config = Config {
            defaults,
            llm,
            stages,
            source_attribution,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config.provider(), "ollama");
        assert_eq!(config.stage_timeout(), Duration::from_secs(600));
        assert_eq!(config.language(), "go");
        assert_eq!(config.max_retries(), 0);
        assert_eq!(
            config.source_attribution.get("llm_provider"),
            Some(&ConfigSource::Default)
        );
    }

    #[test]
    fn test_builder_values_are_programmatic() {
        let config = Config::builder()
            .llm_provider("openrouter")
            .model("qwen/qwen-2.5-coder-32b-instruct")
            .stage_temperature(StageId::TestCode, 0.1)
            .build()
            .unwrap();

        assert_eq!(config.provider(), "openrouter");
        assert_eq!(config.stage_temperature(StageId::TestCode), Some(0.1));
        assert_eq!(
            config.source_attribution.get("model"),
            Some(&ConfigSource::Programmatic)
        );
        assert_eq!(
            config.source_attribution.get("stages.test_code"),
            Some(&ConfigSource::Programmatic)
        );
    }

    #[test]
    fn test_builder_stage_model_override() {
        let config = Config::builder()
            .model("qwen2.5-coder:7b")
            .stage_model(StageId::TestCode, "qwen2.5-coder:14b")
            .build()
            .unwrap();

        assert_eq!(
            config.model_for_stage(StageId::Analysis).as_deref(),
            Some("qwen2.5-coder:7b")
        );
        assert_eq!(
            config.model_for_stage(StageId::TestCode).as_deref(),
            Some("qwen2.5-coder:14b")
        );
    }

    #[test]
    fn test_builder_rejects_invalid_values() {
        let err = Config::builder()
            .stage_timeout(Duration::from_secs(1))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "stage_timeout"));

        let err = Config::builder()
            .stage_temperature(StageId::Analysis, 1.5)
            .build()
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "stages.analysis.temperature")
        );

        let err = Config::builder().llm_provider("gpt4all").build().unwrap_err();
        assert!(err.to_string().contains("gpt4all"));

        let err = Config::builder().max_retries(9).build().unwrap_err();
        assert!(err.to_string().contains("max_retries"));
    }
}
