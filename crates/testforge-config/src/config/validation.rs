use testforge_utils::error::ConfigError;
use testforge_utils::types::StageId;

use super::{Config, SUPPORTED_PROVIDERS};

/// Upper bound for `[llm.retry] max_retries`
pub const MAX_RETRIES_LIMIT: u32 = 5;

fn invalid(key: impl Into<String>, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.into(),
        value: value.into(),
    }
}

fn check_provider(key: &str, provider: &str) -> Result<(), ConfigError> {
    if SUPPORTED_PROVIDERS.contains(&provider) {
        Ok(())
    } else {
        Err(invalid(
            key,
            format!(
                "'{provider}' is not valid. Must be one of: {}",
                SUPPORTED_PROVIDERS.join(", ")
            ),
        ))
    }
}

impl Config {
    /// Validate configuration values
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if let Some(stage_timeout) = self.defaults.stage_timeout {
            if stage_timeout < 5 {
                return Err(invalid("stage_timeout", "must be at least 5 seconds"));
            }
            if stage_timeout > 7200 {
                return Err(invalid(
                    "stage_timeout",
                    "exceeds maximum limit of 7200 seconds (2 hours)",
                ));
            }
        }

        if let Some(language) = &self.defaults.language
            && language.trim().is_empty()
        {
            return Err(invalid("language", "must not be empty"));
        }

        if let Some(model) = &self.defaults.model
            && model.trim().is_empty()
        {
            return Err(invalid("model", "must not be empty"));
        }

        match self.llm.provider.as_deref() {
            Some(provider) => check_provider("llm_provider", provider)?,
            None => return Err(ConfigError::MissingRequired("llm_provider".to_string())),
        }

        if let Some(fallback) = self.llm.fallback_provider.as_deref() {
            check_provider("llm_fallback_provider", fallback)?;
        }

        if let Some(ollama) = &self.llm.ollama
            && let Some(base_url) = &ollama.base_url
            && !(base_url.starts_with("http://") || base_url.starts_with("https://"))
        {
            return Err(invalid(
                "llm.ollama.base_url",
                format!("'{base_url}' must start with http:// or https://"),
            ));
        }

        if let Some(retry) = &self.llm.retry {
            if let Some(max_retries) = retry.max_retries
                && max_retries > MAX_RETRIES_LIMIT
            {
                return Err(invalid(
                    "llm.retry.max_retries",
                    format!("exceeds maximum limit of {MAX_RETRIES_LIMIT}"),
                ));
            }
            if let Some(backoff) = retry.initial_backoff_ms
                && !(1..=60_000).contains(&backoff)
            {
                return Err(invalid(
                    "llm.retry.initial_backoff_ms",
                    "must be between 1 and 60000 milliseconds",
                ));
            }
        }

        for stage in StageId::ALL {
            let Some(stage_config) = self.stages.get(stage) else {
                continue;
            };
            if let Some(temperature) = stage_config.temperature
                && !(0.0..=1.0).contains(&temperature)
            {
                return Err(invalid(
                    format!("stages.{stage}.temperature"),
                    format!("{temperature} is outside the range [0, 1]"),
                ));
            }
            if let Some(model) = &stage_config.model
                && model.trim().is_empty()
            {
                return Err(invalid(format!("stages.{stage}.model"), "must not be empty"));
            }
        }

        Ok(())
    }
}
