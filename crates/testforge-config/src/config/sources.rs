use std::collections::BTreeMap;

use testforge_utils::types::{ConfigSource, StageId};

use super::Config;

impl Config {
    fn source_label(&self, key: &str) -> String {
        self.source_attribution
            .get(key)
            .copied()
            .unwrap_or(ConfigSource::Default)
            .as_str()
            .to_string()
    }

    /// Get effective configuration as key-value pairs with source attribution.
    ///
    /// Keys are sorted so the listing is stable across runs.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut config = BTreeMap::new();

        let mut add = |key: &str, attribution_key: &str, value: Option<String>| {
            if let Some(val) = value {
                config.insert(key.to_string(), (val, self.source_label(attribution_key)));
            }
        };

        add("model", "model", self.defaults.model.clone());
        add(
            "stage_timeout",
            "stage_timeout",
            self.defaults.stage_timeout.map(|t| t.to_string()),
        );
        add("language", "language", self.defaults.language.clone());
        add(
            "verbose",
            "verbose",
            self.defaults.verbose.map(|v| v.to_string()),
        );
        add("llm_provider", "llm_provider", self.llm.provider.clone());
        add(
            "llm_fallback_provider",
            "llm_fallback_provider",
            self.llm.fallback_provider.clone(),
        );

        if let Some(ollama) = &self.llm.ollama {
            add("llm.ollama.base_url", "llm_ollama", ollama.base_url.clone());
            add("llm.ollama.model", "llm_ollama", ollama.model.clone());
        }
        if let Some(openrouter) = &self.llm.openrouter {
            add(
                "llm.openrouter.api_key_env",
                "llm_openrouter",
                openrouter.api_key_env.clone(),
            );
            add(
                "llm.openrouter.base_url",
                "llm_openrouter",
                openrouter.base_url.clone(),
            );
            add("llm.openrouter.model", "llm_openrouter", openrouter.model.clone());
        }
        if let Some(anthropic) = &self.llm.anthropic {
            add(
                "llm.anthropic.api_key_env",
                "llm_anthropic",
                anthropic.api_key_env.clone(),
            );
            add(
                "llm.anthropic.base_url",
                "llm_anthropic",
                anthropic.base_url.clone(),
            );
            add("llm.anthropic.model", "llm_anthropic", anthropic.model.clone());
        }

        add(
            "llm.retry.max_retries",
            "llm_retry",
            Some(self.max_retries().to_string()),
        );

        for stage in StageId::ALL {
            let key = format!("stages.{stage}");
            add(
                &format!("{key}.temperature"),
                &key,
                self.stage_temperature(stage).map(|t| t.to_string()),
            );
            add(
                &format!("{key}.model"),
                &key,
                self.stages.get(stage).and_then(|s| s.model.clone()),
            );
        }

        config
    }
}
