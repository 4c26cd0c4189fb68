use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use testforge_utils::error::ConfigError;
use testforge_utils::types::StageId;

use super::{
    AnthropicConfig, CliArgs, Config, ConfigSource, DEFAULT_PROVIDER, Defaults, LlmConfig,
    OllamaConfig, OpenRouterConfig, RetryConfig, StagesConfig,
};

/// Directory holding the project config file.
pub const CONFIG_DIR_NAME: &str = ".testforge";

/// Environment variable pointing at a directory that contains `config.toml`.
pub const HOME_ENV: &str = "TESTFORGE_HOME";

/// Environment variable overriding `[llm] provider`.
pub const PROVIDER_ENV: &str = "TESTFORGE_LLM_PROVIDER";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
struct TomlConfig {
    defaults: Option<Defaults>,
    llm: Option<LlmConfig>,
    stages: Option<StagesConfig>,
}

impl Config {
    /// Discover and load configuration with precedence: CLI > env > file > defaults
    ///
    /// Uses current working directory for config file discovery when no explicit
    /// path is provided in cli_args.
    pub fn discover(cli_args: &CliArgs) -> Result<Self> {
        let start_dir = env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory
    ///
    /// Path-driven variant of [`Config::discover`].
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self> {
        let mut source_attribution = HashMap::new();

        let mut defaults = Defaults::default();
        let mut llm = LlmConfig::default();
        let mut stages = StagesConfig::default();

        for key in ["stage_timeout", "language", "verbose"] {
            source_attribution.insert(key.to_string(), ConfigSource::Default);
        }

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    }
                    .into());
                }
                Some(explicit.clone())
            }
            None => Self::home_config_file()?.map_or_else(
                || Self::discover_config_file_from(start_dir),
                |path| Ok(Some(path)),
            )?,
        };

        if let Some(path) = &config_path {
            let file_config = Self::load_config_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?;
            let source = ConfigSource::Config;

            if let Some(file_defaults) = file_config.defaults {
                if file_defaults.model.is_some() {
                    defaults.model = file_defaults.model;
                    source_attribution.insert("model".to_string(), source);
                }
                if file_defaults.stage_timeout.is_some() {
                    defaults.stage_timeout = file_defaults.stage_timeout;
                    source_attribution.insert("stage_timeout".to_string(), source);
                }
                if file_defaults.language.is_some() {
                    defaults.language = file_defaults.language;
                    source_attribution.insert("language".to_string(), source);
                }
                if file_defaults.verbose.is_some() {
                    defaults.verbose = file_defaults.verbose;
                    source_attribution.insert("verbose".to_string(), source);
                }
            }

            if let Some(file_llm) = file_config.llm {
                if file_llm.provider.is_some() {
                    llm.provider = file_llm.provider;
                    source_attribution.insert("llm_provider".to_string(), source);
                }
                if file_llm.fallback_provider.is_some() {
                    llm.fallback_provider = file_llm.fallback_provider;
                    source_attribution.insert("llm_fallback_provider".to_string(), source);
                }
                if let Some(ollama) = file_llm.ollama {
                    llm.ollama = Some(ollama);
                    source_attribution.insert("llm_ollama".to_string(), source);
                }
                if let Some(openrouter) = file_llm.openrouter {
                    llm.openrouter = Some(openrouter);
                    source_attribution.insert("llm_openrouter".to_string(), source);
                }
                if let Some(anthropic) = file_llm.anthropic {
                    llm.anthropic = Some(anthropic);
                    source_attribution.insert("llm_anthropic".to_string(), source);
                }
                if let Some(retry) = file_llm.retry {
                    llm.retry = Some(retry);
                    source_attribution.insert("llm_retry".to_string(), source);
                }
            }

            if let Some(file_stages) = file_config.stages {
                stages = file_stages;
                for stage in StageId::ALL {
                    if stages.get(stage).is_some() {
                        source_attribution.insert(format!("stages.{stage}"), source);
                    }
                }
            }
        }

        // Environment overrides the file
        if let Ok(env_provider) = env::var(PROVIDER_ENV)
            && !env_provider.is_empty()
        {
            llm.provider = Some(env_provider);
            source_attribution.insert("llm_provider".to_string(), ConfigSource::Env);
        }

        // CLI overrides everything
        if let Some(model) = &cli_args.model {
            defaults.model = Some(model.clone());
            source_attribution.insert("model".to_string(), ConfigSource::Cli);
        }
        if let Some(stage_timeout) = cli_args.stage_timeout {
            defaults.stage_timeout = Some(stage_timeout);
            source_attribution.insert("stage_timeout".to_string(), ConfigSource::Cli);
        }
        if let Some(language) = &cli_args.language {
            defaults.language = Some(language.clone());
            source_attribution.insert("language".to_string(), ConfigSource::Cli);
        }
        if let Some(verbose) = cli_args.verbose {
            defaults.verbose = Some(verbose);
            source_attribution.insert("verbose".to_string(), ConfigSource::Cli);
        }
        if let Some(provider) = &cli_args.llm_provider {
            llm.provider = Some(provider.clone());
            source_attribution.insert("llm_provider".to_string(), ConfigSource::Cli);
        }
        if let Some(max_retries) = cli_args.max_retries {
            llm.retry
                .get_or_insert_with(RetryConfig::default)
                .max_retries = Some(max_retries);
            source_attribution.insert("llm_retry".to_string(), ConfigSource::Cli);
        }

        if llm.provider.is_none() {
            llm.provider = Some(DEFAULT_PROVIDER.to_string());
            source_attribution.insert("llm_provider".to_string(), ConfigSource::Default);
        }

        // --base-url lands in whichever provider section ends up selected
        if let Some(base_url) = &cli_args.base_url {
            let key = match llm.provider.as_deref() {
                Some("openrouter") => {
                    llm.openrouter
                        .get_or_insert_with(OpenRouterConfig::default)
                        .base_url = Some(base_url.clone());
                    "llm_openrouter"
                }
                Some("anthropic") => {
                    llm.anthropic
                        .get_or_insert_with(AnthropicConfig::default)
                        .base_url = Some(base_url.clone());
                    "llm_anthropic"
                }
                _ => {
                    llm.ollama
                        .get_or_insert_with(OllamaConfig::default)
                        .base_url = Some(base_url.clone());
                    "llm_ollama"
                }
            };
            source_attribution.insert(key.to_string(), ConfigSource::Cli);
        }

        let config = Self {
            defaults,
            llm,
            stages,
            source_attribution,
        };

        config.validate()?;

        Ok(config)
    }

    /// `$TESTFORGE_HOME/config.toml`, when the variable is set and the file exists.
    fn home_config_file() -> Result<Option<PathBuf>> {
        match env::var_os(HOME_ENV) {
            Some(home) if !home.is_empty() => {
                let path = PathBuf::from(home).join("config.toml");
                Ok(path.is_file().then_some(path))
            }
            _ => Ok(None),
        }
    }

    /// Discover config file by searching upward from a given directory
    ///
    /// Walks up the directory tree looking for `.testforge/config.toml`, stopping
    /// at repository root markers (.git, .hg, .svn) or the filesystem root.
    pub fn discover_config_file_from(start_dir: &Path) -> Result<Option<PathBuf>> {
        let mut current_dir = start_dir;

        loop {
            let config_path = current_dir.join(CONFIG_DIR_NAME).join("config.toml");
            if config_path.is_file() {
                return Ok(Some(config_path));
            }

            if current_dir.join(".git").exists()
                || current_dir.join(".hg").exists()
                || current_dir.join(".svn").exists()
            {
                break;
            }

            match current_dir.parent() {
                Some(parent) => current_dir = parent,
                None => break,
            }
        }

        Ok(None)
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: TomlConfig = toml::from_str(&content).map_err(|e| {
            ConfigError::InvalidFile(format!("{}: {e}", path.display()))
        })?;
        Ok(config)
    }

    /// Discover configuration from environment and filesystem without CLI overrides.
    pub fn discover_from_env_and_fs() -> Result<Self> {
        Self::discover(&CliArgs::default())
    }
}
