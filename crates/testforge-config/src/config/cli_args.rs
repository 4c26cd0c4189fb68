use std::path::PathBuf;

/// Command-line overrides fed into [`Config::discover`](super::Config::discover).
///
/// Every field is optional; `None` leaves the lower-precedence value in place.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Explicit config file (`--config`). Disables discovery.
    pub config_path: Option<PathBuf>,
    pub model: Option<String>,
    pub llm_provider: Option<String>,
    /// Base URL applied to the selected provider's section.
    pub base_url: Option<String>,
    pub stage_timeout: Option<u64>,
    pub max_retries: Option<u32>,
    pub language: Option<String>,
    pub verbose: Option<bool>,
}
