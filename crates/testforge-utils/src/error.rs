use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::exit_codes::ExitCode;

/// Library-level error type with user-friendly reporting.
///
/// `TestforgeError` covers everything that can stop testforge *before* or
/// *around* a chain run: bad configuration, unreadable input, a backend that
/// cannot be constructed. Failures *inside* a chain run never surface as
/// `TestforgeError`; the orchestrator turns them into entries of
/// `ChainResult::errors`.
///
/// # Exit Code Mapping
///
/// | Exit Code | Error Type |
/// |-----------|------------|
/// | 2 | Configuration, CLI argument or input errors |
/// | 70 | LLM backend errors |
/// | 1 | Other errors |
#[derive(Error, Debug)]
pub enum TestforgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM backend error: {0}")]
    Llm(#[from] LlmError),

    #[error("Invalid input: {reason}")]
    Input { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors raised during discovery, parsing or validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },
}

/// Errors produced by LLM backends.
///
/// Every transport- or provider-specific failure is mapped onto one of these
/// variants at the backend boundary. HTTP-derived variants keep the status code
/// so callers can report it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Transport-level failure (connection refused, DNS, TLS)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider authentication failure (401, 403)
    #[error("Provider authentication error ({status}): {message}")]
    ProviderAuth { status: u16, message: String },

    /// Provider quota/rate limit exceeded (429)
    #[error("Provider quota exceeded ({status}): {message}")]
    ProviderQuota { status: u16, message: String },

    /// Provider service outage (5xx)
    #[error("Provider outage ({status}): {message}")]
    ProviderOutage { status: u16, message: String },

    /// Provider rejected the request (other 4xx, e.g. unknown model)
    #[error("Provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Response arrived but could not be decoded into text
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Invocation timed out
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Configuration error
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    /// Unsupported feature or provider
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl LlmError {
    /// HTTP status code attached to this error, if the provider answered with one.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ProviderAuth { status, .. }
            | Self::ProviderQuota { status, .. }
            | Self::ProviderOutage { status, .. }
            | Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a retry could plausibly succeed (5xx and network faults).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ProviderOutage { .. } | Self::Transport(_))
    }
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Backend,
    ResourceLimits,
    FileSystem,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Input => write!(f, "Input"),
            Self::Backend => write!(f, "LLM Backend"),
            Self::ResourceLimits => write!(f, "Resource Limits"),
            Self::FileSystem => write!(f, "File System"),
        }
    }
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(msg) => format!("Configuration file is invalid: {msg}"),
            Self::MissingRequired(key) => format!("Required configuration '{key}' is missing"),
            Self::InvalidValue { key, value } => {
                format!("Configuration value for '{key}' is invalid: {value}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
        }
    }

    fn context(&self) -> Option<String> {
        Some(
            "Configuration is loaded with precedence: CLI flags > TESTFORGE_* env > .testforge/config.toml > defaults."
                .to_string(),
        )
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax of .testforge/config.toml".to_string(),
                "Run 'testforge config' to see the effective configuration".to_string(),
            ],
            Self::MissingRequired(_) => vec![
                "Add the missing key to .testforge/config.toml or pass it as a CLI flag"
                    .to_string(),
            ],
            Self::InvalidValue { .. } => vec![
                "Correct the value in the config file or override it on the command line"
                    .to_string(),
                "Run 'testforge config' to see where each value comes from".to_string(),
            ],
            Self::NotFound { .. } => vec![
                "Check the path passed to --config".to_string(),
                "Omit --config to use upward discovery of .testforge/config.toml".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

impl UserFriendlyError for LlmError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("LLM transport error: {msg}"),
            Self::ProviderAuth { status, message } => {
                format!("LLM provider authentication failed ({status}): {message}")
            }
            Self::ProviderQuota { status, message } => {
                format!("LLM provider quota exceeded ({status}): {message}")
            }
            Self::ProviderOutage { status, message } => {
                format!("LLM provider service outage ({status}): {message}")
            }
            Self::Rejected { status, message } => {
                format!("LLM provider rejected the request ({status}): {message}")
            }
            Self::MalformedResponse(msg) => format!("LLM response could not be read: {msg}"),
            Self::Timeout { duration } => {
                format!("LLM invocation timed out after {duration:?}")
            }
            Self::Misconfiguration(msg) => format!("LLM configuration error: {msg}"),
            Self::Unsupported(msg) => format!("LLM feature not supported: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Transport(_) => Some(
                "Transport errors occur when the LLM backend cannot be reached.".to_string(),
            ),
            Self::ProviderAuth { .. } => Some(
                "Authentication errors indicate missing or invalid API keys.".to_string(),
            ),
            Self::ProviderQuota { .. } => Some(
                "Quota errors occur when rate limits or usage limits are exceeded.".to_string(),
            ),
            Self::ProviderOutage { .. } => {
                Some("Provider outages are temporary service disruptions.".to_string())
            }
            Self::Rejected { .. } => Some(
                "The provider understood the request but refused it, often because the model is not available."
                    .to_string(),
            ),
            Self::MalformedResponse(_) => None,
            Self::Timeout { .. } => Some(
                "Timeouts occur when a stage takes longer than the configured stage_timeout."
                    .to_string(),
            ),
            Self::Misconfiguration(_) => Some(
                "Configuration errors indicate missing or invalid LLM provider settings."
                    .to_string(),
            ),
            Self::Unsupported(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Transport(_) => vec![
                "Check that Ollama is running ('ollama serve') when using the ollama provider"
                    .to_string(),
                "Verify network connectivity for hosted providers".to_string(),
                "Try running with --verbose to see detailed error information".to_string(),
            ],
            Self::ProviderAuth { .. } => vec![
                "Check that the required API key environment variable is set".to_string(),
                "Verify the API key is valid and not expired".to_string(),
            ],
            Self::ProviderQuota { .. } | Self::ProviderOutage { .. } => vec![
                "Wait a few minutes and try again".to_string(),
                "Enable bounded retries with [llm.retry] max_retries".to_string(),
                "Consider configuring a fallback_provider".to_string(),
            ],
            Self::Rejected { .. } => vec![
                "Check that the configured model exists (e.g. 'ollama pull <model>')".to_string(),
            ],
            Self::MalformedResponse(_) => vec![
                "Check that base_url points at the provider's API, not a web page".to_string(),
            ],
            Self::Timeout { .. } => vec![
                "Increase stage_timeout in configuration or via --stage-timeout".to_string(),
                "Use a smaller or faster model".to_string(),
            ],
            Self::Misconfiguration(_) => vec![
                "Check the [llm] section in .testforge/config.toml".to_string(),
                "Ensure required configuration keys are present".to_string(),
            ],
            Self::Unsupported(_) => vec![
                "Supported providers: ollama, openrouter, anthropic".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::ProviderAuth { .. } | Self::Misconfiguration(_) | Self::Unsupported(_) => {
                ErrorCategory::Configuration
            }
            Self::ProviderQuota { .. } | Self::Timeout { .. } => ErrorCategory::ResourceLimits,
            _ => ErrorCategory::Backend,
        }
    }
}

impl UserFriendlyError for TestforgeError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(err) => err.user_message(),
            Self::Llm(err) => err.user_message(),
            Self::Input { reason } => format!("Input rejected: {reason}"),
            Self::Io(err) => format!("I/O failure: {err}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(err) => err.context(),
            Self::Llm(err) => err.context(),
            Self::Input { .. } => Some(
                "testforge reads the code under test from a file argument or from stdin."
                    .to_string(),
            ),
            Self::Io(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(err) => err.suggestions(),
            Self::Llm(err) => err.suggestions(),
            Self::Input { .. } => vec![
                "Pass a file path: testforge generate src/add.go".to_string(),
                "Or pipe code in: cat add.go | testforge generate".to_string(),
            ],
            Self::Io(_) => vec!["Check that the file exists and is readable".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(err) => err.category(),
            Self::Llm(err) => err.category(),
            Self::Input { .. } => ErrorCategory::Input,
            Self::Io(_) => ErrorCategory::FileSystem,
        }
    }
}

impl TestforgeError {
    /// Get a user-friendly error message with context and actionable suggestions.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error: {}\n", self.user_message()));

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        output
    }

    /// Map this error to the CLI exit code.
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) | Self::Input { .. } => ExitCode::CLI_ARGS,
            Self::Llm(LlmError::Misconfiguration(_) | LlmError::Unsupported(_)) => {
                ExitCode::CLI_ARGS
            }
            Self::Llm(_) => ExitCode::BACKEND_FAILURE,
            Self::Io(_) => ExitCode::INTERNAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_only_for_http_variants() {
        let auth = LlmError::ProviderAuth {
            status: 401,
            message: "bad key".to_string(),
        };
        assert_eq!(auth.status_code(), Some(401));

        let rejected = LlmError::Rejected {
            status: 404,
            message: "model 'x' not found".to_string(),
        };
        assert_eq!(rejected.status_code(), Some(404));

        assert_eq!(LlmError::Transport("refused".to_string()).status_code(), None);
        assert_eq!(
            LlmError::Timeout {
                duration: Duration::from_secs(5)
            }
            .status_code(),
            None
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::Transport("reset".to_string()).is_transient());
        assert!(
            LlmError::ProviderOutage {
                status: 503,
                message: "down".to_string()
            }
            .is_transient()
        );
        assert!(
            !LlmError::ProviderQuota {
                status: 429,
                message: "slow down".to_string()
            }
            .is_transient()
        );
        assert!(
            !LlmError::Timeout {
                duration: Duration::from_secs(5)
            }
            .is_transient()
        );
    }

    #[test]
    fn test_display_includes_status() {
        let err = LlmError::ProviderQuota {
            status: 429,
            message: "rate limit exceeded".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("429"));
        assert!(text.contains("rate limit exceeded"));
    }

    #[test]
    fn test_exit_code_mapping() {
        let config = TestforgeError::Config(ConfigError::InvalidValue {
            key: "stage_timeout".to_string(),
            value: "must be at least 5 seconds".to_string(),
        });
        assert_eq!(config.to_exit_code(), ExitCode::CLI_ARGS);

        let input = TestforgeError::Input {
            reason: "snippet is empty".to_string(),
        };
        assert_eq!(input.to_exit_code(), ExitCode::CLI_ARGS);

        let misconfigured =
            TestforgeError::Llm(LlmError::Misconfiguration("no model".to_string()));
        assert_eq!(misconfigured.to_exit_code(), ExitCode::CLI_ARGS);

        let outage = TestforgeError::Llm(LlmError::ProviderOutage {
            status: 502,
            message: "bad gateway".to_string(),
        });
        assert_eq!(outage.to_exit_code(), ExitCode::BACKEND_FAILURE);
    }

    #[test]
    fn test_display_for_user_has_suggestions() {
        let err = TestforgeError::Input {
            reason: "snippet is empty".to_string(),
        };
        let report = err.display_for_user();
        assert!(report.starts_with("Error: Input rejected: snippet is empty"));
        assert!(report.contains("Suggestions:"));
        assert!(report.contains("testforge generate"));
    }
}
