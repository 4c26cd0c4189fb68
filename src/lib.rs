//! testforge - generate tests for a code snippet through a three-stage LLM chain
//!
//! A snippet goes through three dependent requests to a text-generation
//! backend: an analysis of the code, a list of test cases derived from that
//! analysis, and finally test code implementing the cases. The first failing
//! stage stops the chain.
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! # Generate Go tests for a file using a local Ollama server
//! testforge generate add.go
//!
//! # Read the snippet from stdin, emit canonical JSON
//! cat add.rs | testforge generate - --language rust --json
//!
//! # Show the effective configuration and where each value came from
//! testforge config
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use testforge::{ChainOrchestrator, CliArgs, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::discover(&CliArgs::default())?;
//!     let backend = testforge::llm::from_config(&config)?;
//!     let chain = ChainOrchestrator::from_config(backend, &config);
//!
//!     let result = chain.run("def add(a, b):\n    return a + b", None).await;
//!     if result.is_success() {
//!         println!("{}", result.test_code.unwrap_or_default());
//!     } else {
//!         eprintln!("{}", result.errors.join("\n"));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # JSON Output
//!
//! `--json` output is JCS (RFC 8785) canonical JSON with keys `analysis`,
//! `test_cases`, `test_code`, `errors` and `stages`. Use [`emit_jcs`] for the
//! same encoding in your own integrations.

// ============================================================================
// Stable Public API
// ============================================================================

/// Drives a snippet through the three stages. See [`ChainOrchestrator::run`].
pub use testforge_orchestrator::ChainOrchestrator;

/// Outcome of a chain run: stage outputs plus at most one error message.
pub use testforge_orchestrator::ChainResult;

pub use testforge_orchestrator::{
    CancellationToken, ChainSettings, ChainState, ChannelObserver, NoopObserver,
    ProgressObserver, ProgressUpdate, StageRecord,
};

/// Stage identifiers: Analysis → TestCases → TestCode.
pub use testforge_utils::types::StageId;

/// Configuration with discovery and precedence:
/// CLI arguments > environment > config file > built-in defaults.
pub use testforge_config::Config;

/// Builder for programmatic configuration without files or environment.
///
/// ```rust
/// use std::time::Duration;
/// use testforge::Config;
///
/// let config = Config::builder()
///     .llm_provider("ollama")
///     .language("rust")
///     .stage_timeout(Duration::from_secs(120))
///     .build()
///     .expect("valid config");
/// assert_eq!(config.language(), "rust");
/// ```
pub use testforge_config::ConfigBuilder;

/// CLI-level overrides fed into [`Config::discover`].
pub use testforge_config::CliArgs;

/// Library-level error type with user-facing reporting and exit code mapping.
pub use testforge_utils::error::TestforgeError;

pub use testforge_utils::error::{ErrorCategory, UserFriendlyError};

/// Exit codes of the `testforge` binary.
pub use testforge_utils::exit_codes::ExitCode;

/// Swappable backend strategy used by every stage.
pub use testforge_llm::LlmBackend;

pub use canonicalization::emit_jcs;

mod canonicalization;

// ============================================================================
// Component crates - accessible but not covered by stability guarantees
// ============================================================================

#[doc(hidden)]
pub use testforge_config as config;
#[doc(hidden)]
pub use testforge_llm as llm;
#[doc(hidden)]
pub use testforge_orchestrator as orchestrator;
#[doc(hidden)]
pub use testforge_prompt_template as prompt_template;
#[doc(hidden)]
pub use testforge_utils::{error, exit_codes, logging, redaction, types};

// Exported for white-box testing of argument parsing
#[doc(hidden)]
pub mod cli;
