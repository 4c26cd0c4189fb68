//! Foundation crate for testforge: stage identifiers, error types, exit codes,
//! logging setup and secret redaction shared by every other crate.

pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod redaction;
pub mod types;

pub use error::{ConfigError, ErrorCategory, LlmError, TestforgeError, UserFriendlyError};
pub use exit_codes::ExitCode;
pub use types::{ConfigSource, StageId};
