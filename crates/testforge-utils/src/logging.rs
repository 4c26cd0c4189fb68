//! Logging infrastructure for testforge
//!
//! Everything is written to stderr so that stdout stays reserved for the
//! generated sections (or the JSON document).

use tracing::{Level, error, info, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::redaction::redact_error_message;

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable compact lines.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

/// Build the filter used by [`init_tracing`].
///
/// `RUST_LOG` wins when set; otherwise verbose mode enables debug output for
/// testforge crates.
#[must_use]
pub fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("testforge=debug,info")
            } else {
                EnvFilter::try_new("testforge=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber.
///
/// Returns an error if a subscriber is already installed.
pub fn init_tracing(verbose: bool, format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = default_filter(verbose);

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_current_span(true)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .try_init()?;
        }
        LogFormat::Compact if verbose => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_line_number(false)
                        .with_file(false)
                        .with_span_events(FmtSpan::CLOSE)
                        .compact(),
                )
                .try_init()?;
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false)
                        .with_thread_ids(false)
                        .with_line_number(false)
                        .with_file(false)
                        .compact(),
                )
                .try_init()?;
        }
    }

    Ok(())
}

/// Span covering one full chain run.
pub fn chain_span(provider: &str, language: &str) -> tracing::Span {
    span!(
        Level::INFO,
        "chain",
        provider = %provider,
        language = %language,
    )
}

/// Span covering a single stage of a chain run.
pub fn stage_span(stage: &str, provider: &str, model: &str) -> tracing::Span {
    span!(
        Level::INFO,
        "stage",
        stage = %stage,
        provider = %provider,
        model = %model,
    )
}

pub fn log_stage_start(stage: &str, provider: &str) {
    info!(stage = %stage, provider = %provider, "Starting stage");
}

pub fn log_stage_complete(stage: &str, duration_ms: u128, output_bytes: usize) {
    info!(
        stage = %stage,
        duration_ms = %duration_ms,
        output_bytes = output_bytes,
        "Stage completed"
    );
}

/// Log a stage failure. The message is redacted before it reaches the subscriber.
pub fn log_stage_error(stage: &str, error: &str, duration_ms: u128) {
    let sanitized = redact_error_message(error);
    error!(
        stage = %stage,
        duration_ms = %duration_ms,
        error = %sanitized,
        "Stage failed"
    );
}
