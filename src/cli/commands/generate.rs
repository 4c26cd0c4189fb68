//! `testforge generate`

use anyhow::Result;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use super::json_emit::emit_chain_result_json;
use crate::orchestrator::{STATUS_COMPLETED, STATUS_FAILED};
use crate::{
    CancellationToken, ChainOrchestrator, ChainResult, Config, ExitCode, StageId, TestforgeError,
};

/// Read the snippet from `input`, or stdin for `None` / `-`.
///
/// # Errors
///
/// `TestforgeError::Input` if the source cannot be read or holds only
/// whitespace.
pub fn read_snippet(input: Option<&Path>) -> Result<String, TestforgeError> {
    let snippet = match input {
        Some(path) if path != Path::new("-") => {
            std::fs::read_to_string(path).map_err(|e| TestforgeError::Input {
                reason: format!("cannot read {}: {e}", path.display()),
            })?
        }
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| TestforgeError::Input {
                    reason: format!("cannot read stdin: {e}"),
                })?;
            buf
        }
    };

    ensure_not_blank(snippet)
}

/// Reject empty or whitespace-only snippets before any backend call.
pub fn ensure_not_blank(snippet: String) -> Result<String, TestforgeError> {
    if snippet.trim().is_empty() {
        return Err(TestforgeError::Input {
            reason: "source snippet is empty".to_string(),
        });
    }
    Ok(snippet)
}

/// One progress line for stderr.
#[must_use]
pub fn progress_line(stage: StageId, status: &str) -> String {
    let step = stage.index() + 1;
    let total = StageId::ALL.len();
    match status {
        STATUS_COMPLETED => format!("  ✓ [{step}/{total}] {stage} done"),
        STATUS_FAILED => format!("  ✗ [{step}/{total}] {stage} failed"),
        label => format!("→ [{step}/{total}] {label}..."),
    }
}

/// Plain-text rendering of a chain result for stdout.
#[must_use]
pub fn render_text(result: &ChainResult) -> String {
    let sections = [
        ("Analysis", result.analysis.as_deref()),
        ("Test Cases", result.test_cases.as_deref()),
        ("Test Code", result.test_code.as_deref()),
    ];

    let mut out = String::new();
    for (title, body) in sections {
        let Some(body) = body else { break };
        out.push_str(&format!("## {title}\n\n{}\n\n", body.trim_end()));
    }
    out
}

pub async fn execute_generate_command(
    input: Option<&Path>,
    json: bool,
    config: &Config,
) -> Result<ExitCode> {
    let snippet = read_snippet(input)?;

    let (backend, fallback) =
        crate::llm::from_config_with_fallback(config).map_err(TestforgeError::from)?;
    if let Some(info) = fallback {
        eprintln!(
            "Warning: provider '{}' unavailable ({}); using '{}'",
            info.primary_provider, info.reason, info.fallback_provider
        );
    }

    let chain = ChainOrchestrator::from_config(backend, config);
    debug!(
        provider = chain.provider_name(),
        language = chain.settings().language.name(),
        snippet_bytes = snippet.len(),
        "Starting generate"
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling chain");
            interrupt.cancel();
        }
    });

    let progress = |stage: StageId, status: &str| eprintln!("{}", progress_line(stage, status));
    let result = chain.run_with_cancel(&snippet, Some(&progress), cancel).await;
    watcher.abort();

    if json {
        println!("{}", emit_chain_result_json(&result)?);
    } else {
        print!("{}", render_text(&result));
        for error in &result.errors {
            eprintln!("✗ {error}");
        }
    }

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::CHAIN_FAILED
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_blank_snippets_are_rejected() {
        for blank in ["", "   ", "\n\t \r\n"] {
            let err = ensure_not_blank(blank.to_string()).unwrap_err();
            assert_eq!(err.to_exit_code(), ExitCode::CLI_ARGS);
        }
        assert_eq!(ensure_not_blank(" x ".to_string()).unwrap(), " x ");
    }

    #[test]
    fn test_read_snippet_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "fn add(a: i32, b: i32) -> i32 {{ a + b }}").unwrap();

        let snippet = read_snippet(Some(file.path())).unwrap();
        assert!(snippet.starts_with("fn add"));
    }

    #[test]
    fn test_read_snippet_missing_file_is_input_error() {
        let err = read_snippet(Some(Path::new("/definitely/not/here.go"))).unwrap_err();
        assert!(matches!(err, TestforgeError::Input { .. }));
        assert!(err.to_string().contains("/definitely/not/here.go"));
    }

    #[test]
    fn test_render_text_stops_at_first_missing_section() {
        let result = ChainResult {
            analysis: Some("adds numbers\n".to_string()),
            errors: vec!["Failed to generate test cases: boom".to_string()],
            ..ChainResult::default()
        };
        let text = render_text(&result);
        assert_eq!(text, "## Analysis\n\nadds numbers\n\n");
    }

    #[test]
    fn test_progress_lines() {
        assert_eq!(
            progress_line(StageId::Analysis, "Analyzing source code"),
            "→ [1/3] Analyzing source code..."
        );
        assert_eq!(
            progress_line(StageId::TestCode, STATUS_COMPLETED),
            "  ✓ [3/3] test_code done"
        );
        assert_eq!(
            progress_line(StageId::TestCases, STATUS_FAILED),
            "  ✗ [2/3] test_cases failed"
        );
    }
}
