//! CLI entry point and dispatch
//!
//! `run()` parses arguments, discovers configuration, builds the tokio runtime
//! and dispatches to a command. It prints every error itself.

use anyhow::Result;
use clap::Parser;

use super::args::{Cli, Commands};
use super::commands;

use crate::error::ConfigError;
use crate::logging::{LogFormat, init_tracing};
use crate::redaction::redact_error_message;
use crate::{CliArgs, Config, ExitCode, TestforgeError};

/// Main CLI execution function.
///
/// Returns `Err(ExitCode)` after printing the error report; main.rs only maps
/// the code to `std::process::exit`.
pub fn run() -> Result<(), ExitCode> {
    run_cli(Cli::parse())
}

/// Run an already-parsed command line.
pub fn run_cli(cli: Cli) -> Result<(), ExitCode> {
    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    if let Err(e) = init_tracing(cli.verbose, format) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let cli_args = build_cli_args(&cli);

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => return Err(report_anyhow(&err)),
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let outcome = rt.block_on(async {
        match cli.command {
            Commands::Generate { input, json, .. } => {
                commands::execute_generate_command(input.as_deref(), json, &config).await
            }
            Commands::Config { json } => {
                commands::execute_config_command(json, &config).map(|()| ExitCode::SUCCESS)
            }
        }
    });

    match outcome {
        Ok(code) if code == ExitCode::SUCCESS => Ok(()),
        Ok(code) => Err(code),
        Err(err) => Err(report_anyhow(&err)),
    }
}

/// Map the parsed command line onto configuration overrides.
#[must_use]
pub fn build_cli_args(cli: &Cli) -> CliArgs {
    let mut args = CliArgs {
        config_path: cli.config.clone(),
        verbose: cli.verbose.then_some(true),
        ..CliArgs::default()
    };

    if let Commands::Generate {
        language,
        provider,
        model,
        base_url,
        stage_timeout,
        max_retries,
        ..
    } = &cli.command
    {
        args.language.clone_from(language);
        args.llm_provider.clone_from(provider);
        args.model.clone_from(model);
        args.base_url.clone_from(base_url);
        args.stage_timeout = *stage_timeout;
        args.max_retries = *max_retries;
    }

    args
}

/// Print an error report and pick the exit code.
fn report_anyhow(err: &anyhow::Error) -> ExitCode {
    if let Some(error) = err.downcast_ref::<TestforgeError>() {
        eprint!("{}", error.display_for_user());
        return error.to_exit_code();
    }
    if let Some(config_error) = err.downcast_ref::<ConfigError>() {
        let error = TestforgeError::Config(config_error.clone());
        eprint!("{}", error.display_for_user());
        return error.to_exit_code();
    }

    eprintln!("✗ Unexpected error: {}", redact_error_message(&format!("{err:#}")));
    eprintln!("\n  Run with --verbose for more detailed output");
    ExitCode::INTERNAL
}
