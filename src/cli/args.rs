//! CLI argument definitions (clap)

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// testforge - generate tests for a code snippet with an LLM
#[derive(Parser, Debug)]
#[command(name = "testforge")]
#[command(about = "Generate tests for a code snippet through a three-stage LLM chain")]
#[command(long_about = r#"
testforge sends a code snippet through three dependent LLM requests:
an analysis of the code, a list of test cases derived from the analysis,
and test code implementing those cases. The first failing stage stops the chain.

EXAMPLES:
  # Generate Go tests for a file with the local Ollama server
  testforge generate add.go

  # Read the snippet from stdin and target Rust
  cat add.rs | testforge generate --language rust

  # Use OpenRouter with a specific model and emit canonical JSON
  testforge generate add.py --language python --provider openrouter \
      --model qwen/qwen-2.5-coder-32b-instruct --json

  # Show the effective configuration
  testforge config

CONFIGURATION:
  Precedence: CLI flags > TESTFORGE_LLM_PROVIDER > config file > defaults
  The config file is .testforge/config.toml, discovered upward from the
  current directory, or $TESTFORGE_HOME/config.toml.

EXIT CODES:
  0   all three stages succeeded
  1   internal error
  2   invalid arguments, configuration or input
  70  the chain stopped at a failed stage
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the analysis, test-case and test-code stages for a snippet
    Generate {
        /// Source file to read; `-` or nothing reads stdin
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Target language of the snippet and the generated tests (default: go)
        #[arg(short, long)]
        language: Option<String>,

        /// LLM provider: ollama, openrouter or anthropic
        #[arg(long)]
        provider: Option<String>,

        /// Model for every stage without its own override
        #[arg(long)]
        model: Option<String>,

        /// Base URL of the selected provider
        #[arg(long)]
        base_url: Option<String>,

        /// Per-stage timeout in seconds (default: 600, min: 5)
        #[arg(long)]
        stage_timeout: Option<u64>,

        /// Retries for transient HTTP failures (default: 0, max: 5)
        #[arg(long)]
        max_retries: Option<u32>,

        /// Print the result as canonical JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration and where each value came from
    Config {
        /// Print as canonical JSON
        #[arg(long)]
        json: bool,
    },
}

/// Build the clap command (for completions and white-box tests)
#[must_use]
pub fn build_cli() -> clap::Command {
    <Cli as clap::CommandFactory>::command()
}
