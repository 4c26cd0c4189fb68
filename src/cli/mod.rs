//! Command-line interface for testforge
//!
//! - `args`: clap definitions
//! - `run`: entry point and dispatch
//! - `commands`: `generate` and `config`

pub mod args;
pub mod commands;
mod run;


pub use args::{Cli, Commands, build_cli};
pub use run::{build_cli_args, run, run_cli};
