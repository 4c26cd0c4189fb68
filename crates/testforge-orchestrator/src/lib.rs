//! Chain orchestrator for testforge
//!
//! Runs a source snippet through three dependent LLM stages:
//!
//! 1. **Analysis**: purpose, inputs, outputs and edge cases of the snippet
//! 2. **Test cases**: distinct scenarios derived from the analysis
//! 3. **Test code**: executable tests implementing those scenarios
//!
//! The first failing stage ends the run; its error is the only entry in
//! [`ChainResult::errors`] and every later output stays unset.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use testforge_config::{CliArgs, Config};
//! use testforge_orchestrator::ChainOrchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::discover(&CliArgs::default())?;
//!     let backend = testforge_llm::from_config(&config)?;
//!     let chain = ChainOrchestrator::from_config(backend, &config);
//!
//!     let result = chain.run("func Add(a, b int) int { return a + b }", None).await;
//!     println!("{}", result.test_code.unwrap_or_default());
//!     Ok(())
//! }
//! ```

mod observer;
mod orchestrator;
mod result;
mod state;

pub use observer::{
    ChannelObserver, NoopObserver, ProgressObserver, ProgressUpdate, STATUS_COMPLETED,
    STATUS_FAILED,
};
pub use orchestrator::{ChainOrchestrator, ChainSettings, StageFailure, StageSettings};
pub use result::{ChainResult, StageRecord};
pub use state::ChainState;
pub use tokio_util::sync::CancellationToken;
