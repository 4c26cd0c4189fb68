//! CLI command implementations

mod config_cmd;
mod generate;
mod json_emit;

pub use config_cmd::{config_entries, execute_config_command};
pub use generate::{
    ensure_not_blank, execute_generate_command, progress_line, read_snippet, render_text,
};
pub use json_emit::{ConfigEntry, emit_chain_result_json, emit_config_json};
