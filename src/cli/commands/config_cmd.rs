//! `testforge config`

use anyhow::Result;
use std::collections::BTreeMap;

use super::json_emit::{ConfigEntry, emit_config_json};
use crate::Config;

/// Effective configuration keyed by setting name.
#[must_use]
pub fn config_entries(config: &Config) -> BTreeMap<String, ConfigEntry> {
    config
        .effective_config()
        .into_iter()
        .map(|(key, (value, source))| (key, ConfigEntry { value, source }))
        .collect()
}

pub fn execute_config_command(json: bool, config: &Config) -> Result<()> {
    let entries = config_entries(config);

    if json {
        println!("{}", emit_config_json(&entries)?);
        return Ok(());
    }

    println!("Effective configuration:");
    for (key, entry) in &entries {
        println!("  {key} = {} (from {})", entry.value, entry.source);
    }
    Ok(())
}
