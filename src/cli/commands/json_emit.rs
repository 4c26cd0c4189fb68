//! Canonical JSON (JCS, RFC 8785) for command output.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{ChainResult, emit_jcs};

/// One row of `testforge config --json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigEntry {
    pub value: String,
    pub source: String,
}

pub fn emit_chain_result_json(result: &ChainResult) -> Result<String> {
    emit_jcs(result).context("Failed to emit chain result JSON")
}

pub fn emit_config_json(entries: &BTreeMap<String, ConfigEntry>) -> Result<String> {
    emit_jcs(entries).context("Failed to emit config JSON")
}
