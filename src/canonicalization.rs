//! Canonical JSON output (JCS, RFC 8785).

use anyhow::{Context, Result};
use serde::Serialize;

/// Serialize `value` as canonical JSON.
///
/// Object keys are sorted and numbers normalized, so equal values always
/// produce byte-identical text.
///
/// # Errors
///
/// Returns an error if `value` cannot be represented as JSON.
pub fn emit_jcs<T: Serialize>(value: &T) -> Result<String> {
    let json_value =
        serde_json::to_value(value).with_context(|| "Failed to serialize value to JSON")?;
    let json_bytes = serde_json_canonicalizer::to_vec(&json_value)
        .with_context(|| "Failed to canonicalize JSON using JCS")?;
    String::from_utf8(json_bytes).with_context(|| "JCS output contained invalid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_are_sorted() {
        let out = emit_jcs(&json!({"test_code": null, "analysis": "A", "errors": []})).unwrap();
        assert_eq!(out, r#"{"analysis":"A","errors":[],"test_code":null}"#);
    }

    #[test]
    fn test_output_is_stable() {
        let value = json!({"b": 1.0, "a": [3, 2, 1]});
        assert_eq!(emit_jcs(&value).unwrap(), emit_jcs(&value).unwrap());
        assert_eq!(emit_jcs(&value).unwrap(), r#"{"a":[3,2,1],"b":1}"#);
    }
}
