//! Scrubbing of secrets from error text before it is logged or reported.

use once_cell::sync::Lazy;
use regex::Regex;

/// `scheme://user:password@` prefixes.
static URL_WITH_CREDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(https?://)[^:@\s/]+:[^@\s/]+@").unwrap());

/// Runs of 32+ key-like characters, anchored on a non-key character or the
/// start of input so that the boundary survives replacement.
static POTENTIAL_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^A-Za-z0-9_-])[A-Za-z0-9_-]{32,}").unwrap());

/// `Bearer <token>` and `x-api-key: <token>` fragments echoed by proxies.
static AUTH_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(bearer\s+|x-api-key:\s*)[^\s,;]+").unwrap()
});

/// Redact credentials from an error message.
///
/// - URLs with embedded credentials keep their scheme and host.
/// - Authorization header values are replaced.
/// - Long key-like tokens become `[REDACTED_KEY]`.
#[must_use]
pub fn redact_error_message(message: &str) -> String {
    let redacted = URL_WITH_CREDS.replace_all(message, "$1[REDACTED]@");
    let redacted = AUTH_HEADER.replace_all(&redacted, "$1[REDACTED]");
    let redacted = POTENTIAL_KEY.replace_all(&redacted, "${1}[REDACTED_KEY]");
    redacted.into_owned()
}
