//! Redaction of API keys from text that may end up in logs or persisted
//! error bodies.

use regex::Regex;
use std::sync::OnceLock;

fn api_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(sk-|or-)[A-Za-z0-9]{20,}").expect("static api key pattern is valid")
    })
}

/// Replace any substring matching a known provider API key shape
/// (`sk-...` / `or-...`, 20+ trailing alphanumerics) with `[REDACTED]`.
///
/// Applied to every provider response body before it is logged or stored
/// in `LLMApiError::response_body`.
pub fn redact_api_keys(text: &str) -> String {
    api_key_pattern().replace_all(text, "[REDACTED]").into_owned()
}
