//! Free-text canonicalization.
//!
//! Every string that enters the pipeline (document paragraphs, user queries,
//! model output) passes through [`normalize`]. The allowed alphabet is word
//! characters, whitespace, and `. , ! ? ( ) -`; everything else is dropped
//! and whitespace runs collapse to a single space.
//!
//! Characters are stripped *before* whitespace is collapsed and trimmed, so a
//! removed symbol can never leave a double space or a leading space behind.
//! That ordering is what makes the function idempotent.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

fn disallowed() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^\w\s.,!?()\-]").expect("static pattern"))
}

fn paragraph_break() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n[ \t\r\f\v]*\n").expect("static pattern"))
}

/// Canonicalize free text.
///
/// Empty input yields an empty string.
///
/// ```rust
/// use deskhand_core::normalize::normalize;
///
/// assert_eq!(normalize("  Hello,\n\n   world!! #1 "), "Hello, world!! 1");
/// ```
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        tracing::debug!("normalize called with empty input");
        return String::new();
    }
    let stripped = disallowed().replace_all(text, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonicalize an untyped value coming from a channel payload.
///
/// Non-string values (null, numbers, objects) yield an empty string.
pub fn normalize_value(value: &Value) -> String {
    match value {
        Value::String(s) => normalize(s),
        Value::Null => String::new(),
        other => {
            tracing::debug!(kind = value_kind(other), "normalize called with non-string input");
            String::new()
        }
    }
}

/// Normalize a document while keeping its paragraph structure.
///
/// Each blank-line separated paragraph is normalized on its own; empty
/// paragraphs are dropped and the rest are re-joined with `"\n\n"`. The
/// chunker relies on those paragraph breaks as its coarsest separator.
pub fn normalize_paragraphs(text: &str) -> String {
    let unified = text.replace("\r\n", "\n");
    paragraph_break()
        .split(&unified)
        .map(normalize)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
