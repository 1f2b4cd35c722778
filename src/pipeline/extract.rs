//! Recover a JSON value from free-form model output.

use serde_json::Value;

const FENCE: &str = "```";

/// Result of reading model output as JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// Any JSON value; the shape is not checked.
    Parsed(Value),
    /// The cleaned text that failed to parse.
    Unparsed(String),
}

/// Strip one level of markdown fencing and parse the remainder as JSON.
///
/// A leading fence keeps only the text up to the next fence (or the end),
/// minus an optional `json` language tag. Never fails.
pub fn extract(raw: &str) -> Extracted {
    let cleaned = strip_fence(raw.trim());
    match serde_json::from_str::<Value>(cleaned) {
        Ok(value) => Extracted::Parsed(value),
        Err(_) => Extracted::Unparsed(cleaned.to_string()),
    }
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix(FENCE) else {
        return text;
    };
    let segment = match rest.find(FENCE) {
        Some(end) => &rest[..end],
        None => rest,
    };
    segment.strip_prefix("json").unwrap_or(segment).trim()
}
