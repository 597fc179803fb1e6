//! Locating the JSON payload inside generated text.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    /// Fenced code block, optionally tagged `json`.
    static ref FENCED_BLOCK: Regex = Regex::new(r"(?s)```(?:json|JSON)?\s*\n?(.*?)```").unwrap();
}

/// The top-level JSON shape a call site expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Array,
    Object,
}

impl PayloadKind {
    fn delimiters(&self) -> (char, char) {
        match self {
            PayloadKind::Array => ('[', ']'),
            PayloadKind::Object => ('{', '}'),
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadKind::Array => f.write_str("array"),
            PayloadKind::Object => f.write_str("object"),
        }
    }
}

/// Find the JSON payload in a generated response.
///
/// Fenced blocks win when present. Otherwise the span from the first
/// opening delimiter to the last closing one is taken. Returns `None` when
/// the text holds no candidate, e.g. plain prose.
pub fn extract_payload(text: &str, kind: PayloadKind) -> Option<&str> {
    let (open, close) = kind.delimiters();

    for caps in FENCED_BLOCK.captures_iter(text) {
        if let Some(body) = caps.get(1) {
            let body = body.as_str().trim();
            if body.starts_with(open) {
                return Some(body);
            }
        }
    }

    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end < start {
        return None;
    }
    Some(text[start..=end].trim())
}
