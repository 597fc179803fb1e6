//! Parsing and validation of generated structured output.
//!
//! Text-generation calls are asked for JSON, but what comes back is free
//! text: fenced code blocks, prose preambles, or no structure at all. This
//! module locates the JSON payload and validates it against the schema of
//! each call site.

mod items;
mod payload;
mod scores;

pub use items::{assign_item_ids, parse_risk_items, RiskItemDraft};
pub use payload::{extract_payload, PayloadKind};
pub use scores::parse_axis_scores;

use thiserror::Error;

/// Errors raised when a generated response does not match its schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResponseError {
    #[error("No JSON {0} found in response")]
    NoPayload(PayloadKind),

    #[error("Failed to parse JSON payload: {0}")]
    InvalidJson(String),

    #[error("Expected a JSON {expected}, found {found}")]
    UnexpectedShape {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Response contained no risk items")]
    EmptyItemList,

    #[error("Item {index}: missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("Unknown risk category '{0}'")]
    UnknownCategory(String),

    #[error("Missing axis score '{0}'")]
    MissingAxis(&'static str),

    #[error("Axis '{axis}' value {value} is outside [1, 5]")]
    AxisOutOfRange { axis: &'static str, value: String },

    #[error("Rationale is empty")]
    EmptyRationale,
}

pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
