//! Axis score schema.
//!
//! Expected shape:
//!
//! ```json
//! {"P": 4, "S": 5, "D": 2, "M": 3, "rationale": "..."}
//! ```
//!
//! Long axis names (`probability`, `severity`, `detectability`,
//! `mitigation_difficulty`) are accepted too. Values must be whole numbers
//! in [1, 5]; `4.0` is accepted, `4.5` is not.

use serde_json::{Map, Value};

use super::payload::{extract_payload, PayloadKind};
use super::{json_type_name, ResponseError};
use crate::types::AxisScores;

const AXES: [(&str, &str); 4] = [
    ("P", "probability"),
    ("S", "severity"),
    ("D", "detectability"),
    ("M", "mitigation_difficulty"),
];

/// Parse and validate a generated axis score set.
pub fn parse_axis_scores(text: &str) -> Result<AxisScores, ResponseError> {
    let payload = extract_payload(text, PayloadKind::Object)
        .ok_or(ResponseError::NoPayload(PayloadKind::Object))?;
    let value: Value =
        serde_json::from_str(payload).map_err(|e| ResponseError::InvalidJson(e.to_string()))?;

    let fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Err(ResponseError::UnexpectedShape {
                expected: "object",
                found: json_type_name(&other),
            })
        }
    };

    let mut values = [0u8; 4];
    for (slot, (short, long)) in values.iter_mut().zip(AXES) {
        *slot = axis_value(&fields, short, long)?;
    }

    let rationale = fields
        .get("rationale")
        .and_then(Value::as_str)
        .unwrap_or_default();

    AxisScores::new(values[0], values[1], values[2], values[3], rationale.trim())
}

fn axis_value(
    fields: &Map<String, Value>,
    short: &'static str,
    long: &'static str,
) -> Result<u8, ResponseError> {
    let value = fields
        .get(short)
        .or_else(|| fields.get(long))
        .filter(|v| !v.is_null())
        .ok_or(ResponseError::MissingAxis(short))?;

    let out_of_range = || ResponseError::AxisOutOfRange {
        axis: short,
        value: value.to_string(),
    };

    let whole = match value {
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i,
            (None, Some(f)) if f.fract() == 0.0 && f.is_finite() => f as i64,
            _ => return Err(out_of_range()),
        },
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| out_of_range())?,
        _ => return Err(out_of_range()),
    };

    u8::try_from(whole)
        .ok()
        .filter(|v| (AxisScores::MIN..=AxisScores::MAX).contains(v))
        .ok_or_else(out_of_range)
}
