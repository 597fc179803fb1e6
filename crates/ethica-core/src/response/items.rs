//! Risk item list schema.
//!
//! Expected shape, one element per risk item:
//!
//! ```json
//! [{"category": "privacy", "id": "privacy_1", "title": "...", "description": "..."}]
//! ```
//!
//! `risk_item` is accepted as an alias of `title`. The generator's `id` is
//! kept only as a hint; final ids are assigned by [`assign_item_ids`] so
//! they are unique within the run.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::payload::{extract_payload, PayloadKind};
use super::{json_type_name, ResponseError};
use crate::types::{RiskCategory, RiskItem};

/// A validated but not yet identified risk item.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskItemDraft {
    pub category: RiskCategory,
    pub title: String,
    pub description: String,

    /// Identifier proposed by the generator, if any
    pub proposed_id: Option<String>,
}

/// Parse and validate a generated risk item list.
///
/// All-or-nothing: a single malformed element rejects the whole list.
pub fn parse_risk_items(text: &str) -> Result<Vec<RiskItemDraft>, ResponseError> {
    let payload =
        extract_payload(text, PayloadKind::Array).ok_or(ResponseError::NoPayload(PayloadKind::Array))?;
    let value: Value =
        serde_json::from_str(payload).map_err(|e| ResponseError::InvalidJson(e.to_string()))?;

    let elements = match value {
        Value::Array(elements) => elements,
        other => {
            return Err(ResponseError::UnexpectedShape {
                expected: "array",
                found: json_type_name(&other),
            })
        }
    };

    if elements.is_empty() {
        return Err(ResponseError::EmptyItemList);
    }

    elements
        .iter()
        .enumerate()
        .map(|(index, element)| parse_draft(index, element))
        .collect()
}

fn parse_draft(index: usize, element: &Value) -> Result<RiskItemDraft, ResponseError> {
    let Value::Object(fields) = element else {
        return Err(ResponseError::UnexpectedShape {
            expected: "object",
            found: json_type_name(element),
        });
    };

    let category: RiskCategory = required_str(fields, index, &["category"], "category")?.parse()?;
    let title = required_str(fields, index, &["title", "risk_item"], "title")?;
    let description = required_str(fields, index, &["description"], "description")?;
    let proposed_id = fields
        .get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    Ok(RiskItemDraft {
        category,
        title,
        description,
        proposed_id,
    })
}

fn required_str(
    fields: &Map<String, Value>,
    index: usize,
    keys: &[&str],
    field: &'static str,
) -> Result<String, ResponseError> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(ResponseError::MissingField { index, field })
}

/// Turn drafts into risk items with ids of the form `{category}_{n}`.
///
/// `n` counts from 1 within each category, in list order.
pub fn assign_item_ids(drafts: Vec<RiskItemDraft>) -> Vec<RiskItem> {
    let mut counters: BTreeMap<RiskCategory, usize> = BTreeMap::new();

    drafts
        .into_iter()
        .map(|draft| {
            let n = counters.entry(draft.category).or_insert(0);
            *n += 1;
            RiskItem::new(
                format!("{}_{}", draft.category, n),
                draft.category,
                draft.title,
                draft.description,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = r#"
```json
[
  {"category": "bias", "id": "bias_1", "risk_item": "Skewed training data", "description": "Faces of some groups are under-represented."},
  {"category": "privacy", "id": "privacy_1", "title": "Biometric retention", "description": "Face templates are stored indefinitely."},
  {"category": "privacy", "title": "Covert capture", "description": "Subjects are not notified."}
]
```
"#;

    #[test]
    fn test_parse_well_formed_list() {
        let drafts = parse_risk_items(WELL_FORMED).unwrap();
        assert_eq!(drafts.len(), 3);
        assert_eq!(drafts[0].category, RiskCategory::Fairness);
        assert_eq!(drafts[0].title, "Skewed training data");
        assert_eq!(drafts[0].proposed_id.as_deref(), Some("bias_1"));
        assert_eq!(drafts[2].proposed_id, None);
    }

    #[test]
    fn test_ids_are_scoped_per_category() {
        let items = assign_item_ids(parse_risk_items(WELL_FORMED).unwrap());
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["fairness_1", "privacy_1", "privacy_2"]);
        assert!(items.iter().all(|i| i.scores.is_none() && i.severity.is_none()));
    }

    #[test]
    fn test_empty_list_rejected() {
        assert_eq!(parse_risk_items("[]"), Err(ResponseError::EmptyItemList));
    }

    #[test]
    fn test_prose_rejected() {
        assert_eq!(
            parse_risk_items("The service raises several privacy concerns."),
            Err(ResponseError::NoPayload(PayloadKind::Array))
        );
    }

    #[test]
    fn test_missing_description_rejects_whole_list() {
        let text = r#"[
            {"category": "privacy", "title": "A", "description": "ok"},
            {"category": "safety", "title": "B"}
        ]"#;
        assert_eq!(
            parse_risk_items(text),
            Err(ResponseError::MissingField {
                index: 1,
                field: "description"
            })
        );
    }

    #[test]
    fn test_unknown_category_rejected() {
        let text = r#"[{"category": "vibes", "title": "A", "description": "B"}]"#;
        assert!(matches!(
            parse_risk_items(text),
            Err(ResponseError::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_non_object_element_rejected() {
        assert_eq!(
            parse_risk_items(r#"["just a string"]"#),
            Err(ResponseError::UnexpectedShape {
                expected: "object",
                found: "string"
            })
        );
    }

    #[test]
    fn test_truncated_json_rejected() {
        let text = r#"[{"category": "privacy", "title": "A", "description": "B"}, {"category": ]"#;
        assert!(matches!(
            parse_risk_items(text),
            Err(ResponseError::InvalidJson(_))
        ));
    }
}
