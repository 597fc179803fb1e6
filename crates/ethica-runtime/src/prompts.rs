//! Prompt templates for the extraction and scoring calls.
//!
//! Each template asks for JSON only and spells out the schema that
//! `ethica_core::response` validates.

use ethica_core::{GuidelineSummary, RiskCategory, RiskItem, ServiceDescription};

/// Prompt asking for 5-7 risk items across the category set.
pub fn extraction_prompt(
    service: &ServiceDescription,
    guidelines: &GuidelineSummary,
) -> Result<String, serde_json::Error> {
    let service_json = serde_json::to_string_pretty(service)?;
    let categories = RiskCategory::ALL
        .iter()
        .map(|c| format!("- {}: {}", c, c.question()))
        .collect::<Vec<_>>()
        .join("\n");

    let priority = if service.priority_areas.is_empty() {
        String::new()
    } else {
        let areas: Vec<&str> = service.priority_areas.iter().map(|c| c.as_str()).collect();
        format!("\nGive particular attention to: {}.\n", areas.join(", "))
    };

    Ok(format!(
        r#"You are an AI ethics reviewer. Identify the ethical risks of the service below.

# Service
{service_json}

# Reference guidelines
{guidelines}

# Categories
{categories}
{priority}
Return between 5 and 7 risk items spread across the categories. Respond with a
JSON array only, no prose, where every element has exactly these fields:

[{{"category": "<one of the categories above>", "id": "<category>_<n>", "title": "<short name>", "description": "<how the risk arises in this service>"}}]
"#,
        service_json = service_json,
        guidelines = guidelines.overview(),
        categories = categories,
        priority = priority,
    ))
}

/// Prompt asking for the four axis scores of one item.
pub fn scoring_prompt(item: &RiskItem, guidance: &str) -> String {
    format!(
        r#"You are an AI ethics reviewer scoring one risk item.

# Risk item
Category: {category}
Title: {title}
Description: {description}

# Guidance
{guidance}

Rate the item on four axes, each an integer from 1 to 5:
- P (probability): how likely the risk is to materialise
- S (severity): how serious the impact is when it does
- D (detectability): how hard it is to detect, 5 = very hard
- M (mitigation difficulty): how hard it is to mitigate, 5 = very hard

Respond with a JSON object only:

{{"P": <1-5>, "S": <1-5>, "D": <1-5>, "M": <1-5>, "rationale": "<one paragraph justifying the scores>"}}
"#,
        category = item.category,
        title = item.title,
        description = item.description,
        guidance = guidance,
    )
}
