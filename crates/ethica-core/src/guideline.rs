//! Reference guideline summaries.
//!
//! A [`GuidelineSummary`] maps each risk category to an ordered list of
//! cited passages. A category with no passages is a valid, degraded input:
//! consumers substitute [`RiskCategory::fallback_guidance`] instead of
//! failing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::types::{Metadata, RiskCategory};

/// A retrieved passage with its source citation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuidelinePassage {
    /// e.g. "UNESCO (Recommendation on the Ethics of AI, p.12)"
    pub citation: String,

    pub text: String,

    /// Organizational priority rank, lower is preferred
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
}

/// Per-topic guideline summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GuidelineSummary {
    topics: BTreeMap<RiskCategory, Vec<GuidelinePassage>>,

    /// Passages that apply to every category (pinned reference document)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    general: Vec<GuidelinePassage>,
}

impl GuidelineSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the passages for one topic, replacing any previous list.
    pub fn insert_topic(&mut self, category: RiskCategory, passages: Vec<GuidelinePassage>) {
        self.topics.insert(category, passages);
    }

    pub fn set_general(&mut self, passages: Vec<GuidelinePassage>) {
        self.general = passages;
    }

    /// Passages for a topic; empty when retrieval found nothing.
    pub fn passages(&self, category: RiskCategory) -> &[GuidelinePassage] {
        self.topics.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn general(&self) -> &[GuidelinePassage] {
        &self.general
    }

    /// Categories with no guideline text.
    pub fn degraded_topics(&self) -> Vec<RiskCategory> {
        RiskCategory::ALL
            .into_iter()
            .filter(|c| self.passages(*c).is_empty())
            .collect()
    }

    /// Guidance text for one category, or the generic fallback sentence.
    pub fn guidance_for(&self, category: RiskCategory) -> String {
        let topic = self.passages(category);
        if topic.is_empty() && self.general.is_empty() {
            return category.fallback_guidance();
        }

        let mut sections = Vec::new();
        if topic.is_empty() {
            sections.push(category.fallback_guidance());
        }
        sections.extend(
            topic
                .iter()
                .chain(self.general.iter())
                .map(|p| format!("Source: {}\nContent: {}", p.citation, p.text)),
        );
        sections.join("\n\n")
    }

    /// Guidance for every category, as one block. Used by extraction.
    pub fn overview(&self) -> String {
        RiskCategory::ALL
            .iter()
            .map(|category| {
                let lines: Vec<String> = self
                    .passages(*category)
                    .iter()
                    .map(|p| format!("- {}: {}", p.citation, p.text))
                    .collect();
                if lines.is_empty() {
                    format!("## {}\n{}", category, category.fallback_guidance())
                } else {
                    format!("## {}\n{}", category, lines.join("\n"))
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Preferred source organizations, most preferred first.
///
/// Rank comes from a numeric `priority` metadata hint when present,
/// otherwise from the position of `organization` in the preference list.
/// Unranked sources sort last.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrganizationRanking {
    preferred: Vec<String>,
}

impl Default for OrganizationRanking {
    fn default() -> Self {
        Self::new(vec!["UNESCO".to_string(), "OECD".to_string()])
    }
}

impl OrganizationRanking {
    pub fn new(preferred: Vec<String>) -> Self {
        Self { preferred }
    }

    /// Rank of a passage, 1 being the most preferred.
    pub fn rank(&self, metadata: &Metadata) -> Option<u32> {
        if let Some(priority) = metadata.get("priority").and_then(Value::as_u64) {
            return u32::try_from(priority).ok();
        }

        let organization = metadata.get("organization").and_then(Value::as_str)?;
        self.preferred
            .iter()
            .position(|p| p.eq_ignore_ascii_case(organization.trim()))
            .map(|i| i as u32 + 1)
    }

    /// Stable sort by rank; relevance order is kept within a rank.
    pub fn sort<T>(&self, entries: &mut [T], metadata_of: impl Fn(&T) -> &Metadata) {
        entries.sort_by_key(|entry| self.rank(metadata_of(entry)).unwrap_or(u32::MAX));
    }
}

/// Citation string for a passage, built from its metadata.
pub fn citation_for(metadata: &Metadata) -> String {
    let get = |key: &str| {
        metadata.get(key).and_then(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    };

    match (get("organization"), get("file_name"), get("page_number")) {
        (Some(org), Some(file), Some(page)) => {
            let file = file.trim_end_matches(".pdf");
            format!("{} ({}, p.{})", org, file, page)
        }
        (Some(org), Some(file), None) => format!("{} ({})", org, file.trim_end_matches(".pdf")),
        (Some(org), None, _) => org,
        _ => get("source").unwrap_or_else(|| "unknown".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(pairs: &[(&str, Value)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_rank_prefers_priority_hint() {
        let ranking = OrganizationRanking::default();
        let m = meta(&[("organization", json!("OECD")), ("priority", json!(1))]);
        assert_eq!(ranking.rank(&m), Some(1));
    }

    #[test]
    fn test_rank_by_organization() {
        let ranking = OrganizationRanking::default();
        assert_eq!(ranking.rank(&meta(&[("organization", json!("unesco"))])), Some(1));
        assert_eq!(ranking.rank(&meta(&[("organization", json!("OECD"))])), Some(2));
        assert_eq!(ranking.rank(&meta(&[("organization", json!("IEEE"))])), None);
        assert_eq!(ranking.rank(&Metadata::new()), None);
    }

    #[test]
    fn test_sort_is_stable_and_puts_unranked_last() {
        let ranking = OrganizationRanking::default();
        let mut entries = vec![
            ("ieee-1", meta(&[("organization", json!("IEEE"))])),
            ("oecd-1", meta(&[("organization", json!("OECD"))])),
            ("unesco-1", meta(&[("organization", json!("UNESCO"))])),
            ("oecd-2", meta(&[("organization", json!("OECD"))])),
            ("none", Metadata::new()),
        ];
        ranking.sort(&mut entries, |(_, m)| m);
        let order: Vec<_> = entries.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec!["unesco-1", "oecd-1", "oecd-2", "ieee-1", "none"]);
    }

    #[test]
    fn test_citation_formats() {
        let full = meta(&[
            ("organization", json!("UNESCO")),
            ("file_name", json!("Recommendation.pdf")),
            ("page_number", json!(12)),
        ]);
        assert_eq!(citation_for(&full), "UNESCO (Recommendation, p.12)");
        assert_eq!(citation_for(&meta(&[("source", json!("internal memo"))])), "internal memo");
        assert_eq!(citation_for(&Metadata::new()), "unknown");
    }

    #[test]
    fn test_guidance_falls_back_when_topic_is_empty() {
        let mut summary = GuidelineSummary::new();
        summary.insert_topic(
            RiskCategory::Privacy,
            vec![GuidelinePassage {
                citation: "OECD".to_string(),
                text: "Respect privacy.".to_string(),
                rank: Some(2),
            }],
        );

        assert!(summary.guidance_for(RiskCategory::Privacy).contains("Respect privacy."));
        assert_eq!(
            summary.guidance_for(RiskCategory::Safety),
            RiskCategory::Safety.fallback_guidance()
        );
        assert_eq!(summary.degraded_topics().len(), 4);
    }

    #[test]
    fn test_general_passages_reach_every_topic() {
        let mut summary = GuidelineSummary::new();
        summary.set_general(vec![GuidelinePassage {
            citation: "UNESCO".to_string(),
            text: "Do no harm.".to_string(),
            rank: Some(1),
        }]);

        let guidance = summary.guidance_for(RiskCategory::Fairness);
        assert!(guidance.contains("Do no harm."));
        assert!(guidance.contains("No reference guideline text"));
    }
}
