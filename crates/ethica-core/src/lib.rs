//! # ethica-core
//!
//! Deterministic domain logic for AI ethics risk assessment.
//!
//! This crate answers, for one AI service description:
//! - Which ethical risks does it carry?
//! - How severe is each one?
//! - Should the items be scored again before the result is accepted?
//!
//! ## Key Guarantees
//!
//! 1. **No I/O**: Capability calls live in `ethica-runtime`
//! 2. **Exact banding**: Weighted scores are computed in tenths
//! 3. **Bounded**: A run performs at most `max_retries + 1` scoring passes
//! 4. **Derived, never cached**: Scores and bands come from the current axis scores
//!
//! ## Example
//!
//! ```rust
//! use ethica_core::{AxisScores, ScoreAggregator, SeverityLevel};
//!
//! let scores = AxisScores::new(5, 5, 1, 1, "biometric data at scale").unwrap();
//! let score = ScoreAggregator::aggregate(Some(&scores));
//!
//! assert_eq!(score.basic, 25);
//! assert_eq!(score.weighted, 4.4);
//! assert_eq!(score.severity(), SeverityLevel::Critical);
//! ```

pub mod guideline;
pub mod report;
pub mod response;
pub mod run;
pub mod scoring;
pub mod severity;
pub mod triage;
pub mod types;

// Re-export main types at crate root
pub use guideline::{citation_for, GuidelinePassage, GuidelineSummary, OrganizationRanking};
pub use report::{AssessmentReport, CallUsage, PersistedAssessment, ScoredItem, SeverityEntry};
pub use response::{
    assign_item_ids, extract_payload, parse_axis_scores, parse_risk_items, PayloadKind,
    ResponseError, RiskItemDraft,
};
pub use run::{AssessmentRun, ItemScoreResult, LoopDecision, RescorePolicy, RunPhase};
pub use scoring::{RiskScore, ScoreAggregator};
pub use severity::{SeverityBand, SeverityClassifier, SeverityCounts, SeverityLevel};
pub use triage::select_improvement_targets;
pub use types::{
    AssessmentStatus, AxisScores, Metadata, RiskCategory, RiskItem, ServiceDescription,
    ServiceFeature,
};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const EXTRACTION: &str = r#"Here are the risks:
```json
[
  {"category": "privacy", "title": "Face templates retained", "description": "Templates kept indefinitely."},
  {"category": "fairness", "title": "Skin tone accuracy gap", "description": "Lower accuracy for darker skin."},
  {"category": "transparency", "title": "No notice", "description": "Subjects are not told."},
  {"category": "accountability", "title": "No appeal", "description": "No human review of matches."},
  {"category": "privacy", "title": "Third-party sharing", "description": "Matches shared with partners."}
]
```"#;

    /// Extraction, scoring and loop check without any capability calls.
    #[test]
    fn test_pure_pipeline_scenario_d() {
        let drafts = parse_risk_items(EXTRACTION).unwrap();
        let items = assign_item_ids(drafts);
        assert_eq!(items[4].id, "privacy_2");

        let at = Utc.with_ymd_and_hms(2025, 12, 20, 0, 0, 0).unwrap();
        let mut run = AssessmentRun::new("Face API", items, 3, at);

        loop {
            let indexes = run.begin_pass(RescorePolicy::All);
            let results = indexes
                .into_iter()
                .map(|i| {
                    let raw = if i == 0 {
                        r#"{"P": 5, "S": 5, "D": 1, "M": 1, "rationale": "retained biometrics"}"#
                    } else {
                        r#"{"P": 3, "S": 3, "D": 2, "M": 2, "rationale": "moderate"}"#
                    };
                    (i, parse_axis_scores(raw).map_err(|e| e.to_string()))
                })
                .collect();
            run.apply_pass(results);

            if run.loop_check() != LoopDecision::Retry {
                break;
            }
        }

        let report = run.finish(None, CallUsage::default());
        assert_eq!(report.status, AssessmentStatus::Completed);
        assert_eq!(report.retry_count, 3);
        assert_eq!(report.passes, 4);
        assert!(report.retry_budget_exhausted);
        assert!(report.is_clean());
        assert_eq!(report.severity_counts[&SeverityLevel::Critical], 1);
        assert_eq!(report.severity_counts[&SeverityLevel::Medium], 4);
        assert_eq!(report.improvement_targets[0], "privacy_1");
    }
}
