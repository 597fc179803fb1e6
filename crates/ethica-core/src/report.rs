//! Assessment reports and the persisted record.
//!
//! An [`AssessmentReport`] is what every run returns, including failed
//! ones. Callers distinguish three outcomes:
//!
//! - completed cleanly: [`AssessmentReport::is_clean`]
//! - completed with warnings: [`AssessmentReport::has_warnings`]
//! - failed outright: [`AssessmentReport::is_failed`]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::ScoreAggregator;
use crate::severity::{SeverityClassifier, SeverityCounts, SeverityLevel};
use crate::types::{AssessmentStatus, RiskItem};

/// A risk item together with its derived scores.
///
/// `basic` and `weighted` are computed from `item.scores` when the view is
/// built; they are never read back from storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: RiskItem,

    pub basic_score: u32,

    pub weighted_score: f64,
}

impl ScoredItem {
    pub fn from_item(item: &RiskItem) -> Self {
        let score = ScoreAggregator::aggregate(item.scores.as_ref());
        Self {
            item: item.clone(),
            basic_score: score.basic,
            weighted_score: score.weighted,
        }
    }

    /// Severity band, falling back to the missing-input band.
    pub fn severity(&self) -> SeverityLevel {
        self.item
            .severity
            .unwrap_or_else(|| SeverityClassifier::classify(self.weighted_score))
    }
}

/// Capability call accounting for one run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallUsage {
    pub generation_calls: u32,
    pub retrieval_calls: u32,
    pub persistence_calls: u32,

    /// Calls abandoned after their deadline
    pub timeouts: u32,

    /// Responses rejected by schema validation
    pub malformed: u32,
}

/// Result of one assessment run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssessmentReport {
    /// Id assigned by the persistence service; absent when it was not written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,

    pub service_name: String,

    pub status: AssessmentStatus,

    pub items: Vec<ScoredItem>,

    pub retry_count: u32,

    /// Scoring passes performed
    pub passes: u32,

    /// High-risk items remained when the retry budget ran out
    pub retry_budget_exhausted: bool,

    pub severity_counts: SeverityCounts,

    /// Ids of items selected for improvement recommendations
    pub improvement_targets: Vec<String>,

    #[serde(default)]
    pub warnings: Vec<String>,

    /// Why the run failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub assessed_at: DateTime<Utc>,

    #[serde(default)]
    pub usage: CallUsage,
}

impl AssessmentReport {
    /// A report for a run that aborted before producing any items.
    pub fn failed(
        service_name: impl Into<String>,
        error: impl Into<String>,
        warnings: Vec<String>,
        assessed_at: DateTime<Utc>,
        usage: CallUsage,
    ) -> Self {
        Self {
            reference_id: None,
            service_name: service_name.into(),
            status: AssessmentStatus::Failed,
            items: Vec::new(),
            retry_count: 0,
            passes: 0,
            retry_budget_exhausted: false,
            severity_counts: SeverityClassifier::count(&[]),
            improvement_targets: Vec::new(),
            warnings,
            error: Some(error.into()),
            assessed_at,
            usage,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == AssessmentStatus::Failed
    }

    /// Completed, but something was degraded along the way.
    pub fn has_warnings(&self) -> bool {
        !self.is_failed() && !self.warnings.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        !self.is_failed() && self.warnings.is_empty()
    }

    pub fn high_risk_items(&self) -> impl Iterator<Item = &ScoredItem> {
        self.items.iter().filter(|i| i.severity().is_high_risk())
    }
}

/// Per-item severity entry in the persisted record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeverityEntry {
    pub item_id: String,
    pub category: String,
    pub risk_item: String,
    pub level: SeverityLevel,
    pub weighted_score: f64,
}

/// Document written to the persistence service when a run finalizes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedAssessment {
    pub service_name: String,
    pub risk_items: Vec<ScoredItem>,
    pub severity_levels: Vec<SeverityEntry>,
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
}

impl PersistedAssessment {
    /// Metadata `type` value used to find assessment records.
    pub const RECORD_TYPE: &'static str = "risk_assessment";

    pub fn new(
        service_name: &str,
        risk_items: Vec<ScoredItem>,
        retry_count: u32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let severity_levels = risk_items
            .iter()
            .map(|scored| SeverityEntry {
                item_id: scored.item.id.clone(),
                category: scored.item.category.to_string(),
                risk_item: scored.item.title.clone(),
                level: scored.severity(),
                weighted_score: scored.weighted_score,
            })
            .collect();

        Self {
            service_name: service_name.to_string(),
            risk_items,
            severity_levels,
            retry_count,
            timestamp,
        }
    }

    /// Metadata stored alongside the record.
    pub fn metadata(&self) -> crate::types::Metadata {
        let mut metadata = crate::types::Metadata::new();
        metadata.insert("type".into(), Self::RECORD_TYPE.into());
        metadata.insert("service_name".into(), self.service_name.clone().into());
        metadata.insert("timestamp".into(), self.timestamp.to_rfc3339().into());
        metadata.insert("retry_count".into(), self.retry_count.into());
        metadata
    }
}
