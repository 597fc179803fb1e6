//! Core types for ethics risk assessment.
//!
//! These are the data structures shared by every stage of an assessment:
//! the service under review, the risk items extracted from it, and the
//! axis scores attached to each item.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::response::ResponseError;
use crate::severity::SeverityLevel;

/// Free-form metadata attached to retrieved passages and stored records.
///
/// BTreeMap keeps serialized output stable.
pub type Metadata = BTreeMap<String, Value>;

/// The ethical dimensions a risk item can belong to.
///
/// Ordered for deterministic iteration in BTreeMap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Fairness,
    Privacy,
    Transparency,
    Accountability,
    Safety,
}

impl RiskCategory {
    /// Every category, in assessment order.
    pub const ALL: [RiskCategory; 5] = [
        RiskCategory::Fairness,
        RiskCategory::Privacy,
        RiskCategory::Transparency,
        RiskCategory::Accountability,
        RiskCategory::Safety,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Fairness => "fairness",
            RiskCategory::Privacy => "privacy",
            RiskCategory::Transparency => "transparency",
            RiskCategory::Accountability => "accountability",
            RiskCategory::Safety => "safety",
        }
    }

    /// The question a reviewer asks of a service along this dimension.
    pub fn question(&self) -> &'static str {
        match self {
            RiskCategory::Fairness => "Could this service treat people unequally or encode bias?",
            RiskCategory::Privacy => "Does this service expose or over-collect personal data?",
            RiskCategory::Transparency => "Can affected people understand and contest its decisions?",
            RiskCategory::Accountability => "Who answers for this service when it causes harm?",
            RiskCategory::Safety => "Could this service cause physical, psychological or societal harm?",
        }
    }

    /// Search string used to retrieve reference guidance for this category.
    pub fn topic_query(&self) -> String {
        format!("{} related AI ethics guideline", self.as_str())
    }

    /// Instruction substituted when no guideline text exists for this category.
    pub fn fallback_guidance(&self) -> String {
        format!(
            "No reference guideline text is available for {}. Assess the item against \
             generally accepted AI ethics principles for this dimension: {}",
            self.as_str(),
            self.question()
        )
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskCategory {
    type Err = ResponseError;

    /// Accepts the canonical names plus the common synonyms generators use.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fairness" | "bias" | "discrimination" | "equity" => Ok(RiskCategory::Fairness),
            "privacy" | "data protection" => Ok(RiskCategory::Privacy),
            "transparency" | "explainability" | "interpretability" => {
                Ok(RiskCategory::Transparency)
            }
            "accountability" | "responsibility" => Ok(RiskCategory::Accountability),
            "safety" | "security" | "robustness" => Ok(RiskCategory::Safety),
            other => Err(ResponseError::UnknownCategory(other.to_string())),
        }
    }
}

/// A named capability of the service under review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceFeature {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Description of the AI service being assessed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceDescription {
    /// Human-readable service name
    pub service_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,

    /// Application domain (e.g. "video analytics")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Narrative summary that risk items are extracted from
    pub summary: String,

    #[serde(default)]
    pub features: Vec<ServiceFeature>,

    /// Categories the review should emphasise
    #[serde(default)]
    pub priority_areas: Vec<RiskCategory>,
}

impl ServiceDescription {
    /// Create a description with only a name and summary.
    pub fn new(service_name: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            company: None,
            domain: None,
            summary: summary.into(),
            features: Vec::new(),
            priority_areas: Vec::new(),
        }
    }
}

/// Four independent 1-5 ratings for one risk item, plus the model's rationale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AxisScores {
    /// Likelihood the risk materialises (P)
    pub probability: u8,

    /// Impact when it does (S)
    pub severity: u8,

    /// How hard it is to detect, 5 = very hard (D)
    pub detectability: u8,

    /// How hard it is to mitigate, 5 = very hard (M)
    pub mitigation_difficulty: u8,

    pub rationale: String,
}

impl AxisScores {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Build a score set, rejecting any axis outside [1, 5] or an empty rationale.
    pub fn new(
        probability: u8,
        severity: u8,
        detectability: u8,
        mitigation_difficulty: u8,
        rationale: impl Into<String>,
    ) -> Result<Self, ResponseError> {
        let axes = [
            ("P", probability),
            ("S", severity),
            ("D", detectability),
            ("M", mitigation_difficulty),
        ];
        for (axis, value) in axes {
            if !(Self::MIN..=Self::MAX).contains(&value) {
                return Err(ResponseError::AxisOutOfRange {
                    axis,
                    value: value.to_string(),
                });
            }
        }

        let rationale = rationale.into();
        if rationale.trim().is_empty() {
            return Err(ResponseError::EmptyRationale);
        }

        Ok(Self {
            probability,
            severity,
            detectability,
            mitigation_difficulty,
            rationale,
        })
    }
}

/// A candidate ethical concern extracted from a service description.
///
/// Identity fields are fixed at extraction. `scores` is overwritten on
/// every successful scoring pass; `severity` is re-derived from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskItem {
    /// Unique within a run, scoped to the category (e.g. "privacy_2")
    pub id: String,

    pub category: RiskCategory,

    pub title: String,

    pub description: String,

    /// Latest accepted axis scores
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<AxisScores>,

    /// Band derived from the latest accepted scores
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<SeverityLevel>,

    /// Why the most recent scoring attempt was rejected, if it was
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl RiskItem {
    /// Create an unscored item.
    pub fn new(
        id: impl Into<String>,
        category: RiskCategory,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            title: title.into(),
            description: description.into(),
            scores: None,
            severity: None,
            last_error: None,
        }
    }

    /// Whether this item currently sits in the high or critical band.
    pub fn is_high_risk(&self) -> bool {
        self.severity.map(|s| s.is_high_risk()).unwrap_or(false)
    }
}

/// Terminal status of an assessment run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    Completed,
    Failed,
}
