//! Severity classification.
//!
//! Maps a weighted score (5-point scale) to one of four ordered bands:
//!
//! | Band | Weighted score |
//! |------|----------------|
//! | low | `≤ 2.0` |
//! | medium | `(2.0, 3.0]` |
//! | high | `(3.0, 4.0]` |
//! | critical | `> 4.0` |
//!
//! The bands are contiguous and exhaustive: values below 1.0 (missing
//! scores) fall into `low`, values above 5.0 into `critical`, and NaN is
//! treated as missing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::RiskItem;

/// Ordered severity band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SeverityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl SeverityLevel {
    pub const ALL: [SeverityLevel; 4] = [
        SeverityLevel::Low,
        SeverityLevel::Medium,
        SeverityLevel::High,
        SeverityLevel::Critical,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::Low => "low",
            SeverityLevel::Medium => "medium",
            SeverityLevel::High => "high",
            SeverityLevel::Critical => "critical",
        }
    }

    /// High and critical items trigger a re-score.
    pub fn is_high_risk(&self) -> bool {
        matches!(self, SeverityLevel::High | SeverityLevel::Critical)
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the threshold table, for reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SeverityBand {
    pub level: SeverityLevel,

    /// Exclusive lower bound (None for the lowest band)
    pub above: Option<f64>,

    /// Inclusive upper bound (None for the highest band)
    pub up_to: Option<f64>,
}

/// Count of items per band. Always carries all four keys.
pub type SeverityCounts = BTreeMap<SeverityLevel, usize>;

/// Pure weighted-score classifier.
pub struct SeverityClassifier;

impl SeverityClassifier {
    /// Upper bound of the low band.
    pub const LOW_MAX: f64 = 2.0;

    /// Upper bound of the medium band.
    pub const MEDIUM_MAX: f64 = 3.0;

    /// Upper bound of the high band.
    pub const HIGH_MAX: f64 = 4.0;

    /// Classify a weighted score.
    pub fn classify(weighted: f64) -> SeverityLevel {
        if weighted.is_nan() || weighted <= Self::LOW_MAX {
            SeverityLevel::Low
        } else if weighted <= Self::MEDIUM_MAX {
            SeverityLevel::Medium
        } else if weighted <= Self::HIGH_MAX {
            SeverityLevel::High
        } else {
            SeverityLevel::Critical
        }
    }

    /// The threshold table in band order.
    pub fn bands() -> [SeverityBand; 4] {
        [
            SeverityBand {
                level: SeverityLevel::Low,
                above: None,
                up_to: Some(Self::LOW_MAX),
            },
            SeverityBand {
                level: SeverityLevel::Medium,
                above: Some(Self::LOW_MAX),
                up_to: Some(Self::MEDIUM_MAX),
            },
            SeverityBand {
                level: SeverityLevel::High,
                above: Some(Self::MEDIUM_MAX),
                up_to: Some(Self::HIGH_MAX),
            },
            SeverityBand {
                level: SeverityLevel::Critical,
                above: Some(Self::HIGH_MAX),
                up_to: None,
            },
        ]
    }

    /// Count items per band. Unclassified items are not counted.
    pub fn count(items: &[RiskItem]) -> SeverityCounts {
        let mut counts: SeverityCounts = SeverityLevel::ALL.iter().map(|l| (*l, 0)).collect();
        for severity in items.iter().filter_map(|item| item.severity) {
            *counts.entry(severity).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RiskCategory;
    use proptest::prelude::*;

    #[test]
    fn test_band_edges() {
        assert_eq!(SeverityClassifier::classify(1.0), SeverityLevel::Low);
        assert_eq!(SeverityClassifier::classify(2.0), SeverityLevel::Low);
        assert_eq!(SeverityClassifier::classify(2.1), SeverityLevel::Medium);
        assert_eq!(SeverityClassifier::classify(3.0), SeverityLevel::Medium);
        assert_eq!(SeverityClassifier::classify(3.1), SeverityLevel::High);
        assert_eq!(SeverityClassifier::classify(4.0), SeverityLevel::High);
        assert_eq!(SeverityClassifier::classify(4.1), SeverityLevel::Critical);
        assert_eq!(SeverityClassifier::classify(5.0), SeverityLevel::Critical);
    }

    #[test]
    fn test_out_of_domain_values() {
        assert_eq!(SeverityClassifier::classify(0.0), SeverityLevel::Low);
        assert_eq!(SeverityClassifier::classify(f64::NAN), SeverityLevel::Low);
        assert_eq!(SeverityClassifier::classify(7.5), SeverityLevel::Critical);
    }

    #[test]
    fn test_levels_are_ordered() {
        assert!(SeverityLevel::Low < SeverityLevel::Medium);
        assert!(SeverityLevel::High < SeverityLevel::Critical);
        assert!(!SeverityLevel::Medium.is_high_risk());
        assert!(SeverityLevel::High.is_high_risk());
    }

    #[test]
    fn test_count_includes_empty_bands() {
        let mut item = RiskItem::new("privacy_1", RiskCategory::Privacy, "t", "d");
        item.severity = Some(SeverityLevel::High);
        let unscored = RiskItem::new("safety_1", RiskCategory::Safety, "t", "d");

        let counts = SeverityClassifier::count(&[item, unscored]);
        assert_eq!(counts.len(), 4);
        assert_eq!(counts[&SeverityLevel::High], 1);
        assert_eq!(counts[&SeverityLevel::Low], 0);
    }

    proptest! {
        #[test]
        fn prop_bands_partition_the_scale(weighted in 1.0f64..=5.0) {
            let level = SeverityClassifier::classify(weighted);
            let matching: Vec<_> = SeverityClassifier::bands()
                .iter()
                .filter(|band| {
                    band.above.map(|lo| weighted > lo).unwrap_or(true)
                        && band.up_to.map(|hi| weighted <= hi).unwrap_or(true)
                })
                .map(|band| band.level)
                .collect();
            prop_assert_eq!(matching, vec![level]);
        }
    }
}
