//! Score aggregation.
//!
//! Combines the four axis scores of a risk item into two derived numbers:
//!
//! | Score | Formula | Range |
//! |-------|---------|-------|
//! | basic | `P × S` | 1–25 |
//! | weighted | `0.4P + 0.4S + 0.1D + 0.1M` | 1.0–5.0 |
//!
//! Both are recomputed from the current [`AxisScores`] on every call and
//! never stored independently of them. The weighted score is accumulated
//! in integer tenths so that band boundaries (2.0, 3.0, 4.0) compare
//! exactly.

use serde::{Deserialize, Serialize};

use crate::severity::{SeverityClassifier, SeverityLevel};
use crate::types::AxisScores;

/// Weight of each axis, in tenths: P, S, D, M.
const AXIS_WEIGHTS_TENTHS: [u32; 4] = [4, 4, 1, 1];

/// Derived scores for one risk item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RiskScore {
    /// Probability times severity
    pub basic: u32,

    /// Weighted average on the 5-point scale
    pub weighted: f64,
}

impl RiskScore {
    /// Score used when an item has no accepted axis scores.
    pub const MISSING: RiskScore = RiskScore {
        basic: 0,
        weighted: 0.0,
    };

    /// The severity band for this score.
    pub fn severity(&self) -> SeverityLevel {
        SeverityClassifier::classify(self.weighted)
    }
}

/// Pure aggregation of axis scores.
pub struct ScoreAggregator;

impl ScoreAggregator {
    /// Aggregate a score set.
    ///
    /// Missing input yields zero scores, which the classifier places in the
    /// lowest band.
    pub fn aggregate(scores: Option<&AxisScores>) -> RiskScore {
        let Some(scores) = scores else {
            return RiskScore::MISSING;
        };

        let p = u32::from(scores.probability);
        let s = u32::from(scores.severity);
        let d = u32::from(scores.detectability);
        let m = u32::from(scores.mitigation_difficulty);

        let tenths: u32 = [p, s, d, m]
            .iter()
            .zip(AXIS_WEIGHTS_TENTHS.iter())
            .map(|(value, weight)| value * weight)
            .sum();

        RiskScore {
            basic: p * s,
            weighted: f64::from(tenths) / 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scores(p: u8, s: u8, d: u8, m: u8) -> AxisScores {
        AxisScores::new(p, s, d, m, "test rationale").unwrap()
    }

    #[test]
    fn test_maximum_probability_and_severity() {
        let score = ScoreAggregator::aggregate(Some(&scores(5, 5, 1, 1)));
        assert_eq!(score.basic, 25);
        assert_eq!(score.weighted, 4.4);
        assert_eq!(score.severity(), SeverityLevel::Critical);
    }

    #[test]
    fn test_minimum_scores() {
        let score = ScoreAggregator::aggregate(Some(&scores(1, 1, 1, 1)));
        assert_eq!(score.basic, 1);
        assert_eq!(score.weighted, 1.0);
        assert_eq!(score.severity(), SeverityLevel::Low);
    }

    #[test]
    fn test_band_boundary_is_exact() {
        // 0.8 + 0.8 + 0.2 + 0.2 would drift above 2.0 in naive float math
        let score = ScoreAggregator::aggregate(Some(&scores(2, 2, 2, 2)));
        assert_eq!(score.weighted, 2.0);
        assert_eq!(score.severity(), SeverityLevel::Low);
    }

    #[test]
    fn test_missing_scores_floor_at_low() {
        let score = ScoreAggregator::aggregate(None);
        assert_eq!(score, RiskScore::MISSING);
        assert_eq!(score.severity(), SeverityLevel::Low);
    }

    proptest! {
        #[test]
        fn prop_scores_stay_in_range(p in 1u8..=5, s in 1u8..=5, d in 1u8..=5, m in 1u8..=5) {
            let score = ScoreAggregator::aggregate(Some(&scores(p, s, d, m)));
            prop_assert!((1..=25).contains(&score.basic));
            prop_assert!(score.weighted >= 1.0 && score.weighted <= 5.0);
        }

        #[test]
        fn prop_aggregation_is_idempotent(p in 1u8..=5, s in 1u8..=5, d in 1u8..=5, m in 1u8..=5) {
            let axis = scores(p, s, d, m);
            let first = ScoreAggregator::aggregate(Some(&axis));
            let second = ScoreAggregator::aggregate(Some(&axis));
            prop_assert_eq!(first, second);
            prop_assert_eq!(first.severity(), second.severity());
        }
    }
}
