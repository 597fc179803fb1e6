//! Improvement-target triage.
//!
//! Picks the items that recommendation work should start from: up to
//! [`MAX_HIGH_RISK`] high/critical items in list order, then up to
//! [`MAX_MEDIUM`] medium items. A run with neither falls back to the first
//! [`FALLBACK_COUNT`] items so there is always something to improve.

use crate::severity::SeverityLevel;
use crate::types::RiskItem;

pub const MAX_HIGH_RISK: usize = 3;
pub const MAX_MEDIUM: usize = 2;
pub const FALLBACK_COUNT: usize = 5;

/// Select improvement targets, preserving item order within each group.
pub fn select_improvement_targets(items: &[RiskItem]) -> Vec<&RiskItem> {
    let mut targets: Vec<&RiskItem> = items
        .iter()
        .filter(|item| item.is_high_risk())
        .take(MAX_HIGH_RISK)
        .collect();

    targets.extend(
        items
            .iter()
            .filter(|item| item.severity == Some(SeverityLevel::Medium))
            .take(MAX_MEDIUM),
    );

    if targets.is_empty() {
        targets = items.iter().take(FALLBACK_COUNT).collect();
    }
    targets
}
