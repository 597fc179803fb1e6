//! The assessment run aggregate.
//!
//! [`AssessmentRun`] owns the risk item list for one pipeline invocation
//! and carries every piece of loop state: the current phase, the retry
//! counter and the warnings collected along the way. The async driver in
//! the runtime crate performs the capability calls; every state transition
//! happens here, through targeted mutation.
//!
//! ## Loop policy
//!
//! After each full scoring pass, [`AssessmentRun::loop_check`] decides:
//!
//! | Condition | Decision |
//! |-----------|----------|
//! | any item high/critical AND `retry_count < max_retries` | retry (`retry_count += 1`) |
//! | any item high/critical AND budget spent | finalize, budget exhausted |
//! | no item high/critical | finalize |
//!
//! A run therefore performs at most `max_retries + 1` scoring passes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::report::{AssessmentReport, CallUsage, PersistedAssessment, ScoredItem};
use crate::scoring::ScoreAggregator;
use crate::severity::SeverityClassifier;
use crate::triage::select_improvement_targets;
use crate::types::{AssessmentStatus, AxisScores, RiskItem};

/// Phase of the assessment state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RunPhase {
    /// Items extracted, not yet scored
    Extracted,
    /// Scoring, aggregating and classifying every selected item
    Scoring { pass: u32 },
    LoopCheck,
    Finalizing,
    Terminal,
}

/// Outcome of the loop check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoopDecision {
    /// Re-score and check again
    Retry,

    /// Stop scoring
    Finalize {
        /// High-risk items remained when the retry budget ran out
        budget_exhausted: bool,
    },
}

/// Which items a retry pass re-scores.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RescorePolicy {
    /// Every item, on every pass
    #[default]
    All,

    /// Only items currently classified high or critical
    Flagged,
}

/// Result of one scoring call for one item.
pub type ItemScoreResult = Result<AxisScores, String>;

/// The aggregate root of one assessment.
#[derive(Debug, Clone)]
pub struct AssessmentRun {
    service_name: String,
    items: Vec<RiskItem>,
    max_retries: u32,
    retry_count: u32,
    passes: u32,
    phase: RunPhase,
    decision: Option<LoopDecision>,
    warnings: Vec<String>,
    started_at: DateTime<Utc>,
}

impl AssessmentRun {
    /// Start a run over freshly extracted items.
    pub fn new(
        service_name: impl Into<String>,
        items: Vec<RiskItem>,
        max_retries: u32,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            items,
            max_retries,
            retry_count: 0,
            passes: 0,
            phase: RunPhase::Extracted,
            decision: None,
            warnings: Vec::new(),
            started_at,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn items(&self) -> &[RiskItem] {
        &self.items
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Scoring passes started so far.
    pub fn passes(&self) -> u32 {
        self.passes
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Number of items currently high or critical.
    pub fn high_risk_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_high_risk()).count()
    }

    /// Enter a new scoring pass and return the indexes of items to score.
    pub fn begin_pass(&mut self, policy: RescorePolicy) -> Vec<usize> {
        let first_pass = self.passes == 0;
        self.passes += 1;
        self.phase = RunPhase::Scoring { pass: self.passes };

        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| match policy {
                RescorePolicy::All => true,
                RescorePolicy::Flagged => first_pass || item.is_high_risk(),
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// Apply the results of a completed pass, in item order.
    ///
    /// Accepted scores overwrite the previous set and the item is
    /// re-aggregated and re-classified. A rejected score leaves the item's
    /// previous scores and band untouched; an item that has never been
    /// scored is classified from missing input.
    pub fn apply_pass(&mut self, mut results: Vec<(usize, ItemScoreResult)>) {
        results.sort_by_key(|(index, _)| *index);
        let pass = self.passes;

        for (index, result) in results {
            let Some(item) = self.items.get_mut(index) else {
                continue;
            };

            match result {
                Ok(scores) => {
                    item.scores = Some(scores);
                    item.last_error = None;
                    let score = ScoreAggregator::aggregate(item.scores.as_ref());
                    item.severity = Some(SeverityClassifier::classify(score.weighted));
                }
                Err(reason) => {
                    if item.severity.is_none() {
                        let score = ScoreAggregator::aggregate(None);
                        item.severity = Some(score.severity());
                    }
                    self.warnings.push(format!(
                        "pass {}: item {} kept its previous score: {}",
                        pass, item.id, reason
                    ));
                    item.last_error = Some(reason);
                }
            }
        }
    }

    /// Decide whether to re-score or finalize.
    pub fn loop_check(&mut self) -> LoopDecision {
        self.phase = RunPhase::LoopCheck;
        let high_risk = self.high_risk_count() > 0;

        let decision = if high_risk && self.retry_count < self.max_retries {
            self.retry_count += 1;
            LoopDecision::Retry
        } else {
            LoopDecision::Finalize {
                budget_exhausted: high_risk,
            }
        };

        self.decision = Some(decision);
        decision
    }

    /// Whether the last loop check ended with high-risk items and no budget.
    pub fn retry_budget_exhausted(&self) -> bool {
        matches!(
            self.decision,
            Some(LoopDecision::Finalize {
                budget_exhausted: true
            })
        )
    }

    pub fn begin_finalizing(&mut self) {
        self.phase = RunPhase::Finalizing;
    }

    /// Identifier requested from the persistence service.
    ///
    /// `risk_assessment_{slug}_{digest}_{YYYYmmddHHMMSS}`. The digest is
    /// taken over the exact service name, so two services whose slugs
    /// collide still get distinct ids. Re-running one service at the same
    /// `started_at` yields the same id and replaces that service's record.
    pub fn record_id(&self) -> String {
        format!(
            "risk_assessment_{}_{:08x}_{}",
            service_slug(&self.service_name),
            name_digest(&self.service_name),
            self.started_at.format("%Y%m%d%H%M%S")
        )
    }

    /// Items with their derived scores, in list order.
    pub fn scored_items(&self) -> Vec<ScoredItem> {
        self.items.iter().map(ScoredItem::from_item).collect()
    }

    /// The document written by the finalizing phase.
    pub fn to_record(&self) -> PersistedAssessment {
        PersistedAssessment::new(
            &self.service_name,
            self.scored_items(),
            self.retry_count,
            self.started_at,
        )
    }

    /// Close the run and produce its report.
    pub fn finish(mut self, reference_id: Option<String>, usage: CallUsage) -> AssessmentReport {
        self.phase = RunPhase::Terminal;
        let improvement_targets = select_improvement_targets(&self.items)
            .into_iter()
            .map(|item| item.id.clone())
            .collect();

        AssessmentReport {
            reference_id,
            service_name: self.service_name.clone(),
            status: AssessmentStatus::Completed,
            severity_counts: SeverityClassifier::count(&self.items),
            items: self.scored_items(),
            retry_count: self.retry_count,
            passes: self.passes,
            retry_budget_exhausted: self.retry_budget_exhausted(),
            improvement_targets,
            warnings: self.warnings,
            error: None,
            assessed_at: self.started_at,
            usage,
        }
    }
}

/// Lowercase ASCII alphanumerics joined by single underscores.
fn service_slug(name: &str) -> String {
    const MAX_SLUG_LEN: usize = 40;

    let mut slug = String::new();
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.truncate(MAX_SLUG_LEN);
    let slug = slug.trim_end_matches('_');

    if slug.is_empty() {
        "service".to_string()
    } else {
        slug.to_string()
    }
}

/// 32-bit FNV-1a, stable across builds and platforms.
fn name_digest(name: &str) -> u32 {
    name.bytes()
        .fold(0x811c_9dc5, |hash, byte| (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::SeverityLevel;
    use crate::types::RiskCategory;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 20, 10, 0, 0).unwrap()
    }

    fn items(n: usize) -> Vec<RiskItem> {
        (1..=n)
            .map(|i| RiskItem::new(format!("privacy_{}", i), RiskCategory::Privacy, "t", "d"))
            .collect()
    }

    fn medium() -> ItemScoreResult {
        Ok(AxisScores::new(3, 3, 2, 2, "moderate").unwrap())
    }

    fn critical() -> ItemScoreResult {
        Ok(AxisScores::new(5, 5, 1, 1, "severe").unwrap())
    }

    fn score_all(run: &mut AssessmentRun, f: impl Fn(usize) -> ItemScoreResult) {
        let indexes = run.begin_pass(RescorePolicy::All);
        let results = indexes.into_iter().map(|i| (i, f(i))).collect();
        run.apply_pass(results);
    }

    #[test]
    fn test_all_medium_finalizes_without_retry() {
        let mut run = AssessmentRun::new("svc", items(5), 3, fixed_time());
        assert_eq!(run.phase(), RunPhase::Extracted);
        score_all(&mut run, |_| medium());
        assert_eq!(run.phase(), RunPhase::Scoring { pass: 1 });

        assert!(run
            .items()
            .iter()
            .all(|i| i.severity == Some(SeverityLevel::Medium)));
        assert_eq!(
            run.loop_check(),
            LoopDecision::Finalize {
                budget_exhausted: false
            }
        );
        assert_eq!(run.phase(), RunPhase::LoopCheck);
        assert_eq!(run.retry_count(), 0);
        assert!(!run.retry_budget_exhausted());
    }

    #[test]
    fn test_persistent_critical_consumes_whole_budget() {
        let mut run = AssessmentRun::new("svc", items(5), 3, fixed_time());
        let mut decisions = Vec::new();

        loop {
            score_all(&mut run, |i| if i == 2 { critical() } else { medium() });
            let decision = run.loop_check();
            decisions.push(decision);
            if decision != LoopDecision::Retry {
                break;
            }
        }

        assert_eq!(run.retry_count(), 3);
        assert_eq!(run.passes(), 4);
        assert_eq!(decisions.len(), 4);
        assert!(run.retry_budget_exhausted());

        let report = run.finish(None, CallUsage::default());
        assert_eq!(report.status, AssessmentStatus::Completed);
        assert!(report.retry_budget_exhausted);
        assert_eq!(report.severity_counts[&SeverityLevel::Critical], 1);
    }

    #[test]
    fn test_zero_budget_is_single_pass() {
        let mut run = AssessmentRun::new("svc", items(2), 0, fixed_time());
        score_all(&mut run, |_| critical());
        assert_eq!(
            run.loop_check(),
            LoopDecision::Finalize {
                budget_exhausted: true
            }
        );
        assert_eq!(run.retry_count(), 0);
    }

    #[test]
    fn test_rejected_score_keeps_previous() {
        let mut run = AssessmentRun::new("svc", items(2), 3, fixed_time());
        score_all(&mut run, |_| critical());
        score_all(&mut run, |i| {
            if i == 0 {
                Err("axis 'P' missing".to_string())
            } else {
                medium()
            }
        });

        let first = &run.items()[0];
        assert_eq!(first.severity, Some(SeverityLevel::Critical));
        assert_eq!(first.scores.as_ref().unwrap().probability, 5);
        assert_eq!(first.last_error.as_deref(), Some("axis 'P' missing"));
        assert_eq!(run.items()[1].severity, Some(SeverityLevel::Medium));
        assert_eq!(run.warnings().len(), 1);
    }

    #[test]
    fn test_never_scored_item_is_low() {
        let mut run = AssessmentRun::new("svc", items(1), 3, fixed_time());
        score_all(&mut run, |_| Err("timed out".to_string()));

        let item = &run.items()[0];
        assert!(item.scores.is_none());
        assert_eq!(item.severity, Some(SeverityLevel::Low));
    }

    #[test]
    fn test_flagged_policy_rescores_only_high_risk() {
        let mut run = AssessmentRun::new("svc", items(3), 3, fixed_time());
        assert_eq!(run.begin_pass(RescorePolicy::Flagged), vec![0, 1, 2]);
        run.apply_pass(vec![(0, medium()), (1, critical()), (2, medium())]);
        assert_eq!(run.loop_check(), LoopDecision::Retry);

        assert_eq!(run.begin_pass(RescorePolicy::Flagged), vec![1]);
    }

    #[test]
    fn test_results_applied_in_item_order() {
        let mut run = AssessmentRun::new("svc", items(2), 3, fixed_time());
        run.begin_pass(RescorePolicy::All);
        run.apply_pass(vec![
            (1, Err("bad".to_string())),
            (0, Err("worse".to_string())),
        ]);
        assert!(run.warnings()[0].contains("privacy_1"));
        assert!(run.warnings()[1].contains("privacy_2"));
    }

    #[test]
    fn test_record_id_names_service_and_start_time() {
        let run = AssessmentRun::new("Face API", items(1), 3, fixed_time());
        let id = run.record_id();
        assert!(id.starts_with("risk_assessment_face_api_"));
        assert!(id.ends_with("_20251220100000"));
        assert_eq!(id, AssessmentRun::new("Face API", items(2), 0, fixed_time()).record_id());
    }

    #[test]
    fn test_record_id_differs_per_service() {
        let ids: Vec<String> = ["Face API", "Voice API", "face-api", "顔認識"]
            .iter()
            .map(|name| AssessmentRun::new(*name, items(1), 3, fixed_time()).record_id())
            .collect();

        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(ids[3].starts_with("risk_assessment_service_"));
    }

    #[test]
    fn test_service_slug() {
        assert_eq!(service_slug("  Face -- API v2 "), "face_api_v2");
        assert_eq!(service_slug("***"), "service");
        assert_eq!(service_slug(&"a".repeat(60)).len(), 40);
    }

    proptest! {
        #[test]
        fn prop_loop_terminates_within_budget(
            max_retries in 0u32..6,
            item_count in 1usize..8,
            script in prop::collection::vec(any::<bool>(), 1..64),
        ) {
            let mut run = AssessmentRun::new("svc", items(item_count), max_retries, fixed_time());
            let mut pass = 0usize;

            loop {
                prop_assert!(pass <= max_retries as usize, "pass {} exceeds budget", pass);
                score_all(&mut run, |i| {
                    if script[(pass * item_count + i) % script.len()] {
                        critical()
                    } else {
                        medium()
                    }
                });
                pass += 1;
                if run.loop_check() != LoopDecision::Retry {
                    break;
                }
            }

            prop_assert!(run.passes() <= max_retries + 1);
            prop_assert!(run.retry_count() <= max_retries);
            prop_assert_eq!(run.passes(), run.retry_count() + 1);
        }
    }
}
