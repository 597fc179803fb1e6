//! Assessment loop controller.
//!
//! The orchestrator drives one assessment through an explicit state machine:
//!
//! ```text
//! Summarizing -> Extracting -> Scoring -> LoopCheck -+-> Finalizing -> report
//!                                 ^                  |
//!                                 +----- retry ------+
//! ```
//!
//! It implements:
//! - Concurrent per-item scoring within a pass, bounded by `scoring.concurrency`
//! - A barrier before every loop check: a partial pass is never evaluated
//! - Per-call timeouts, treated like malformed responses
//! - Soft persistence failure: the in-memory result is returned with a warning

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use ethica_core::{
    AssessmentReport, AssessmentRun, CallUsage, GuidelineSummary, ItemScoreResult, LoopDecision,
    Metadata, PersistedAssessment, RiskItem, ServiceDescription,
};

use crate::agents::{
    AgentError, GuidelineSummarizer, RiskItemExtractor, RiskScorer, EXPECTED_ITEM_COUNT,
};
use crate::config::{AssessmentConfig, ConfigError};
use crate::providers::{InMemoryStore, ProviderError, RecordStore, Retriever, TextGenerator};
use crate::resilience::{with_timeout, CallKind, UsageTracker};

/// Errors that abort an assessment or a lookup.
#[derive(Error, Debug)]
pub enum AssessmentError {
    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Risk item extraction failed: {0}")]
    Extraction(#[source] AgentError),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] ProviderError),
}

/// A previously persisted assessment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredAssessment {
    pub id: String,
    pub assessment: PersistedAssessment,
}

/// States of the loop. Each carries exactly what the next step needs.
enum Step {
    Summarizing,
    Extracting(GuidelineSummary),
    Scoring(GuidelineSummary, AssessmentRun),
    LoopCheck(GuidelineSummary, AssessmentRun),
    Finalizing(AssessmentRun),
}

/// The assessment loop controller.
///
/// Usage counters are reset at the start of every assessment, so run one
/// assessment at a time per orchestrator when the counts matter.
pub struct AssessmentOrchestrator {
    store: Arc<dyn RecordStore>,
    config: AssessmentConfig,
    usage: Arc<UsageTracker>,
    summarizer: GuidelineSummarizer,
    extractor: RiskItemExtractor,
    scorer: RiskScorer,
}

impl AssessmentOrchestrator {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        retriever: Arc<dyn Retriever>,
        store: Arc<dyn RecordStore>,
        config: AssessmentConfig,
    ) -> Self {
        let usage = Arc::new(UsageTracker::new());
        let summarizer = GuidelineSummarizer::new(
            retriever,
            store.clone(),
            config.retrieval.clone(),
            config.timeouts.clone(),
            usage.clone(),
        );
        let extractor =
            RiskItemExtractor::new(generator.clone(), config.timeouts.generation, usage.clone());
        let scorer = RiskScorer::new(generator, config.timeouts.generation, usage.clone());

        Self {
            store,
            config,
            usage,
            summarizer,
            extractor,
            scorer,
        }
    }

    pub fn config(&self) -> &AssessmentConfig {
        &self.config
    }

    /// Call counts of the latest assessment.
    pub fn usage(&self) -> CallUsage {
        self.usage.get_usage()
    }

    /// Run an assessment.
    ///
    /// Only extraction failures are returned as errors. Scoring and
    /// persistence failures are reported as warnings on the report.
    pub async fn assess(
        &self,
        service: &ServiceDescription,
    ) -> Result<AssessmentReport, AssessmentError> {
        self.usage.reset();
        let mut warnings = Vec::new();
        self.drive(service, self.assessed_at(), &mut warnings).await
    }

    /// Run an assessment and always return a report, with status `failed`
    /// when the run aborted.
    pub async fn assess_report(&self, service: &ServiceDescription) -> AssessmentReport {
        self.usage.reset();
        let started_at = self.assessed_at();
        let mut warnings = Vec::new();

        match self.drive(service, started_at, &mut warnings).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(service = %service.service_name, error = %e, "Assessment failed");
                AssessmentReport::failed(
                    service.service_name.clone(),
                    e.to_string(),
                    warnings,
                    started_at,
                    self.usage.get_usage(),
                )
            }
        }
    }

    /// Use configured assessed_at for reproducible results.
    fn assessed_at(&self) -> DateTime<Utc> {
        self.config.determinism.assessed_at.unwrap_or_else(Utc::now)
    }

    async fn drive(
        &self,
        service: &ServiceDescription,
        started_at: DateTime<Utc>,
        warnings: &mut Vec<String>,
    ) -> Result<AssessmentReport, AssessmentError> {
        if service.summary.trim().is_empty() {
            return Err(AssessmentError::Extraction(AgentError::InvalidInput(
                "service summary is empty".to_string(),
            )));
        }

        let mut step = Step::Summarizing;
        loop {
            step = match step {
                Step::Summarizing => {
                    tracing::info!(service = %service.service_name, "Summarizing guidelines");
                    let outcome = self.summarizer.summarize().await;
                    warnings.extend(outcome.warnings);
                    Step::Extracting(outcome.summary)
                }

                Step::Extracting(summary) => {
                    let items = self
                        .extractor
                        .extract(service, &summary)
                        .await
                        .map_err(|e| {
                            tracing::warn!(error = %e, "Risk item extraction failed");
                            AssessmentError::Extraction(e)
                        })?;

                    let mut run = AssessmentRun::new(
                        service.service_name.clone(),
                        items,
                        self.config.max_retries,
                        started_at,
                    );
                    let count = run.items().len();
                    if !EXPECTED_ITEM_COUNT.contains(&count) {
                        tracing::warn!(count, "Unexpected number of risk items");
                        warnings.push(format!(
                            "extraction returned {} risk items, expected {} to {}",
                            count,
                            EXPECTED_ITEM_COUNT.start(),
                            EXPECTED_ITEM_COUNT.end()
                        ));
                    }
                    for warning in warnings.drain(..) {
                        run.add_warning(warning);
                    }
                    Step::Scoring(summary, run)
                }

                Step::Scoring(summary, mut run) => {
                    self.score_pass(&summary, &mut run).await;
                    Step::LoopCheck(summary, run)
                }

                Step::LoopCheck(summary, mut run) => match run.loop_check() {
                    LoopDecision::Retry => {
                        tracing::info!(
                            retry_count = run.retry_count(),
                            high_risk = run.high_risk_count(),
                            "High-risk items remain, re-scoring"
                        );
                        Step::Scoring(summary, run)
                    }
                    LoopDecision::Finalize { budget_exhausted } => {
                        if budget_exhausted {
                            tracing::warn!(
                                retry_count = run.retry_count(),
                                high_risk = run.high_risk_count(),
                                "Retry budget exhausted with high-risk items remaining"
                            );
                        }
                        Step::Finalizing(run)
                    }
                },

                Step::Finalizing(run) => return Ok(self.finalize(run).await),
            };
        }
    }

    /// One full scoring pass. Results are applied only after every call
    /// of the pass has finished.
    async fn score_pass(&self, summary: &GuidelineSummary, run: &mut AssessmentRun) {
        let indexes = run.begin_pass(self.config.rescore_policy);
        let pass = run.passes();
        tracing::info!(pass, items = indexes.len(), "Scoring pass");

        let jobs: Vec<(usize, RiskItem, String)> = indexes
            .into_iter()
            .filter_map(|index| {
                run.items()
                    .get(index)
                    .map(|item| (index, item.clone(), summary.guidance_for(item.category)))
            })
            .collect();

        let scorer = &self.scorer;
        let results: Vec<(usize, ItemScoreResult)> = stream::iter(jobs)
            .map(|(index, item, guidance)| async move {
                let result = scorer.score(&item, &guidance).await;
                if let Err(e) = &result {
                    tracing::warn!(
                        pass,
                        item_id = %item.id,
                        category = %item.category,
                        error = %e,
                        "Scoring failed, keeping previous score"
                    );
                }
                (index, result.map_err(|e| e.to_string()))
            })
            .buffered(self.config.scoring.concurrency.max(1))
            .collect()
            .await;

        run.apply_pass(results);
    }

    async fn finalize(&self, mut run: AssessmentRun) -> AssessmentReport {
        run.begin_finalizing();

        let reference_id = match self.persist(&run).await {
            Ok(id) => {
                tracing::info!(reference_id = %id, retry_count = run.retry_count(), "Assessment persisted");
                Some(id)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Persisting assessment failed, returning in-memory result");
                run.add_warning(format!("assessment was not persisted: {}", e));
                None
            }
        };

        run.finish(reference_id, self.usage.get_usage())
    }

    async fn persist(&self, run: &AssessmentRun) -> Result<String, AgentError> {
        let record = run.to_record();
        let content = serde_json::to_value(&record)?;
        let metadata = record.metadata();
        let id = run.record_id();

        with_timeout(
            &self.usage,
            CallKind::Persistence,
            self.config.timeouts.persistence,
            self.store.store(
                &self.config.persistence.collection,
                &content,
                &metadata,
                Some(&id),
            ),
        )
        .await
    }
}

/// Previously persisted assessments of one service, oldest first.
///
/// Records that no longer deserialize are logged and skipped.
pub async fn list_assessments(
    store: &dyn RecordStore,
    collection: &str,
    service_name: &str,
) -> Result<Vec<StoredAssessment>, AssessmentError> {
    let mut filter = Metadata::new();
    filter.insert("type".to_string(), Value::from(PersistedAssessment::RECORD_TYPE));
    filter.insert("service_name".to_string(), Value::from(service_name));

    let mut assessments: Vec<StoredAssessment> = store
        .fetch_by_metadata(collection, &filter)
        .await?
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record.content) {
            Ok(assessment) => Some(StoredAssessment {
                id: record.id,
                assessment,
            }),
            Err(e) => {
                tracing::warn!(id = %record.id, error = %e, "Skipping unreadable assessment record");
                None
            }
        })
        .collect();

    assessments.sort_by(|a, b| a.assessment.timestamp.cmp(&b.assessment.timestamp));
    Ok(assessments)
}

/// Builder for AssessmentOrchestrator.
pub struct AssessmentOrchestratorBuilder {
    generator: Option<Arc<dyn TextGenerator>>,
    retriever: Option<Arc<dyn Retriever>>,
    store: Option<Arc<dyn RecordStore>>,
    config: AssessmentConfig,
}

impl AssessmentOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            generator: None,
            retriever: None,
            store: None,
            config: AssessmentConfig::default(),
        }
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Defaults to an [`InMemoryStore`].
    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: AssessmentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<AssessmentOrchestrator, AssessmentError> {
        let generator = self.generator.ok_or_else(|| {
            AssessmentError::ProviderNotConfigured("No text generator set".to_string())
        })?;
        let retriever = self.retriever.ok_or_else(|| {
            AssessmentError::ProviderNotConfigured("No retriever set".to_string())
        })?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryStore::new()));
        self.config.validate()?;

        Ok(AssessmentOrchestrator::new(
            generator,
            retriever,
            store,
            self.config,
        ))
    }
}

impl Default for AssessmentOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
