//! Guideline summarization.
//!
//! Every topic is retrieved independently and concurrently. A failed or
//! empty retrieval leaves that topic empty; the run continues with the
//! fallback guidance for it.
//!
//! General guidance comes from one reference document: the pinned one when
//! configured, otherwise the `doc_id` of the top hit for
//! `retrieval.reference_query`. Its first chunks are read back from the
//! record store.

use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;

use ethica_core::{
    citation_for, GuidelinePassage, GuidelineSummary, Metadata, OrganizationRanking, RiskCategory,
};

use crate::config::{RetrievalConfig, TimeoutConfig};
use crate::providers::{RecordStore, Retriever};
use crate::resilience::{with_timeout, CallKind, UsageTracker};

/// Chunks of the reference document included as general guidance.
pub const PINNED_CHUNK_LIMIT: usize = 5;

/// Hits considered when looking up the reference document.
const REFERENCE_SEARCH_K: usize = 2;

/// Summary plus the soft failures met while building it.
#[derive(Debug, Clone, Default)]
pub struct SummaryOutcome {
    pub summary: GuidelineSummary,
    pub warnings: Vec<String>,
}

pub struct GuidelineSummarizer {
    retriever: Arc<dyn Retriever>,
    store: Arc<dyn RecordStore>,
    config: RetrievalConfig,
    timeouts: TimeoutConfig,
    ranking: OrganizationRanking,
    usage: Arc<UsageTracker>,
}

impl GuidelineSummarizer {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        store: Arc<dyn RecordStore>,
        config: RetrievalConfig,
        timeouts: TimeoutConfig,
        usage: Arc<UsageTracker>,
    ) -> Self {
        let ranking = OrganizationRanking::new(config.organization_priority.clone());
        Self {
            retriever,
            store,
            config,
            timeouts,
            ranking,
            usage,
        }
    }

    /// Build the per-topic summary. Never fails.
    pub async fn summarize(&self) -> SummaryOutcome {
        let mut outcome = SummaryOutcome::default();

        let (topics, reference) = tokio::join!(
            join_all(RiskCategory::ALL.iter().map(|c| self.retrieve_topic(*c))),
            self.reference_document(),
        );
        for (category, result) in RiskCategory::ALL.into_iter().zip(topics) {
            match result {
                Ok(passages) => {
                    if passages.is_empty() {
                        tracing::info!(category = %category, "No guideline passages, using fallback guidance");
                    }
                    outcome.summary.insert_topic(category, passages);
                }
                Err(e) => {
                    tracing::warn!(category = %category, error = %e, "Guideline retrieval failed");
                    outcome
                        .warnings
                        .push(format!("guideline retrieval for {} failed: {}", category, e));
                    outcome.summary.insert_topic(category, Vec::new());
                }
            }
        }

        let document = match reference {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(error = %e, "Reference guideline lookup failed");
                outcome
                    .warnings
                    .push(format!("reference guideline lookup failed: {}", e));
                None
            }
        };

        if let Some(document) = &document {
            match self.pinned_passages(document).await {
                Ok(passages) => outcome.summary.set_general(passages),
                Err(e) => {
                    tracing::warn!(document = %document, error = %e, "Pinned guideline lookup failed");
                    outcome
                        .warnings
                        .push(format!("pinned guideline {} unavailable: {}", document, e));
                }
            }
        }

        outcome
    }

    async fn retrieve_topic(
        &self,
        category: RiskCategory,
    ) -> Result<Vec<GuidelinePassage>, super::AgentError> {
        let query = category.topic_query();
        let filter = (!self.config.filter.is_empty()).then_some(&self.config.filter);

        let mut hits = with_timeout(
            &self.usage,
            CallKind::Retrieval,
            self.timeouts.retrieval,
            self.retriever
                .search(&self.config.collection, &query, self.config.k, filter),
        )
        .await?;

        hits.truncate(self.config.k);
        self.ranking.sort(&mut hits, |hit| &hit.metadata);

        Ok(hits
            .into_iter()
            .map(|hit| GuidelinePassage {
                citation: citation_for(&hit.metadata),
                rank: self.ranking.rank(&hit.metadata),
                text: hit.text,
            })
            .collect())
    }

    /// Doc id of the general guidance document, if one can be found.
    async fn reference_document(&self) -> Result<Option<String>, super::AgentError> {
        if let Some(document) = &self.config.pinned_document {
            return Ok(Some(document.clone()));
        }

        let filter = (!self.config.filter.is_empty()).then_some(&self.config.filter);
        let hits = with_timeout(
            &self.usage,
            CallKind::Retrieval,
            self.timeouts.retrieval,
            self.retriever.search(
                &self.config.collection,
                &self.config.reference_query,
                REFERENCE_SEARCH_K,
                filter,
            ),
        )
        .await?;

        let document = hits
            .first()
            .and_then(|hit| hit.metadata.get("doc_id"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if document.is_none() {
            tracing::debug!(query = %self.config.reference_query, "No reference guideline document found");
        }
        Ok(document)
    }

    async fn pinned_passages(
        &self,
        document: &str,
    ) -> Result<Vec<GuidelinePassage>, super::AgentError> {
        let mut filter = Metadata::new();
        filter.insert("doc_id".to_string(), Value::from(document));

        let mut chunks = with_timeout(
            &self.usage,
            CallKind::Persistence,
            self.timeouts.persistence,
            self.store.fetch_by_metadata(&self.config.collection, &filter),
        )
        .await?;

        chunks.sort_by_key(|chunk| {
            chunk
                .metadata
                .get("chunk_index")
                .and_then(Value::as_u64)
                .unwrap_or(u64::MAX)
        });

        Ok(chunks
            .iter()
            .filter_map(|chunk| {
                chunk.text().map(|text| GuidelinePassage {
                    citation: citation_for(&chunk.metadata),
                    text: text.to_string(),
                    rank: self.ranking.rank(&chunk.metadata),
                })
            })
            .take(PINNED_CHUNK_LIMIT)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{
        CorpusEntry, CorpusRetriever, InMemoryStore, ProviderError, RetrievedPassage,
    };
    use async_trait::async_trait;
    use serde_json::json;

    struct FailingRetriever;

    #[async_trait]
    impl Retriever for FailingRetriever {
        async fn search(
            &self,
            _collection: &str,
            _query: &str,
            _k: usize,
            _filter: Option<&Metadata>,
        ) -> Result<Vec<RetrievedPassage>, ProviderError> {
            Err(ProviderError::Unavailable("index offline".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn entry(text: &str, organization: &str) -> CorpusEntry {
        let mut metadata = Metadata::new();
        metadata.insert("type".to_string(), json!("guideline"));
        metadata.insert("organization".to_string(), json!(organization));
        CorpusEntry {
            collection: "ethics_guidelines".to_string(),
            text: text.to_string(),
            metadata,
        }
    }

    fn summarizer(retriever: Arc<dyn Retriever>, store: Arc<dyn RecordStore>) -> GuidelineSummarizer {
        GuidelineSummarizer::new(
            retriever,
            store,
            RetrievalConfig::default(),
            TimeoutConfig::default(),
            Arc::new(UsageTracker::new()),
        )
    }

    /// Store `count` chunks of one document, newest index first.
    async fn chunked_store(doc_id: &str, count: u64) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for index in (0..count).rev() {
            let mut metadata = Metadata::new();
            metadata.insert("doc_id".to_string(), json!(doc_id));
            metadata.insert("chunk_index".to_string(), json!(index));
            metadata.insert("organization".to_string(), json!("UNESCO"));
            store
                .store("ethics_guidelines", &json!({"text": format!("chunk {}", index)}), &metadata, None)
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_topics_are_ranked_by_organization() {
        let retriever = CorpusRetriever::new(vec![
            entry("IEEE on privacy guideline", "IEEE"),
            entry("OECD on privacy guideline", "OECD"),
            entry("UNESCO on privacy guideline", "UNESCO"),
        ]);
        let summarizer = summarizer(Arc::new(retriever), Arc::new(InMemoryStore::new()));

        let outcome = summarizer.summarize().await;
        let privacy = outcome.summary.passages(RiskCategory::Privacy);
        let orgs: Vec<_> = privacy.iter().map(|p| p.citation.as_str()).collect();
        assert_eq!(orgs, vec!["UNESCO", "OECD", "IEEE"]);
        assert_eq!(privacy[2].rank, None);
        assert!(outcome.warnings.is_empty());
        // hits carry no doc_id, so there is no general guidance
        assert!(outcome.summary.general().is_empty());
    }

    #[tokio::test]
    async fn test_retrieval_failure_degrades_every_topic() {
        let summarizer = summarizer(Arc::new(FailingRetriever), Arc::new(InMemoryStore::new()));

        let outcome = summarizer.summarize().await;
        assert_eq!(outcome.summary.degraded_topics().len(), 5);
        // five topics plus the reference document lookup
        assert_eq!(outcome.warnings.len(), 6);
        assert!(outcome.summary.general().is_empty());
        assert!(outcome.summary.guidance_for(RiskCategory::Safety).contains("safety"));
    }

    #[tokio::test]
    async fn test_pinned_document_chunks_become_general_guidance() {
        let store = chunked_store("unesco-rec", 7).await;

        let mut config = RetrievalConfig::default();
        config.pinned_document = Some("unesco-rec".to_string());
        let summarizer = GuidelineSummarizer::new(
            Arc::new(CorpusRetriever::default()),
            store,
            config,
            TimeoutConfig::default(),
            Arc::new(UsageTracker::new()),
        );

        let outcome = summarizer.summarize().await;
        let general = outcome.summary.general();
        assert_eq!(general.len(), PINNED_CHUNK_LIMIT);
        assert_eq!(general[0].text, "chunk 0");
        assert_eq!(general[4].text, "chunk 4");
        assert_eq!(general[0].rank, Some(1));
    }

    #[tokio::test]
    async fn test_reference_document_is_discovered_by_search() {
        let store = chunked_store("unesco-rec", 3).await;
        let mut reference = entry("UNESCO Recommendation on the Ethics of AI principles", "UNESCO");
        reference.metadata.insert("doc_id".to_string(), json!("unesco-rec"));
        let retriever = CorpusRetriever::new(vec![
            entry("A privacy guideline without a source document", "IEEE"),
            reference,
        ]);
        let usage = Arc::new(UsageTracker::new());
        let summarizer = GuidelineSummarizer::new(
            Arc::new(retriever),
            store,
            RetrievalConfig::default(),
            TimeoutConfig::default(),
            usage.clone(),
        );

        let outcome = summarizer.summarize().await;
        let general: Vec<_> = outcome.summary.general().iter().map(|p| p.text.as_str()).collect();
        assert_eq!(general, vec!["chunk 0", "chunk 1", "chunk 2"]);
        assert!(outcome.warnings.is_empty());

        let calls = usage.get_usage();
        assert_eq!(calls.retrieval_calls, 6);
        assert_eq!(calls.persistence_calls, 1);
    }

    #[tokio::test]
    async fn test_pinned_document_skips_reference_search() {
        let usage = Arc::new(UsageTracker::new());
        let mut config = RetrievalConfig::default();
        config.pinned_document = Some("unesco-rec".to_string());
        let summarizer = GuidelineSummarizer::new(
            Arc::new(CorpusRetriever::default()),
            chunked_store("unesco-rec", 1).await,
            config,
            TimeoutConfig::default(),
            usage.clone(),
        );

        let outcome = summarizer.summarize().await;
        assert_eq!(outcome.summary.general().len(), 1);
        assert_eq!(usage.get_usage().retrieval_calls, 5);
    }
}
