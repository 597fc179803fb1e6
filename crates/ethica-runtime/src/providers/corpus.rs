//! Retrieval over a pre-built JSON passage corpus.
//!
//! The corpus file is a JSON array:
//!
//! ```json
//! [{"collection": "ethics_guidelines", "text": "...", "metadata": {"organization": "UNESCO"}}]
//! ```
//!
//! Passages are ranked by how many distinct query terms they contain.
//! Ties keep corpus order.

use async_trait::async_trait;
use ethica_core::Metadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use super::{metadata_matches, ProviderError, RetrievedPassage, Retriever};

/// Terms shorter than this are ignored when ranking.
const MIN_TERM_LEN: usize = 3;

/// One passage of the corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorpusEntry {
    pub collection: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// In-process retriever over [`CorpusEntry`] values.
#[derive(Debug, Clone, Default)]
pub struct CorpusRetriever {
    entries: Vec<CorpusEntry>,
}

impl CorpusRetriever {
    pub fn new(entries: Vec<CorpusEntry>) -> Self {
        Self { entries }
    }

    pub fn from_json(json: &str) -> Result<Self, ProviderError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|term| term.chars().count() >= MIN_TERM_LEN)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl Retriever for CorpusRetriever {
    async fn search(
        &self,
        collection: &str,
        query: &str,
        k: usize,
        filter: Option<&Metadata>,
    ) -> Result<Vec<RetrievedPassage>, ProviderError> {
        let query_terms = terms(query);

        let mut hits: Vec<(usize, &CorpusEntry)> = self
            .entries
            .iter()
            .filter(|entry| entry.collection == collection)
            .filter(|entry| filter.map_or(true, |f| metadata_matches(&entry.metadata, f)))
            .map(|entry| {
                let overlap = terms(&entry.text).intersection(&query_terms).count();
                (overlap, entry)
            })
            .filter(|(overlap, _)| *overlap > 0)
            .collect();

        // Stable: equal overlap keeps corpus order
        hits.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(hits
            .into_iter()
            .take(k)
            .map(|(_, entry)| RetrievedPassage {
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "corpus"
    }
}
