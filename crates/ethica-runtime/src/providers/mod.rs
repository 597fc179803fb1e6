//! External capabilities consumed by the assessment loop.
//!
//! Three traits, each injected as `Arc<dyn Trait>`:
//! - [`Retriever`]: ranked passage search
//! - [`TextGenerator`]: prompt in, free text out
//! - [`RecordStore`]: write and look up JSON records
//!
//! Concrete adapters live in the submodules.

mod corpus;
mod file_store;
mod memory;
mod openai;

pub use corpus::{CorpusEntry, CorpusRetriever};
pub use file_store::FileStore;
pub use memory::InMemoryStore;
pub use openai::OpenAiGenerator;

use async_trait::async_trait;
use ethica_core::Metadata;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors from capability adapters.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("API key not set: environment variable {0} is empty")]
    MissingApiKey(String),

    #[error("Generator returned no content")]
    EmptyResponse,

    #[error("Invalid record id '{0}'")]
    InvalidId(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Capability unavailable: {0}")]
    Unavailable(String),
}

/// One search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedPassage {
    pub text: String,

    /// Carries a source identifier and, when known, an organization or
    /// numeric priority hint
    #[serde(default)]
    pub metadata: Metadata,
}

/// A record held by a [`RecordStore`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub content: Value,
    #[serde(default)]
    pub metadata: Metadata,
}

impl StoredRecord {
    /// Text of a document chunk: the content itself when it is a string,
    /// else its `text` field.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Value::String(s) => Some(s),
            other => other.get("text").and_then(Value::as_str),
        }
    }
}

/// Ranked text search over a collection.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `k` passages, most relevant first.
    async fn search(
        &self,
        collection: &str,
        query: &str,
        k: usize,
        filter: Option<&Metadata>,
    ) -> Result<Vec<RetrievedPassage>, ProviderError>;

    fn name(&self) -> &str;
}

/// Free-text generation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    fn name(&self) -> &str;
}

/// Record persistence.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Write a record and return its id. A given id replaces any record
    /// already stored under it.
    async fn store(
        &self,
        collection: &str,
        content: &Value,
        metadata: &Metadata,
        id: Option<&str>,
    ) -> Result<String, ProviderError>;

    /// Every record whose metadata matches `filter` exactly.
    async fn fetch_by_metadata(
        &self,
        collection: &str,
        filter: &Metadata,
    ) -> Result<Vec<StoredRecord>, ProviderError>;

    fn name(&self) -> &str;
}

/// Exact-match metadata filter: every filter key must be present with an
/// equal value.
pub fn metadata_matches(metadata: &Metadata, filter: &Metadata) -> bool {
    filter
        .iter()
        .all(|(key, expected)| metadata.get(key) == Some(expected))
}
