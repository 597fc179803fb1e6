//! Agents wrapping each capability call of an assessment.
//!
//! - [`GuidelineSummarizer`]: retrieval per topic, never fails
//! - [`RiskItemExtractor`]: one generation call, all-or-nothing
//! - [`RiskScorer`]: one generation call per item per pass

mod extractor;
mod scorer;
mod summarizer;

pub use extractor::{RiskItemExtractor, EXPECTED_ITEM_COUNT};
pub use scorer::RiskScorer;
pub use summarizer::{GuidelineSummarizer, SummaryOutcome, PINNED_CHUNK_LIMIT};

use std::time::Duration;
use thiserror::Error;

use ethica_core::ResponseError;

use crate::providers::ProviderError;

/// Errors from a single agent call.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("{kind} call timed out after {limit:?}")]
    Timeout { kind: &'static str, limit: Duration },

    #[error("Malformed response: {0}")]
    MalformedResponse(#[from] ResponseError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgentError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, AgentError::Timeout { .. })
    }
}
