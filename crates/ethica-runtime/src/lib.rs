//! # ethica-runtime
//!
//! Async assessment loop for ethica.
//!
//! The runtime wires the pure logic of `ethica-core` to three injected
//! capabilities: a [`Retriever`](providers::Retriever) for reference
//! guidelines, a [`TextGenerator`](providers::TextGenerator) for extraction
//! and scoring, and a [`RecordStore`](providers::RecordStore) for finalized
//! runs.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ethica_runtime::{AssessmentOrchestratorBuilder, providers::*};
//!
//! let orchestrator = AssessmentOrchestratorBuilder::new()
//!     .generator(Arc::new(OpenAiGenerator::from_config(&config.generator)?))
//!     .retriever(Arc::new(CorpusRetriever::from_file("guidelines.json")?))
//!     .store(Arc::new(FileStore::new("./runs")))
//!     .config(config)
//!     .build()?;
//!
//! let report = orchestrator.assess_report(&service).await;
//! ```

pub mod agents;
pub mod config;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod resilience;

pub use agents::AgentError;
pub use config::{AssessmentConfig, ConfigError};
pub use orchestrator::{
    list_assessments, AssessmentError, AssessmentOrchestrator, AssessmentOrchestratorBuilder,
    StoredAssessment,
};
pub use providers::ProviderError;
pub use resilience::UsageTracker;
