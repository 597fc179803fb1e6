//! Configuration for ethica-runtime.

use chrono::{DateTime, Utc};
use ethica_core::{Metadata, OrganizationRanking, RescorePolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Assessment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentConfig {
    /// Retry budget for the loop check
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Which items a retry pass re-scores
    #[serde(default)]
    pub rescore_policy: RescorePolicy,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub determinism: DeterminismConfig,
}

fn default_max_retries() -> u32 {
    3
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rescore_policy: RescorePolicy::All,
            scoring: ScoringConfig::default(),
            retrieval: RetrievalConfig::default(),
            persistence: PersistenceConfig::default(),
            timeouts: TimeoutConfig::default(),
            generator: GeneratorConfig::default(),
            determinism: DeterminismConfig::default(),
        }
    }
}

impl AssessmentConfig {
    /// Parse a YAML document. JSON is valid YAML, so this covers both.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            let config: Self = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Self::from_yaml(&content)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scoring.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "scoring.concurrency must be at least 1".to_string(),
            ));
        }
        if self.retrieval.k == 0 {
            return Err(ConfigError::Invalid("retrieval.k must be at least 1".to_string()));
        }
        if self.retrieval.collection.trim().is_empty() {
            return Err(ConfigError::Invalid("retrieval.collection is empty".to_string()));
        }
        if self.persistence.collection.trim().is_empty() {
            return Err(ConfigError::Invalid("persistence.collection is empty".to_string()));
        }
        for (name, timeout) in [
            ("generation", self.timeouts.generation),
            ("retrieval", self.timeouts.retrieval),
            ("persistence", self.timeouts.persistence),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::Invalid(format!("timeouts.{} must be non-zero", name)));
            }
        }
        Ok(())
    }

    /// Organization ranking built from `retrieval.organization_priority`.
    pub fn organization_ranking(&self) -> OrganizationRanking {
        OrganizationRanking::new(self.retrieval.organization_priority.clone())
    }
}

/// Scoring pass configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Maximum in-flight scoring calls within one pass
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    1
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

/// Guideline retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_guideline_collection")]
    pub collection: String,

    /// Passages retrieved per topic
    #[serde(default = "default_k")]
    pub k: usize,

    /// Exact-match metadata filter (BTreeMap for deterministic iteration)
    #[serde(default = "default_filter")]
    pub filter: Metadata,

    /// Preferred source organizations, most preferred first
    #[serde(default = "default_organization_priority")]
    pub organization_priority: Vec<String>,

    /// Document whose chunks are included as general guidance
    #[serde(default)]
    pub pinned_document: Option<String>,

    /// Search used to find the general guidance document when none is pinned
    #[serde(default = "default_reference_query")]
    pub reference_query: String,
}

fn default_guideline_collection() -> String {
    "ethics_guidelines".to_string()
}

fn default_k() -> usize {
    3
}

fn default_filter() -> Metadata {
    let mut filter = Metadata::new();
    filter.insert("type".to_string(), JsonValue::from("guideline"));
    filter
}

fn default_reference_query() -> String {
    "UNESCO AI Ethics Recommendations OECD AI Principles".to_string()
}

fn default_organization_priority() -> Vec<String> {
    vec!["UNESCO".to_string(), "OECD".to_string()]
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            collection: default_guideline_collection(),
            k: 3,
            filter: default_filter(),
            organization_priority: default_organization_priority(),
            pinned_document: None,
            reference_query: default_reference_query(),
        }
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_assessment_collection")]
    pub collection: String,
}

fn default_assessment_collection() -> String {
    "risk_assessments".to_string()
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            collection: default_assessment_collection(),
        }
    }
}

/// Per-call timeout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Text-generation call timeout
    #[serde(with = "humantime_serde", default = "default_generation_timeout")]
    pub generation: Duration,

    /// Retrieval call timeout
    #[serde(with = "humantime_serde", default = "default_io_timeout")]
    pub retrieval: Duration,

    /// Persistence call timeout
    #[serde(with = "humantime_serde", default = "default_io_timeout")]
    pub persistence: Duration,
}

fn default_generation_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_io_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            generation: Duration::from_secs(60),
            retrieval: Duration::from_secs(10),
            persistence: Duration::from_secs(10),
        }
    }
}

/// OpenAI-compatible text generation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: 0.2,
        }
    }
}

/// Determinism configuration for reproducible assessments.
///
/// For golden tests and audits, fix the run timestamp:
///
/// ```yaml
/// determinism:
///   assessed_at: "2025-12-20T10:00:00Z"
/// ```
///
/// The timestamp also fixes the persisted record id. When `assessed_at` is
/// None (default), the current system time is used.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeterminismConfig {
    /// Format: RFC 3339 (e.g., "2025-12-20T10:00:00Z")
    #[serde(default)]
    pub assessed_at: Option<DateTime<Utc>>,
}

// Custom serialization for Duration using humantime format
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
