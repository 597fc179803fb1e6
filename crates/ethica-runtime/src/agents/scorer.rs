//! Per-item axis scoring.

use std::sync::Arc;
use std::time::Duration;

use ethica_core::{parse_axis_scores, AxisScores, RiskItem};

use super::AgentError;
use crate::prompts::scoring_prompt;
use crate::providers::TextGenerator;
use crate::resilience::{with_timeout, CallKind, UsageTracker};

pub struct RiskScorer {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
    usage: Arc<UsageTracker>,
}

impl RiskScorer {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration, usage: Arc<UsageTracker>) -> Self {
        Self {
            generator,
            timeout,
            usage,
        }
    }

    /// Score one item against its category guidance.
    ///
    /// Every error is recoverable: the caller keeps the item's previous
    /// scores.
    pub async fn score(&self, item: &RiskItem, guidance: &str) -> Result<AxisScores, AgentError> {
        let prompt = scoring_prompt(item, guidance);
        let text = with_timeout(
            &self.usage,
            CallKind::Generation,
            self.timeout,
            self.generator.generate(&prompt),
        )
        .await?;

        parse_axis_scores(&text).map_err(|e| {
            self.usage.record_malformed();
            AgentError::MalformedResponse(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderError;
    use async_trait::async_trait;
    use ethica_core::{ResponseError, RiskCategory};

    /// Echoes back whether the guidance reached the prompt.
    struct GuidanceEcho;

    #[async_trait]
    impl TextGenerator for GuidanceEcho {
        async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
            if prompt.contains("Respect privacy.") {
                Ok(r#"{"P": 4, "S": 4, "D": 3, "M": 3, "rationale": "guided"}"#.to_string())
            } else {
                Ok(r#"{"P": 4, "S": 4, "D": 3, "rationale": "missing M"}"#.to_string())
            }
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn item() -> RiskItem {
        RiskItem::new("privacy_1", RiskCategory::Privacy, "Retention", "Kept forever.")
    }

    #[tokio::test]
    async fn test_score_uses_guidance() {
        let scorer = RiskScorer::new(Arc::new(GuidanceEcho), Duration::from_secs(1), Arc::new(UsageTracker::new()));
        let scores = scorer.score(&item(), "Respect privacy.").await.unwrap();
        assert_eq!(scores.probability, 4);
        assert_eq!(scores.rationale, "guided");
    }

    #[tokio::test]
    async fn test_missing_axis_is_malformed() {
        let usage = Arc::new(UsageTracker::new());
        let scorer = RiskScorer::new(Arc::new(GuidanceEcho), Duration::from_secs(1), usage.clone());
        let err = scorer.score(&item(), "other guidance").await.unwrap_err();

        assert!(matches!(
            err,
            AgentError::MalformedResponse(ResponseError::MissingAxis("M"))
        ));
        assert_eq!(usage.get_usage().malformed, 1);
    }
}
