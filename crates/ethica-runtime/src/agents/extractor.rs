//! Risk item extraction.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use ethica_core::{assign_item_ids, parse_risk_items, GuidelineSummary, RiskItem, ServiceDescription};

use super::AgentError;
use crate::prompts::extraction_prompt;
use crate::providers::TextGenerator;
use crate::resilience::{with_timeout, CallKind, UsageTracker};

/// Item count the prompt asks for. Other counts are accepted with a warning.
pub const EXPECTED_ITEM_COUNT: RangeInclusive<usize> = 5..=7;

pub struct RiskItemExtractor {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
    usage: Arc<UsageTracker>,
}

impl RiskItemExtractor {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration, usage: Arc<UsageTracker>) -> Self {
        Self {
            generator,
            timeout,
            usage,
        }
    }

    /// Extract identified risk items from a service description.
    ///
    /// A single generation call; any failure is returned as-is and is fatal
    /// to the run.
    pub async fn extract(
        &self,
        service: &ServiceDescription,
        guidelines: &GuidelineSummary,
    ) -> Result<Vec<RiskItem>, AgentError> {
        if service.summary.trim().is_empty() {
            return Err(AgentError::InvalidInput(format!(
                "service '{}' has an empty summary",
                service.service_name
            )));
        }

        let prompt = extraction_prompt(service, guidelines)?;
        let text = with_timeout(
            &self.usage,
            CallKind::Generation,
            self.timeout,
            self.generator.generate(&prompt),
        )
        .await?;

        let drafts = parse_risk_items(&text).map_err(|e| {
            self.usage.record_malformed();
            AgentError::MalformedResponse(e)
        })?;

        let items = assign_item_ids(drafts);
        tracing::debug!(count = items.len(), "Risk items extracted");
        Ok(items)
    }
}
