//! OpenAI-compatible chat completions client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ProviderError, TextGenerator};
use crate::config::GeneratorConfig;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Sends each prompt as a single user message to `/chat/completions`.
pub struct OpenAiGenerator {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

impl OpenAiGenerator {
    /// Build a client, reading the API key from `config.api_key_env`.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, ProviderError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ProviderError::MissingApiKey(config.api_key_env.clone()))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(
        config: &GeneratorConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        // Per-call deadlines are enforced by the caller
        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "Sending chat completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key() {
        let config = GeneratorConfig {
            api_key_env: "ETHICA_TEST_UNSET_KEY_VARIABLE".to_string(),
            ..GeneratorConfig::default()
        };
        assert!(matches!(
            OpenAiGenerator::from_config(&config),
            Err(ProviderError::MissingApiKey(var)) if var == "ETHICA_TEST_UNSET_KEY_VARIABLE"
        ));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = GeneratorConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..GeneratorConfig::default()
        };
        let generator = OpenAiGenerator::with_api_key(&config, "key").unwrap();
        assert_eq!(generator.base_url, "http://localhost:8080/v1");
        assert_eq!(generator.name(), "openai");
    }

    #[test]
    fn test_response_shape() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": "[]"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("[]"));
    }
}
