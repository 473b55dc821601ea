//! OpenAI-compatible chat completions provider (OpenRouter, OpenAI, local servers).

use super::error::ProviderError;
use super::provider::{ChatProvider, ChatRequest};
use crate::config::ProviderConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// `POST {base_url}/chat/completions` with a bearer credential.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_s.max(1)))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn request_body(&self, request: &ChatRequest) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_text },
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        })
    }
}

/// Pull a human-readable message out of an error body.
///
/// Handles `{"error": {"message": ..}}`, `{"error": ".."}` and plain text.
pub(crate) fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            let error = v.get("error")?;
            error
                .get("message")
                .and_then(|m| m.as_str())
                .or_else(|| error.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let name = self.name();
        let api_key = self.config.resolve_api_key().ok_or_else(|| {
            ProviderError::KeyMissing(format!(
                "{name} API key is not configured (set {})",
                self.config.api_key_env
            ))
        })?;

        debug!(provider = name, model = self.config.model.as_str(), "sending chat completion");
        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| ProviderError::Network(format!("{name} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(
                name,
                status.as_u16(),
                &extract_error_message(&body),
            ));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Api(format!("{name} returned an unreadable body: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::EmptyResponse(format!("{name} returned no choices")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let provider = OpenAiCompatibleProvider::new(ProviderConfig {
            base_url: "http://localhost:8080/v1/".to_owned(),
            ..ProviderConfig::default()
        });
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn body_has_system_and_user_messages() {
        let provider = OpenAiCompatibleProvider::new(ProviderConfig::default());
        let request = ChatRequest::new(&crate::config::LlmConfig::default(), "hello");
        let body = provider.request_body(&request);
        assert_eq!(body["model"], "openai/gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["max_tokens"], 100);
    }

    #[test]
    fn error_message_shapes() {
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"bad key"}}"#),
            "bad key"
        );
        assert_eq!(extract_error_message(r#"{"error":"Model loading"}"#), "Model loading");
        assert_eq!(extract_error_message("  gateway timeout "), "gateway timeout");
    }
}
