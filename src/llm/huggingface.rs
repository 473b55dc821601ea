//! Hugging Face inference API provider.
//!
//! The inference endpoint takes a single prompt string and returns a list
//! of generations: `[{"generated_text": ".."}]`.

use super::error::ProviderError;
use super::openai::extract_error_message;
use super::provider::{ChatProvider, ChatRequest};
use crate::config::ProviderConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HuggingFaceProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct Generation {
    generated_text: Option<String>,
}

impl HuggingFaceProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_s.max(1)))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn request_body(&self, request: &ChatRequest) -> serde_json::Value {
        serde_json::json!({
            "inputs": format!("{}\n\nUser: {}\nAssistant:", request.system_prompt, request.user_text),
            "parameters": {
                "max_new_tokens": request.max_tokens,
                "temperature": request.temperature,
                "return_full_text": false,
            },
        })
    }
}

#[async_trait]
impl ChatProvider for HuggingFaceProvider {
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

        debug!(provider = name, model = self.config.model.as_str(), "sending inference request");
        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {api_key}"))
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

        let generations: Vec<Generation> = response
            .json()
            .await
            .map_err(|e| ProviderError::Api(format!("{name} returned an unreadable body: {e}")))?;

        generations
            .into_iter()
            .next()
            .and_then(|g| g.generated_text)
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::EmptyResponse(format!("{name} returned no generations")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_includes_model_path() {
        let provider = HuggingFaceProvider::new(ProviderConfig::hugging_face());
        assert_eq!(
            provider.endpoint(),
            "https://api-inference.huggingface.co/models/meta-llama/Llama-2-7b-chat-hf"
        );
    }

    #[test]
    fn body_uses_inference_parameters() {
        let provider = HuggingFaceProvider::new(ProviderConfig::hugging_face());
        let request = ChatRequest::new(&crate::config::LlmConfig::default(), "hi there");
        let body = provider.request_body(&request);
        assert!(body["inputs"].as_str().unwrap_or_default().contains("User: hi there"));
        assert_eq!(body["parameters"]["max_new_tokens"], 100);
    }
}
