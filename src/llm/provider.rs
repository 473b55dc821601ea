//! Provider trait shared by every backend in the failover chain.

use super::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One completion request: a system prompt and a single user turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub user_text: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl ChatRequest {
    /// Build a request from the prompt settings.
    pub fn new(config: &crate::config::LlmConfig, user_text: &str) -> Self {
        Self {
            system_prompt: config.system_prompt.clone(),
            user_text: user_text.to_owned(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// A backend that turns a [`ChatRequest`] into reply text.
///
/// Implementations make exactly one attempt per call; retries and
/// failover belong to [`super::ProviderChain`].
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Name used in logs and failure messages.
    fn name(&self) -> &str;

    /// Perform one attempt.
    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError>;
}
