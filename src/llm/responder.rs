//! Turn a finalized utterance into a displayable assistant reply.

use super::fallback::ProviderChain;
use super::provider::ChatRequest;
use crate::config::LlmConfig;
use crate::wakeword::normalize;
use tracing::{info, warn};

/// Where a reply came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplySource {
    /// Canned self-identification answer, no network call.
    Identity,
    /// A provider in the chain.
    Provider(String),
    /// Every provider failed; the text explains why.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
}

/// Self-identification shortcut in front of the failover chain.
///
/// [`dispatch`](Self::dispatch) never fails: provider errors become an
/// apologetic reply.
#[derive(Debug)]
pub struct ResponsePipeline {
    config: LlmConfig,
    identity_patterns: Vec<String>,
    chain: ProviderChain,
}

impl ResponsePipeline {
    pub fn new(config: LlmConfig, chain: ProviderChain) -> Self {
        let identity_patterns = config
            .identity_patterns
            .iter()
            .map(|p| normalize(p))
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            config,
            identity_patterns,
            chain,
        }
    }

    pub fn chain(&self) -> &ProviderChain {
        &self.chain
    }

    /// Whether the text asks who the assistant is.
    pub fn is_identity_question(&self, text: &str) -> bool {
        let text = normalize(text);
        !text.is_empty() && self.identity_patterns.iter().any(|p| text.contains(p.as_str()))
    }

    /// Produce the reply for `text`.
    pub async fn dispatch(&self, text: &str) -> Reply {
        if self.is_identity_question(text) {
            info!("answering self-identification question locally");
            return Reply {
                text: self.config.identity_reply.clone(),
                source: ReplySource::Identity,
            };
        }

        let request = ChatRequest::new(&self.config, text);
        match self.chain.complete(&request).await {
            Ok(reply) => Reply {
                text: reply.text,
                source: ReplySource::Provider(reply.provider),
            },
            Err(e) => {
                warn!(code = e.code(), error = %e, "all providers failed");
                Reply {
                    text: format!("{} {}", self.config.fallback_reply, e.user_message()),
                    source: ReplySource::Fallback,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::llm::error::ProviderError;
    use crate::llm::fallback::RetryPolicy;
    use crate::llm::provider::ChatProvider;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingProvider {
        calls: AtomicU32,
        result: Result<String, ProviderError>,
    }

    #[async_trait]
    impl ChatProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }
        async fn complete(&self, _request: &ChatRequest) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn pipeline(result: Result<String, ProviderError>) -> (ResponsePipeline, Arc<CountingProvider>) {
        let provider = Arc::new(CountingProvider {
            calls: AtomicU32::new(0),
            result,
        });
        let chain = ProviderChain::new().with(provider.clone(), RetryPolicy::default());
        (ResponsePipeline::new(LlmConfig::default(), chain), provider)
    }

    #[tokio::test]
    async fn identity_question_skips_network() {
        let (p, provider) = pipeline(Ok("network".into()));
        let reply = p.dispatch("Hey, what is Jarvis?").await;
        assert_eq!(reply.source, ReplySource::Identity);
        assert!(reply.text.starts_with("I am Jarvis"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn other_questions_use_the_chain() {
        let (p, provider) = pipeline(Ok("It is noon.".into()));
        let reply = p.dispatch("what time is it").await;
        assert_eq!(reply.text, "It is noon.");
        assert_eq!(reply.source, ReplySource::Provider("counting".into()));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_becomes_a_readable_reply() {
        let (p, _) = pipeline(Err(ProviderError::KeyInvalid("401".into())));
        let reply = p.dispatch("what time is it").await;
        assert_eq!(reply.source, ReplySource::Fallback);
        assert!(reply.text.starts_with("Sorry, the AI service is currently unavailable."));
        assert!(reply.text.contains("API Key Error"));
        assert!(!reply.text.contains("API_KEY_INVALID"));
    }

    #[tokio::test]
    async fn empty_chain_still_replies() {
        let p = ResponsePipeline::new(LlmConfig::default(), ProviderChain::new());
        let reply = p.dispatch("tell me a joke").await;
        assert_eq!(reply.source, ReplySource::Fallback);
        assert!(reply.text.contains("No AI providers"));
    }
}
