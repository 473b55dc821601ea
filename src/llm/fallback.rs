//! Ordered provider failover with per-provider retry.
//!
//! [`ProviderChain`] holds providers in priority order, each paired with a
//! [`RetryPolicy`]. A request walks the chain front to back:
//!
//! - **Retryable errors** (429, 5xx, network): back off
//!   `base * 2^attempt` and try the same provider again, up to
//!   `max_attempts` calls in total, then move on.
//! - **Terminal errors** (401, 403, missing key, empty response): move to
//!   the next provider immediately.
//!
//! The first provider to return text wins; later providers are never called.

use super::error::ProviderError;
use super::huggingface::HuggingFaceProvider;
use super::openai::OpenAiCompatibleProvider;
use super::provider::{ChatProvider, ChatRequest};
use crate::config::{ProviderConfig, ProviderKind};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Retry settings for one chain entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls allowed, first one included.
    pub max_attempts: u32,
    /// Base delay for network and server failures.
    pub backoff_base: Duration,
    /// Base delay after a rate-limit response.
    pub rate_limit_backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(2_000),
            rate_limit_backoff_base: Duration::from_millis(5_000),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            rate_limit_backoff_base: Duration::from_millis(config.rate_limit_backoff_ms),
        }
    }

    /// Delay before retrying after the zero-based `attempt` failed with `error`.
    pub fn delay(&self, attempt: u32, error: &ProviderError) -> Duration {
        let base = match error {
            ProviderError::RateLimited(_) => self.rate_limit_backoff_base,
            _ => self.backoff_base,
        };
        base.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Text produced by the chain and the provider that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReply {
    pub provider: String,
    pub text: String,
}

struct ChainEntry {
    provider: Arc<dyn ChatProvider>,
    policy: RetryPolicy,
}

/// Ordered failover chain.
#[derive(Default)]
pub struct ProviderChain {
    entries: Vec<ChainEntry>,
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.provider.name()))
            .finish()
    }
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider with its retry policy. Order of calls is priority order.
    pub fn push(&mut self, provider: Arc<dyn ChatProvider>, policy: RetryPolicy) {
        self.entries.push(ChainEntry { provider, policy });
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, provider: Arc<dyn ChatProvider>, policy: RetryPolicy) -> Self {
        self.push(provider, policy);
        self
    }

    /// Build HTTP providers from configuration, preserving order.
    pub fn from_config(providers: &[ProviderConfig]) -> Self {
        let mut chain = Self::new();
        for config in providers {
            let provider: Arc<dyn ChatProvider> = match config.kind {
                ProviderKind::OpenaiCompatible => {
                    Arc::new(OpenAiCompatibleProvider::new(config.clone()))
                }
                ProviderKind::HuggingFace => Arc::new(HuggingFaceProvider::new(config.clone())),
            };
            chain.push(provider, RetryPolicy::from_config(config));
        }
        chain
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Provider names in priority order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.provider.name().to_owned())
            .collect()
    }

    /// Run the request through the chain.
    ///
    /// # Errors
    ///
    /// Returns the last provider's error when every provider failed, or
    /// [`ProviderError::NoProviders`] for an empty chain.
    pub async fn complete(&self, request: &ChatRequest) -> Result<ChainReply, ProviderError> {
        let mut last_error = ProviderError::NoProviders("provider chain is empty".into());

        for entry in &self.entries {
            let name = entry.provider.name();
            match Self::run_entry(entry, request).await {
                Ok(text) => {
                    info!(provider = name, "provider request succeeded");
                    return Ok(ChainReply {
                        provider: name.to_owned(),
                        text,
                    });
                }
                Err(e) => {
                    warn!(provider = name, code = e.code(), "provider exhausted, falling through");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    async fn run_entry(entry: &ChainEntry, request: &ChatRequest) -> Result<String, ProviderError> {
        let name = entry.provider.name();
        let max = entry.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match entry.provider.complete(request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt + 1 < max => {
                    let delay = entry.policy.delay(attempt, &e);
                    warn!(
                        provider = name,
                        attempt = attempt + 1,
                        max,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "provider transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(provider = name, attempt = attempt + 1, error = %e, "provider failed");
                    return Err(e);
                }
            }
        }
    }
}
