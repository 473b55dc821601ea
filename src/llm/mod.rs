//! Response pipeline: self-identification shortcut and provider failover.
//!
//! Two HTTP backends ship with the crate:
//! - **OpenAI-compatible** chat completions (OpenRouter by default).
//! - **Hugging Face** inference endpoints.
//!
//! Anything else can join the chain by implementing [`ChatProvider`].

pub mod error;
pub mod fallback;
pub mod huggingface;
pub mod openai;
pub mod provider;
pub mod responder;

pub use error::ProviderError;
pub use fallback::{ChainReply, ProviderChain, RetryPolicy};
pub use huggingface::HuggingFaceProvider;
pub use openai::OpenAiCompatibleProvider;
pub use provider::{ChatProvider, ChatRequest};
pub use responder::{Reply, ReplySource, ResponsePipeline};
