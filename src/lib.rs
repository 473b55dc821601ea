//! Jarvis: a voice turn-taking orchestrator.
//!
//! The crate sits between a speech recognizer, a speech synthesizer, and a
//! chain of chat-completion providers, and decides when to listen, when to
//! answer, and when to keep quiet:
//!
//! Recognizer → wake phrase gate → debounced capture → providers → Synthesizer
//!
//! # Architecture
//!
//! - **Wake word**: normalized substring matching plus a stop word
//! - **Aggregation**: a quiet-period debounce collapses partial transcripts
//! - **LLM**: identity shortcut, then provider failover with retry/backoff
//! - **TTS**: voice ranking, retry with the default voice, autoplay handling
//! - **Coordinator**: a single task owning all state, driven by `select!`
//!
//! The speech engines themselves live outside the crate, behind the
//! [`stt::RecognitionEngine`] and [`tts::SynthesisEngine`] traits; the
//! [`host`] module bridges them over newline-delimited JSON.

pub mod animation;
pub mod config;
pub mod conversation;
pub mod error;
pub mod host;
pub mod llm;
pub mod pipeline;
pub mod runtime;
pub mod stt;
pub mod tts;
pub mod wakeword;

pub use config::AssistantConfig;
pub use error::{AssistantError, Result};
pub use pipeline::coordinator::{CoordinatorHandle, TurnCoordinator};
pub use pipeline::state::Mode;
pub use runtime::RuntimeEvent;
