//! Error types for the jarvis orchestrator.

/// Top-level error type for the voice assistant.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Speech-to-text engine error (unavailable, refused to start).
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Text-to-speech engine error.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// AI provider error that escaped the failover chain.
    #[error("provider error: {0}")]
    Provider(String),

    /// Turn-taking coordination error.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AssistantError>;
