//! Configuration types for the voice turn-taking orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Top-level configuration for the assistant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Conversation gate settings (wake phrases, stop word, debounce).
    pub conversation: ConversationConfig,
    /// Speech-to-text session settings.
    pub recognition: RecognitionConfig,
    /// Text-to-speech settings.
    pub speech: SpeechOutputConfig,
    /// Prompt and reply settings shared by every provider.
    pub llm: LlmConfig,
    /// Ordered provider chain. The first entry is tried first.
    pub providers: Vec<ProviderConfig>,
    /// Animation side channel settings.
    pub animation: AnimationConfig,
}

/// Conversation gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Activation phrases (case-insensitive substring match).
    pub wake_phrases: Vec<String>,
    /// Interrupt token. Cancels speech and returns to wake-word mode.
    pub stop_word: String,
    /// Quiet period (ms) after the last transcript before a command is committed.
    pub debounce_ms: u64,
    /// Commands shorter than this (in characters) are ignored.
    pub min_utterance_chars: usize,
    /// Seconds in command capture with no transcript before returning to
    /// wake-word mode.
    ///
    /// Set to 0 to disable.
    pub capture_timeout_s: u32,
    /// Spoken acknowledgement after a wake phrase.
    pub readiness_reply: String,
    /// Startup greeting.
    pub greeting: GreetingConfig,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            wake_phrases: [
                "hey jarvis",
                "hey jarvise",
                "hi jarvis",
                "hello jarvis",
                "jarvis",
                "okay jarvis",
                "ok jarvis",
                "wake up jarvis",
            ]
            .iter()
            .map(|s| (*s).to_owned())
            .collect(),
            stop_word: "stop".to_owned(),
            debounce_ms: 2_500,
            min_utterance_chars: 3,
            capture_timeout_s: 0,
            readiness_reply: "Aha, I'm listening".to_owned(),
            greeting: GreetingConfig::default(),
        }
    }
}

/// Greeting emitted once after startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GreetingConfig {
    /// Whether the greeting is emitted at all.
    pub enabled: bool,
    /// Text appended to the conversation log.
    pub message: String,
    /// Text handed to the speech output.
    pub spoken: String,
    /// Delay after startup before greeting.
    pub delay_ms: u64,
}

impl Default for GreetingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            message: "Welcome.".to_owned(),
            spoken: "Jarvis online. Systems are fully operational and awaiting your command."
                .to_owned(),
            delay_ms: 1_000,
        }
    }
}

/// Speech-to-text session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// BCP-47 language tag requested from the engine.
    pub language: String,
    /// Keep the session open across pauses.
    pub continuous: bool,
    /// Emit partial (interim) transcripts.
    pub interim_results: bool,
    /// Initial value of the voice-mode toggle.
    pub voice_mode_enabled: bool,
    /// Delay before restarting recognition after an engine error.
    pub error_restart_delay_ms: u64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_owned(),
            continuous: true,
            interim_results: true,
            voice_mode_enabled: true,
            error_restart_delay_ms: 1_000,
        }
    }
}

/// Text-to-speech configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechOutputConfig {
    /// Voice names in preference order. Matched case-insensitively as substrings.
    pub preferred_voices: Vec<String>,
    /// Language prefix used when no preferred voice is installed.
    pub language: String,
    /// Speech rate multiplier.
    pub rate: f32,
    /// Speech pitch multiplier.
    pub pitch: f32,
    /// Output volume (0.0–1.0).
    pub volume: f32,
    /// Echo drain window after speech ends, during which recognition stays off.
    pub post_speech_buffer_ms: u64,
}

impl Default for SpeechOutputConfig {
    fn default() -> Self {
        Self {
            preferred_voices: [
                "Alex",
                "Microsoft David Desktop",
                "Microsoft Mark",
                "Microsoft Paul",
                "Microsoft George",
                "Microsoft Michael",
                "Microsoft Ravi",
                "Microsoft Zira Desktop",
                "Bruce",
                "Fred",
                "Daniel",
                "Tom",
                "Paul",
                "Google UK English Male",
                "Google US English Male",
                "Google UK English",
                "Google US English",
                "Samantha",
                "Victoria",
            ]
            .iter()
            .map(|s| (*s).to_owned())
            .collect(),
            language: "en".to_owned(),
            rate: 1.0,
            pitch: 0.8,
            volume: 1.0,
            post_speech_buffer_ms: 2_000,
        }
    }
}

/// Prompt and reply configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// System prompt sent ahead of every user utterance.
    pub system_prompt: String,
    /// Maximum tokens to generate per reply.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Canned answer for self-identification questions (no network call).
    pub identity_reply: String,
    /// Phrases that trigger the canned identity answer.
    pub identity_patterns: Vec<String>,
    /// Lead sentence of the reply when every provider failed.
    pub fallback_reply: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are Jarvis, a helpful AI assistant. Keep your responses concise \
                            and to the point, under 50 words when possible. Be direct and helpful."
                .to_owned(),
            max_tokens: 100,
            temperature: 0.7,
            identity_reply: "I am Jarvis, your AI assistant. I help with tasks, answer \
                             questions, and provide intelligent conversation."
                .to_owned(),
            identity_patterns: [
                "who are you",
                "what are you",
                "tell me about yourself",
                "introduce yourself",
                "what is your name",
                "who is this",
                "what's your name",
                "who am i talking to",
                "what do you do",
                "what is jarvis",
                "who is jarvis",
            ]
            .iter()
            .map(|s| (*s).to_owned())
            .collect(),
            fallback_reply: "Sorry, the AI service is currently unavailable. Please try again later."
                .to_owned(),
        }
    }
}

/// Wire format spoken by a provider endpoint.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// `POST {base_url}/chat/completions` with `{model, messages, max_tokens, temperature}`.
    #[default]
    OpenaiCompatible,
    /// Hugging Face inference endpoint: `POST {base_url}/models/{model}`.
    HuggingFace,
}

/// One entry of the provider chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Display name used in logs and failure messages.
    pub name: String,
    /// Request/response format.
    pub kind: ProviderKind,
    /// API base URL.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Inline credential. Takes precedence over `api_key_env`.
    pub api_key: String,
    /// Environment variable holding the credential.
    pub api_key_env: String,
    /// Total attempts (first call included) before moving to the next provider.
    pub max_attempts: u32,
    /// Base delay for exponential backoff: `backoff_base_ms * 2^attempt`.
    pub backoff_base_ms: u64,
    /// Backoff base used instead of `backoff_base_ms` after an HTTP 429.
    pub rate_limit_backoff_ms: u64,
    /// Per-request timeout.
    pub timeout_s: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "openrouter".to_owned(),
            kind: ProviderKind::OpenaiCompatible,
            base_url: "https://openrouter.ai/api/v1".to_owned(),
            model: "openai/gpt-4o-mini".to_owned(),
            api_key: String::new(),
            api_key_env: "OPENROUTER_API_KEY".to_owned(),
            max_attempts: 3,
            backoff_base_ms: 2_000,
            rate_limit_backoff_ms: 5_000,
            timeout_s: 30,
        }
    }
}

impl ProviderConfig {
    /// Default Hugging Face inference entry.
    pub fn hugging_face() -> Self {
        Self {
            name: "huggingface".to_owned(),
            kind: ProviderKind::HuggingFace,
            base_url: "https://api-inference.huggingface.co".to_owned(),
            model: "meta-llama/Llama-2-7b-chat-hf".to_owned(),
            api_key_env: "HUGGINGFACE_API_KEY".to_owned(),
            ..Self::default()
        }
    }

    /// Resolve the credential from the inline value or the environment.
    ///
    /// Returns `None` when neither is set.
    pub fn resolve_api_key(&self) -> Option<String> {
        if !self.api_key.trim().is_empty() {
            return Some(self.api_key.trim().to_owned());
        }
        if self.api_key_env.is_empty() {
            return None;
        }
        std::env::var(&self.api_key_env)
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }
}

/// Animation side channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Playback duration per animation name, in milliseconds.
    pub durations_ms: BTreeMap<String, u64>,
    /// Duration for names missing from `durations_ms`.
    pub default_duration_ms: u64,
    /// Played after each assistant reply. Empty disables.
    pub reply_animation: String,
    /// Played with the startup greeting. Empty disables.
    pub greeting_animation: String,
    /// Number of executed commands kept for display.
    pub history_len: usize,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        let durations_ms = [
            ("wave", 3_000),
            ("walk", 4_000),
            ("nod", 2_000),
            ("dance", 5_000),
            ("idle", 0),
        ]
        .iter()
        .map(|(name, ms)| ((*name).to_owned(), *ms))
        .collect();
        Self {
            durations_ms,
            default_duration_ms: 3_000,
            reply_animation: "nod".to_owned(),
            greeting_animation: "wave".to_owned(),
            history_len: 10,
        }
    }
}

impl AssistantConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// A file that omits `providers` gets the default chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)
            .map_err(|e| crate::error::AssistantError::Config(e.to_string()))?;
        if config.providers.is_empty() {
            config.providers = default_providers();
        }
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::AssistantError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/jarvis/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("jarvis")
            .join("config.toml")
    }

    /// Defaults with the standard provider chain filled in.
    pub fn with_default_providers() -> Self {
        Self {
            providers: default_providers(),
            ..Self::default()
        }
    }

    /// Reject configurations the coordinator cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::AssistantError::Config`] describing the first problem found.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::AssistantError;

        if self.conversation.wake_phrases.iter().all(|p| p.trim().is_empty()) {
            return Err(AssistantError::Config(
                "at least one wake phrase is required".into(),
            ));
        }
        if self.conversation.stop_word.trim().is_empty() {
            return Err(AssistantError::Config("stop_word cannot be empty".into()));
        }
        if self.conversation.debounce_ms == 0 {
            return Err(AssistantError::Config("debounce_ms must be positive".into()));
        }
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(AssistantError::Config("provider name cannot be empty".into()));
            }
            if provider.max_attempts == 0 {
                return Err(AssistantError::Config(format!(
                    "provider {} must allow at least one attempt",
                    provider.name
                )));
            }
        }
        Ok(())
    }
}

/// The standard chain: OpenRouter first, Hugging Face as backup.
pub fn default_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig::default(), ProviderConfig::hugging_face()]
}
