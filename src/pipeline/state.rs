//! The single authoritative conversation state record.
//!
//! Every handler in the coordinator reads and writes these fields
//! synchronously; there is no second copy anywhere.

use serde::{Deserialize, Serialize};

/// Turn-taking mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Passive: only wake phrases and the stop word are acted on.
    #[default]
    WaitingForWakeWord,
    /// Active: transcripts are aggregated into a command.
    CommandCapture,
    /// A response pipeline call is in flight.
    Processing,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::WaitingForWakeWord => "waiting_for_wake_word",
            Self::CommandCapture => "command_capture",
            Self::Processing => "processing",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub mode: Mode,
    /// User toggle. When false, recognition stays stopped.
    pub voice_mode_enabled: bool,
    /// A recognition session is open (or a start is pending).
    pub is_listening: bool,
    /// Speech output is in flight.
    pub is_speaking: bool,
    /// A response pipeline call is in flight.
    pub is_processing: bool,
    /// Latest display string.
    pub current_transcript: String,
    /// Most recent dispatched command text, used to reject duplicates.
    pub last_processed_utterance: String,
}

impl ConversationState {
    pub fn new(voice_mode_enabled: bool) -> Self {
        Self {
            voice_mode_enabled,
            ..Self::default()
        }
    }

    /// Whether the recognizer may be (re)started right now.
    pub fn may_listen(&self) -> bool {
        self.voice_mode_enabled && !self.is_listening && !self.is_speaking && !self.is_processing
    }
}
