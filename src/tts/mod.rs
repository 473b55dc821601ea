//! Text-to-speech: engine trait, voice ranking, and the output controller.

pub mod output;
pub mod voice;

pub use output::{SpeakOutcome, SpeechOutput, SpeechUpdate, UNLOCK_NOTICE};
pub use voice::{Voice, select_voice};

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// A single request handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    /// Controller-assigned id; echoed back in [`SynthesisEvent`]s.
    pub id: u64,
    pub text: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    /// Voice name, or `None` for the engine default.
    pub voice: Option<String>,
}

/// Why the engine gave up on an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SynthesisErrorKind {
    /// The requested voice is not installed or cannot be loaded.
    VoiceUnavailable,
    /// The engine failed while rendering.
    SynthesisFailed,
    /// The platform blocks audio output until the user interacts.
    NotAllowed,
    /// Canceled before or during playback.
    Interrupted,
    /// Anything else the engine reports.
    #[serde(other)]
    Other,
}

impl SynthesisErrorKind {
    /// Whether a second attempt with the default voice is worthwhile.
    pub fn is_voice_failure(self) -> bool {
        matches!(self, Self::VoiceUnavailable | Self::SynthesisFailed)
    }
}

/// Lifecycle events reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SynthesisEvent {
    Start { id: u64 },
    End { id: u64 },
    Error { id: u64, kind: SynthesisErrorKind },
    /// The installed voice list changed. An empty list means "ask the engine".
    VoicesChanged {
        #[serde(default)]
        voices: Vec<Voice>,
    },
}

/// Control surface of an external text-to-speech engine.
pub trait SynthesisEngine: Send {
    /// Whether the capability exists on this host at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Begin speaking. Completion is reported through [`SynthesisEvent`]s.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the request outright.
    fn speak(&mut self, utterance: &Utterance) -> Result<()>;

    /// Stop any current output. Must be a no-op when idle.
    fn cancel(&mut self);

    /// Whether the engine itself reports being mid-utterance.
    fn is_speaking(&self) -> bool {
        false
    }

    /// Currently installed voices. May be empty until voices load.
    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn error_kind_uses_engine_spelling() {
        let kind: SynthesisErrorKind = serde_json::from_str("\"not-allowed\"").unwrap();
        assert_eq!(kind, SynthesisErrorKind::NotAllowed);
        let kind: SynthesisErrorKind = serde_json::from_str("\"audio-busy\"").unwrap();
        assert_eq!(kind, SynthesisErrorKind::Other);
    }

    #[test]
    fn only_voice_failures_are_retried() {
        assert!(SynthesisErrorKind::VoiceUnavailable.is_voice_failure());
        assert!(SynthesisErrorKind::SynthesisFailed.is_voice_failure());
        assert!(!SynthesisErrorKind::NotAllowed.is_voice_failure());
        assert!(!SynthesisErrorKind::Interrupted.is_voice_failure());
    }

    #[test]
    fn voices_changed_without_list_parses() {
        let event: SynthesisEvent = serde_json::from_str(r#"{"type":"voices_changed"}"#).unwrap();
        assert_eq!(event, SynthesisEvent::VoicesChanged { voices: vec![] });
    }
}
