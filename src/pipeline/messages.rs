//! Inbound event types delivered to the coordinator.

use crate::animation::AnimationCommand;
use crate::stt::RecognitionEvent;
use crate::tts::SynthesisEvent;
use serde::{Deserialize, Serialize};

/// User-initiated control actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Flip the voice-mode toggle.
    ToggleVoiceMode,
    /// Set the voice-mode toggle explicitly.
    SetVoiceMode { enabled: bool },
    /// Typed input: dispatched as a turn without wake phrase or debounce.
    SubmitText { text: String },
    /// Remove the last conversation entry.
    Undo,
    /// Empty the conversation log.
    Clear,
}

/// Everything the coordinator reacts to, besides its own timers.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Recognition(RecognitionEvent),
    Synthesis(SynthesisEvent),
    Control(ControlCommand),
    Animation(AnimationCommand),
}

impl From<RecognitionEvent> for Event {
    fn from(e: RecognitionEvent) -> Self {
        Self::Recognition(e)
    }
}

impl From<SynthesisEvent> for Event {
    fn from(e: SynthesisEvent) -> Self {
        Self::Synthesis(e)
    }
}

impl From<ControlCommand> for Event {
    fn from(c: ControlCommand) -> Self {
        Self::Control(c)
    }
}

impl From<AnimationCommand> for Event {
    fn from(c: AnimationCommand) -> Self {
        Self::Animation(c)
    }
}
