//! Runtime events emitted by the coordinator for display layers.
//!
//! Kept small and cloneable so the coordinator can broadcast them without
//! waiting on slow subscribers.

use crate::animation::PlayedAnimation;
use crate::conversation::ConversationMessage;
use crate::pipeline::state::Mode;
use serde::{Deserialize, Serialize};

/// What the orchestrator is doing "right now".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RuntimeEvent {
    /// Turn-taking mode transition.
    ModeChanged { mode: Mode },
    /// Recognition session opened or closed.
    Listening { active: bool },
    /// Speech output started or ended.
    Speaking { active: bool },
    /// A response pipeline call started or finished.
    Processing { active: bool },
    /// Voice-mode toggle changed.
    VoiceMode { enabled: bool },
    /// Latest display transcript (raw or annotated).
    Transcript { text: String },
    /// A message was appended to the conversation log.
    MessageAppended { message: ConversationMessage },
    /// The last message was removed by undo.
    MessageRemoved { id: u64 },
    /// The conversation log was emptied.
    ConversationCleared,
    /// An animation was handed to the playback layer.
    Animation { played: PlayedAnimation },
}
