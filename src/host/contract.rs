//! Versioned message envelopes exchanged with an out-of-process host.
//!
//! The host (a browser page, a desktop shell) owns the real speech engines.
//! It reports engine lifecycle and user actions as [`HostMessage`] lines and
//! receives engine requests and runtime events as [`HostOutput`] lines.

use crate::animation::AnimationCommand;
use crate::pipeline::messages::{ControlCommand, Event};
use crate::runtime::RuntimeEvent;
use crate::stt::{RecognitionEvent, RecognitionSegment};
use crate::tts::{SynthesisErrorKind, SynthesisEvent, Voice};
use serde::{Deserialize, Serialize};

/// Contract version carried by every envelope.
pub const EVENT_VERSION: u32 = 1;

/// Inbound message names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageName {
    #[serde(rename = "recognition.start")]
    RecognitionStart,
    #[serde(rename = "recognition.result")]
    RecognitionResult,
    #[serde(rename = "recognition.end")]
    RecognitionEnd,
    #[serde(rename = "recognition.error")]
    RecognitionError,
    #[serde(rename = "synthesis.start")]
    SynthesisStart,
    #[serde(rename = "synthesis.end")]
    SynthesisEnd,
    #[serde(rename = "synthesis.error")]
    SynthesisError,
    #[serde(rename = "synthesis.voices_changed")]
    SynthesisVoicesChanged,
    #[serde(rename = "control.toggle_voice")]
    ControlToggleVoice,
    #[serde(rename = "control.set_voice")]
    ControlSetVoice,
    #[serde(rename = "control.submit_text")]
    ControlSubmitText,
    #[serde(rename = "control.undo")]
    ControlUndo,
    #[serde(rename = "control.clear")]
    ControlClear,
    #[serde(rename = "animation.command")]
    AnimationCommand,
    #[serde(rename = "host.stop")]
    HostStop,
}

impl MessageName {
    /// Render to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RecognitionStart => "recognition.start",
            Self::RecognitionResult => "recognition.result",
            Self::RecognitionEnd => "recognition.end",
            Self::RecognitionError => "recognition.error",
            Self::SynthesisStart => "synthesis.start",
            Self::SynthesisEnd => "synthesis.end",
            Self::SynthesisError => "synthesis.error",
            Self::SynthesisVoicesChanged => "synthesis.voices_changed",
            Self::ControlToggleVoice => "control.toggle_voice",
            Self::ControlSetVoice => "control.set_voice",
            Self::ControlSubmitText => "control.submit_text",
            Self::ControlUndo => "control.undo",
            Self::ControlClear => "control.clear",
            Self::AnimationCommand => "animation.command",
            Self::HostStop => "host.stop",
        }
    }
}

/// Host -> orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostMessage {
    pub v: u32,
    pub name: MessageName,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Deserialize)]
struct ResultPayload {
    #[serde(default)]
    result_index: usize,
    results: Vec<RecognitionSegment>,
}

#[derive(Deserialize)]
struct CodePayload {
    #[serde(default)]
    code: String,
}

#[derive(Deserialize)]
struct IdPayload {
    id: u64,
}

#[derive(Deserialize)]
struct SynthesisErrorPayload {
    id: u64,
    kind: SynthesisErrorKind,
}

#[derive(Deserialize)]
struct VoicesPayload {
    #[serde(default)]
    voices: Vec<Voice>,
}

#[derive(Deserialize)]
struct EnabledPayload {
    enabled: bool,
}

#[derive(Deserialize)]
struct TextPayload {
    text: String,
}

impl HostMessage {
    #[must_use]
    pub fn new(name: MessageName, payload: serde_json::Value) -> Self {
        Self {
            v: EVENT_VERSION,
            name,
            payload,
        }
    }

    /// Check the contract version.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.v != EVENT_VERSION {
            return Err(ContractError::new(
                ContractErrorKind::UnsupportedVersion,
                format!(
                    "unsupported contract version {}; expected {}",
                    self.v, EVENT_VERSION
                ),
            ));
        }
        Ok(())
    }

    /// Translate into a coordinator event. `host.stop` yields `None`.
    pub fn into_event(self) -> Result<Option<Event>, ContractError> {
        self.validate()?;
        let name = self.name;
        let payload = self.payload;
        let event: Event = match name {
            MessageName::RecognitionStart => RecognitionEvent::Start.into(),
            MessageName::RecognitionResult => {
                let p: ResultPayload = parse(name, payload)?;
                RecognitionEvent::Result {
                    result_index: p.result_index,
                    results: p.results,
                }
                .into()
            }
            MessageName::RecognitionEnd => RecognitionEvent::End.into(),
            MessageName::RecognitionError => {
                let p: CodePayload = parse(name, payload)?;
                RecognitionEvent::Error { code: p.code }.into()
            }
            MessageName::SynthesisStart => {
                let p: IdPayload = parse(name, payload)?;
                SynthesisEvent::Start { id: p.id }.into()
            }
            MessageName::SynthesisEnd => {
                let p: IdPayload = parse(name, payload)?;
                SynthesisEvent::End { id: p.id }.into()
            }
            MessageName::SynthesisError => {
                let p: SynthesisErrorPayload = parse(name, payload)?;
                SynthesisEvent::Error {
                    id: p.id,
                    kind: p.kind,
                }
                .into()
            }
            MessageName::SynthesisVoicesChanged => {
                let p: VoicesPayload = parse(name, payload)?;
                SynthesisEvent::VoicesChanged { voices: p.voices }.into()
            }
            MessageName::ControlToggleVoice => ControlCommand::ToggleVoiceMode.into(),
            MessageName::ControlSetVoice => {
                let p: EnabledPayload = parse(name, payload)?;
                ControlCommand::SetVoiceMode { enabled: p.enabled }.into()
            }
            MessageName::ControlSubmitText => {
                let p: TextPayload = parse(name, payload)?;
                ControlCommand::SubmitText { text: p.text }.into()
            }
            MessageName::ControlUndo => ControlCommand::Undo.into(),
            MessageName::ControlClear => ControlCommand::Clear.into(),
            MessageName::AnimationCommand => {
                let cmd: AnimationCommand = parse(name, payload)?;
                cmd.into()
            }
            MessageName::HostStop => return Ok(None),
        };
        Ok(Some(event))
    }
}

fn parse<T: serde::de::DeserializeOwned>(
    name: MessageName,
    payload: serde_json::Value,
) -> Result<T, ContractError> {
    serde_json::from_value(payload).map_err(|e| {
        ContractError::new(
            ContractErrorKind::InvalidPayload,
            format!("invalid payload for {}: {e}", name.as_str()),
        )
    })
}

/// Orchestrator -> host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostOutput {
    pub v: u32,
    pub event_id: String,
    pub event: String,
    pub payload: serde_json::Value,
}

impl HostOutput {
    #[must_use]
    pub fn new(
        event_id: impl Into<String>,
        event: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: EVENT_VERSION,
            event_id: event_id.into(),
            event: event.into(),
            payload,
        }
    }

    /// Wrap a runtime event as `runtime.<kind>`.
    #[must_use]
    pub fn runtime(event_id: impl Into<String>, event: &RuntimeEvent) -> Self {
        let mut payload = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
        let kind = payload
            .as_object_mut()
            .and_then(|o| o.remove("event"))
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| "unknown".to_owned());
        Self::new(event_id, format!("runtime.{kind}"), payload)
    }
}

/// Contract validation error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractErrorKind {
    UnsupportedVersion,
    InvalidPayload,
}

/// Contract validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct ContractError {
    pub kind: ContractErrorKind,
    pub message: String,
}

impl ContractError {
    #[must_use]
    pub fn new(kind: ContractErrorKind, message: String) -> Self {
        Self { kind, message }
    }
}
