//! Speech output controller.
//!
//! Owns the synthesis engine on behalf of the coordinator. At most one
//! utterance is ever in flight; a second `speak` while one is active is
//! refused, never queued.

use super::{SynthesisEngine, SynthesisErrorKind, SynthesisEvent, Utterance, Voice, select_voice};
use crate::config::SpeechOutputConfig;
use tracing::{debug, info, warn};

/// Assistant message surfaced once when the platform blocks audio output.
pub const UNLOCK_NOTICE: &str = "Speech synthesis is blocked. Please interact with the page \
                                 first (click anywhere) to enable voice responses.";

/// Result of a [`SpeechOutput::speak`] request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Handed to the engine under this id.
    Queued(u64),
    /// Another utterance is in flight.
    Busy,
    /// No engine, or the engine rejected the request.
    Unavailable,
}

/// What a [`SynthesisEvent`] meant for the in-flight utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechUpdate {
    /// Audio started.
    Started { id: u64 },
    /// Audio finished normally.
    Finished { id: u64 },
    /// A voice failure triggered one retry with the default voice.
    Retrying { id: u64 },
    /// Terminal failure for this utterance.
    Failed { id: u64, kind: SynthesisErrorKind },
    /// Output blocked by the platform. `notify` is true only the first time.
    Blocked { id: u64, notify: bool },
}

impl SpeechUpdate {
    /// Whether the utterance is over (the speaking phase has ended).
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Started { .. } | Self::Retrying { .. })
    }
}

#[derive(Debug)]
struct InFlight {
    utterance: Utterance,
    retried: bool,
}

pub struct SpeechOutput {
    engine: Box<dyn SynthesisEngine>,
    config: SpeechOutputConfig,
    voices: Vec<Voice>,
    in_flight: Option<InFlight>,
    next_id: u64,
    unlock_notice_sent: bool,
}

impl std::fmt::Debug for SpeechOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechOutput")
            .field("voices", &self.voices.len())
            .field("in_flight", &self.in_flight)
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl SpeechOutput {
    pub fn new(engine: Box<dyn SynthesisEngine>, config: SpeechOutputConfig) -> Self {
        let voices = engine.voices();
        Self {
            engine,
            config,
            voices,
            in_flight: None,
            next_id: 1,
            unlock_notice_sent: false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.engine.is_available()
    }

    /// Whether an utterance is in flight or the engine reports speaking.
    pub fn is_active(&self) -> bool {
        self.in_flight.is_some() || self.engine.is_speaking()
    }

    /// Id of the in-flight utterance, if any.
    pub fn current_id(&self) -> Option<u64> {
        self.in_flight.as_ref().map(|f| f.utterance.id)
    }

    /// Voice the next utterance will use (`None` = engine default).
    pub fn chosen_voice(&self) -> Option<&Voice> {
        select_voice(
            &self.voices,
            &self.config.preferred_voices,
            &self.config.language,
        )
    }

    /// Start speaking `text`.
    pub fn speak(&mut self, text: &str) -> SpeakOutcome {
        if !self.engine.is_available() {
            return SpeakOutcome::Unavailable;
        }
        if self.is_active() {
            debug!("speech request refused, already speaking");
            return SpeakOutcome::Busy;
        }

        let utterance = Utterance {
            id: self.next_id,
            text: text.to_owned(),
            rate: self.config.rate,
            pitch: self.config.pitch,
            volume: self.config.volume,
            voice: self.chosen_voice().map(|v| v.name.clone()),
        };
        self.next_id += 1;

        if let Err(e) = self.engine.speak(&utterance) {
            warn!(error = %e, "speech engine rejected utterance");
            return SpeakOutcome::Unavailable;
        }
        debug!(
            utterance_id = utterance.id,
            voice = utterance.voice.as_deref().unwrap_or("default"),
            "utterance queued"
        );
        let id = utterance.id;
        self.in_flight = Some(InFlight {
            utterance,
            retried: false,
        });
        SpeakOutcome::Queued(id)
    }

    /// Cancel the current utterance. Returns `false` when nothing was playing.
    pub fn cancel(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.engine.cancel();
        if let Some(f) = self.in_flight.take() {
            info!(utterance_id = f.utterance.id, "speech canceled");
        }
        true
    }

    /// Apply an engine event. Events for stale ids are ignored.
    pub fn handle(&mut self, event: SynthesisEvent) -> Option<SpeechUpdate> {
        match event {
            SynthesisEvent::VoicesChanged { voices } => {
                self.voices = if voices.is_empty() {
                    self.engine.voices()
                } else {
                    voices
                };
                debug!(count = self.voices.len(), "voice list refreshed");
                None
            }
            SynthesisEvent::Start { id } => {
                self.current_id()
                    .filter(|c| *c == id)
                    .map(|id| SpeechUpdate::Started { id })
            }
            SynthesisEvent::End { id } => {
                if self.current_id() != Some(id) {
                    return None;
                }
                self.in_flight = None;
                Some(SpeechUpdate::Finished { id })
            }
            SynthesisEvent::Error { id, kind } => {
                if self.current_id() != Some(id) {
                    return None;
                }
                Some(self.on_error(id, kind))
            }
        }
    }

    fn on_error(&mut self, id: u64, kind: SynthesisErrorKind) -> SpeechUpdate {
        if kind == SynthesisErrorKind::NotAllowed {
            self.in_flight = None;
            let notify = !self.unlock_notice_sent;
            self.unlock_notice_sent = true;
            warn!(utterance_id = id, "speech output blocked by platform");
            return SpeechUpdate::Blocked { id, notify };
        }

        if kind.is_voice_failure() {
            if let Some(flight) = self.in_flight.as_mut().filter(|f| !f.retried) {
                flight.retried = true;
                flight.utterance.voice = None;
                match self.engine.speak(&flight.utterance) {
                    Ok(()) => {
                        warn!(utterance_id = id, ?kind, "retrying with default voice");
                        return SpeechUpdate::Retrying { id };
                    }
                    Err(e) => warn!(utterance_id = id, error = %e, "retry rejected"),
                }
            }
        }

        self.in_flight = None;
        warn!(utterance_id = id, ?kind, "speech failed");
        SpeechUpdate::Failed { id, kind }
    }
}
