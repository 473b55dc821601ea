//! Speech-to-text session adapter.
//!
//! The recognizer itself is an external collaborator (a browser engine, a
//! native service, a remote worker). This module defines the small trait the
//! coordinator drives it through, and [`TranscriptStream`], which turns the
//! engine's raw result lists into a uniform `{text, is_final}` sequence.
//!
//! Sessions never restart on their own. When the engine reports the end of a
//! session the adapter just says so; the coordinator alone decides whether
//! and when to listen again.

use crate::config::RecognitionConfig;
use crate::error::{AssistantError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Options passed to the engine when a session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// BCP-47 language tag.
    pub language: String,
    /// Keep the session open across pauses.
    pub continuous: bool,
    /// Emit partial results.
    pub interim_results: bool,
}

impl From<&RecognitionConfig> for SessionOptions {
    fn from(config: &RecognitionConfig) -> Self {
        Self {
            language: config.language.clone(),
            continuous: config.continuous,
            interim_results: config.interim_results,
        }
    }
}

/// Control surface of an external speech-to-text engine.
///
/// Calls are requests: the engine confirms them later through
/// [`RecognitionEvent`]s delivered to the coordinator.
pub trait RecognitionEngine: Send {
    /// Whether the capability exists on this host at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Ask the engine to open a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine refuses (already running, no microphone).
    fn start(&mut self, options: &SessionOptions) -> Result<()>;

    /// Ask the engine to close the current session. Must tolerate being
    /// called with no session open.
    fn stop(&mut self);
}

/// One recognized segment as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionSegment {
    /// Best transcript alternative for this segment.
    pub transcript: String,
    /// Whether the engine will revise this segment again.
    pub is_final: bool,
}

impl RecognitionSegment {
    /// A segment still being revised.
    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: false,
        }
    }

    /// A committed segment.
    pub fn finalized(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: true,
        }
    }
}

/// Raw lifecycle and result events emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecognitionEvent {
    /// The session is open and audio is flowing.
    Start,
    /// Segments changed starting at `result_index`.
    ///
    /// `results` may be either the whole session list or only the changed
    /// tail; both forms are accepted.
    Result {
        result_index: usize,
        results: Vec<RecognitionSegment>,
    },
    /// The session closed (requested or not).
    End,
    /// The engine failed; the session is over.
    Error { code: String },
}

/// A normalized transcript update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    /// All finalized segments followed by the in-progress one.
    pub text: String,
    /// True when no segment is still in progress.
    pub is_final: bool,
}

/// What the adapter reports to the coordinator for each raw event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    SessionStart,
    SessionEnd,
    Transcript(TranscriptEvent),
    Error(String),
}

/// Adapter between the coordinator and a [`RecognitionEngine`].
pub struct TranscriptStream {
    engine: Box<dyn RecognitionEngine>,
    options: SessionOptions,
    segments: Vec<RecognitionSegment>,
    /// A start was requested and the engine has not yet answered with
    /// `Start`, `End` or `Error`.
    start_pending: bool,
}

impl std::fmt::Debug for TranscriptStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptStream")
            .field("options", &self.options)
            .field("segments", &self.segments.len())
            .field("start_pending", &self.start_pending)
            .finish()
    }
}

impl TranscriptStream {
    /// Wrap an engine.
    pub fn new(engine: Box<dyn RecognitionEngine>, options: SessionOptions) -> Self {
        Self {
            engine,
            options,
            segments: Vec::new(),
            start_pending: false,
        }
    }

    /// Whether the engine can be used at all.
    pub fn is_available(&self) -> bool {
        self.engine.is_available()
    }

    /// Whether a start request is still awaiting the engine's answer.
    pub fn start_pending(&self) -> bool {
        self.start_pending
    }

    /// Request a new session.
    ///
    /// # Errors
    ///
    /// Returns an error when the engine is unavailable, a start is already
    /// pending, or the engine refuses. The caller logs and carries on.
    pub fn start(&mut self) -> Result<()> {
        if !self.engine.is_available() {
            return Err(AssistantError::Recognition(
                "speech recognition is not available on this host".into(),
            ));
        }
        if self.start_pending {
            return Err(AssistantError::Recognition(
                "a recognition session is already starting".into(),
            ));
        }
        self.engine.start(&self.options)?;
        self.start_pending = true;
        debug!("recognition start requested");
        Ok(())
    }

    /// Request the end of the current session.
    ///
    /// Also abandons a pending start; a late `Start` is still reported.
    pub fn stop(&mut self) {
        self.engine.stop();
        self.start_pending = false;
        debug!("recognition stop requested");
    }

    /// Translate one raw engine event.
    ///
    /// Returns `None` for result events that carry no text.
    pub fn handle(&mut self, event: RecognitionEvent) -> Option<StreamEvent> {
        match event {
            RecognitionEvent::Start => {
                self.start_pending = false;
                self.segments.clear();
                info!("recognition session started");
                Some(StreamEvent::SessionStart)
            }
            RecognitionEvent::Result {
                result_index,
                results,
            } => self.apply_results(result_index, results),
            RecognitionEvent::End => {
                self.start_pending = false;
                self.segments.clear();
                info!("recognition session ended");
                Some(StreamEvent::SessionEnd)
            }
            RecognitionEvent::Error { code } => {
                self.start_pending = false;
                self.segments.clear();
                warn!(code = code.as_str(), "recognition error");
                Some(StreamEvent::Error(code))
            }
        }
    }

    fn apply_results(
        &mut self,
        result_index: usize,
        results: Vec<RecognitionSegment>,
    ) -> Option<StreamEvent> {
        let index = result_index.min(self.segments.len());
        self.segments.truncate(index);
        if results.len() > result_index {
            // Whole-session list: everything before `result_index` is unchanged.
            self.segments
                .extend(results.into_iter().skip(result_index));
        } else {
            self.segments.extend(results);
        }

        let text = self
            .segments
            .iter()
            .map(|s| s.transcript.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            return None;
        }
        let is_final = self.segments.last().is_some_and(|s| s.is_final);
        Some(StreamEvent::Transcript(TranscriptEvent { text, is_final }))
    }
}
