//! Turn-taking coordinator.
//!
//! One task owns every piece of conversational state and reacts to three
//! kinds of input in a single `select!` loop:
//!
//! - engine and user events ([`Event`]) from the host,
//! - replies from the response pipeline (spawned, one at a time),
//! - its own timers (debounce, post-speech buffer, restart delay, capture
//!   timeout, greeting).
//!
//! Because nothing else mutates the state, each handler observes the latest
//! `is_listening` / `is_speaking` / `is_processing` flags synchronously.
//!
//! ```text
//! WaitingForWakeWord --wake phrase--> CommandCapture --debounce--> Processing
//!         ^                                                           |
//!         +------------- reply spoken + buffer elapsed ---------------+
//! ```

use super::aggregator::{Commit, UtteranceAggregator};
use super::messages::{ControlCommand, Event};
use super::state::{ConversationState, Mode};
use super::timer::{self, TimerSlot};
use crate::animation::{AnimationManager, AnimationSink, NoopAnimationSink, PlayedAnimation};
use crate::config::AssistantConfig;
use crate::conversation::{ConversationLog, ConversationMessage, Role};
use crate::error::{AssistantError, Result};
use crate::llm::{Reply, ResponsePipeline};
use crate::runtime::RuntimeEvent;
use crate::stt::{RecognitionEngine, SessionOptions, StreamEvent, TranscriptEvent, TranscriptStream};
use crate::tts::{SpeakOutcome, SpeechOutput, SpeechUpdate, SynthesisEngine, UNLOCK_NOTICE};
use crate::wakeword::WakeWordGate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Reply delivered back to the loop by a spawned pipeline call.
#[derive(Debug)]
struct TurnReply {
    turn: u64,
    reply: Reply,
}

/// Cloneable sender side of a running coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    events: mpsc::UnboundedSender<Event>,
    cancel: CancellationToken,
}

impl CoordinatorHandle {
    /// Deliver an engine or user event.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Channel`] once the coordinator has stopped.
    pub fn send(&self, event: impl Into<Event>) -> Result<()> {
        self.events
            .send(event.into())
            .map_err(|_| AssistantError::Channel("coordinator is not running".into()))
    }

    /// Ask the loop to exit.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Owns the conversation and drives the external engines.
pub struct TurnCoordinator {
    config: AssistantConfig,
    state: ConversationState,
    gate: WakeWordGate,
    aggregator: UtteranceAggregator,
    recognizer: TranscriptStream,
    speech: SpeechOutput,
    pipeline: Arc<ResponsePipeline>,
    log: ConversationLog,
    animations: AnimationManager,
    runtime_tx: Option<broadcast::Sender<RuntimeEvent>>,
    cancel: CancellationToken,

    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: Option<mpsc::UnboundedReceiver<Event>>,
    replies_tx: mpsc::UnboundedSender<TurnReply>,
    replies_rx: Option<mpsc::UnboundedReceiver<TurnReply>>,

    buffer: TimerSlot,
    restart: TimerSlot,
    capture_timeout: TimerSlot,
    greeting: TimerSlot,

    turn_seq: u64,
    active_turn: Option<u64>,
    /// Turn whose reply is logged but not spoken (interrupted while pending).
    muted_turn: Option<u64>,
    dispatch_task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for TurnCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnCoordinator")
            .field("state", &self.state)
            .field("active_turn", &self.active_turn)
            .finish_non_exhaustive()
    }
}

impl TurnCoordinator {
    /// Wire the engines and the response pipeline together.
    pub fn new(
        config: AssistantConfig,
        recognizer: Box<dyn RecognitionEngine>,
        synthesizer: Box<dyn SynthesisEngine>,
        pipeline: ResponsePipeline,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        let options = SessionOptions::from(&config.recognition);
        let aggregator = UtteranceAggregator::new(
            Duration::from_millis(config.conversation.debounce_ms),
            config.conversation.min_utterance_chars,
        );
        Self {
            state: ConversationState::new(config.recognition.voice_mode_enabled),
            gate: WakeWordGate::from_config(&config.conversation),
            aggregator,
            recognizer: TranscriptStream::new(recognizer, options),
            speech: SpeechOutput::new(synthesizer, config.speech.clone()),
            pipeline: Arc::new(pipeline),
            log: ConversationLog::new(),
            animations: AnimationManager::new(
                config.animation.clone(),
                Box::new(NoopAnimationSink),
            ),
            runtime_tx: None,
            cancel: CancellationToken::new(),
            events_tx,
            events_rx: Some(events_rx),
            replies_tx,
            replies_rx: Some(replies_rx),
            buffer: TimerSlot::new(),
            restart: TimerSlot::new(),
            capture_timeout: TimerSlot::new(),
            greeting: TimerSlot::new(),
            turn_seq: 0,
            active_turn: None,
            muted_turn: None,
            dispatch_task: None,
            config,
        }
    }

    /// Broadcast [`RuntimeEvent`]s to display layers.
    pub fn with_runtime_events(mut self, tx: broadcast::Sender<RuntimeEvent>) -> Self {
        self.runtime_tx = Some(tx);
        self
    }

    /// Hand animations to a playback layer.
    pub fn with_animation_sink(mut self, sink: Box<dyn AnimationSink>) -> Self {
        self.animations = AnimationManager::new(self.config.animation.clone(), sink);
        self
    }

    /// Share a cancellation token with the caller.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            events: self.events_tx.clone(),
            cancel: self.cancel.clone(),
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Recently played animations, oldest first.
    pub fn animation_history(&self) -> impl Iterator<Item = &PlayedAnimation> {
        self.animations.history()
    }

    /// Run until canceled or every event sender is gone.
    ///
    /// Returns the conversation log as it stood at shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Pipeline`] if called twice on the same value.
    pub async fn run(mut self) -> Result<ConversationLog> {
        let mut events_rx = self
            .events_rx
            .take()
            .ok_or_else(|| AssistantError::Pipeline("coordinator already running".into()))?;
        let mut replies_rx = self
            .replies_rx
            .take()
            .ok_or_else(|| AssistantError::Pipeline("coordinator already running".into()))?;
        // Only the handles keep the event channel open.
        let (closed_tx, _) = mpsc::unbounded_channel();
        self.events_tx = closed_tx;
        let cancel = self.cancel.clone();

        self.startup();

        loop {
            let next_deadline = self.next_deadline();
            tokio::select! {
                () = cancel.cancelled() => break,
                event = events_rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        info!("event channel closed, coordinator stopping");
                        break;
                    }
                },
                Some(reply) = replies_rx.recv() => self.on_reply(reply),
                () = timer::wait(next_deadline) => self.on_timers(Instant::now()),
            }
        }

        if let Some(task) = self.dispatch_task.take() {
            task.abort();
        }
        self.speech.cancel();
        self.stop_recognition();
        info!("turn coordinator stopped");
        Ok(self.log)
    }

    fn startup(&mut self) {
        info!(
            wake_phrases = self.gate.phrase_count(),
            providers = self.pipeline.chain().len(),
            voice_mode = self.state.voice_mode_enabled,
            "turn coordinator started"
        );
        if !self.recognizer.is_available() {
            warn!("speech recognition unavailable, text input only");
        }
        if !self.speech.is_available() {
            warn!("speech synthesis unavailable, replies will not be spoken");
        }
        let greeting = &self.config.conversation.greeting;
        if greeting.enabled {
            self.greeting
                .schedule(Duration::from_millis(greeting.delay_ms));
        }
        self.start_recognition();
    }

    fn next_deadline(&self) -> Option<Instant> {
        [
            self.aggregator.deadline(),
            self.buffer.deadline(),
            self.restart.deadline(),
            self.capture_timeout.deadline(),
            self.greeting.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    // ------------------------------------------------------------------
    // Inbound events
    // ------------------------------------------------------------------

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Recognition(raw) => {
                if let Some(stream_event) = self.recognizer.handle(raw) {
                    self.on_stream_event(stream_event);
                }
            }
            Event::Synthesis(raw) => {
                if let Some(update) = self.speech.handle(raw) {
                    self.on_speech_update(update);
                }
            }
            Event::Control(command) => self.on_control(command),
            Event::Animation(command) => {
                if let Some(played) = self.animations.execute(&command) {
                    self.emit_animation(played);
                }
            }
        }
    }

    fn on_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::SessionStart => {
                self.set_listening(true);
                if !self.state.voice_mode_enabled
                    || self.state.is_speaking
                    || self.state.is_processing
                {
                    debug!("late session start, closing it");
                    self.stop_recognition();
                }
            }
            StreamEvent::SessionEnd => self.set_listening(false),
            StreamEvent::Error(code) => {
                self.set_listening(false);
                if self.state.voice_mode_enabled {
                    let delay_ms = self.config.recognition.error_restart_delay_ms;
                    warn!(code = code.as_str(), delay_ms, "recognition failed, scheduling restart");
                    self.restart.schedule(Duration::from_millis(delay_ms));
                }
            }
            StreamEvent::Transcript(t) => self.on_transcript(t),
        }
    }

    fn on_transcript(&mut self, t: TranscriptEvent) {
        self.state.current_transcript.clone_from(&t.text);
        self.emit(RuntimeEvent::Transcript {
            text: t.text.clone(),
        });

        // The stop word outranks everything else.
        if self.gate.is_interrupt(&t.text) {
            self.interrupt();
            return;
        }

        if self.state.is_speaking && self.gate.matches(&t.text) {
            self.barge_in();
            return;
        }

        match self.state.mode {
            Mode::WaitingForWakeWord => {
                if self.gate.matches(&t.text) {
                    info!(transcript = t.text.as_str(), "wake phrase detected");
                    self.activate();
                }
            }
            Mode::CommandCapture => {
                if self.state.is_speaking || self.buffer.is_armed() {
                    debug!(transcript = t.text.as_str(), "transcript dropped while speaking");
                    return;
                }
                self.aggregator.offer(&t.text);
                self.arm_capture_timeout();
            }
            Mode::Processing => {
                debug!("transcript ignored while processing");
            }
        }
    }

    fn on_speech_update(&mut self, update: SpeechUpdate) {
        match update {
            SpeechUpdate::Started { id } => {
                debug!(utterance_id = id, "speech started");
                if !self.state.is_speaking {
                    self.set_speaking(true);
                }
                self.stop_recognition();
            }
            SpeechUpdate::Retrying { .. } => {}
            SpeechUpdate::Finished { id } => {
                debug!(utterance_id = id, "speech finished");
                self.speech_ended();
            }
            SpeechUpdate::Failed { .. } => self.speech_ended(),
            SpeechUpdate::Blocked { notify, .. } => {
                self.speech_ended();
                if notify {
                    self.append(Role::Assistant, UNLOCK_NOTICE);
                }
            }
        }
    }

    fn on_control(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::ToggleVoiceMode => {
                let enabled = !self.state.voice_mode_enabled;
                self.set_voice_mode(enabled);
            }
            ControlCommand::SetVoiceMode { enabled } => self.set_voice_mode(enabled),
            ControlCommand::SubmitText { text } => {
                let text = text.trim();
                if text.is_empty() {
                    return;
                }
                if self.turn_in_progress() {
                    warn!("typed input dropped, a response is still in progress");
                    return;
                }
                self.aggregator.cancel();
                self.begin_turn(text.to_owned());
            }
            ControlCommand::Undo => {
                if let Some(removed) = self.log.undo() {
                    self.emit(RuntimeEvent::MessageRemoved { id: removed.id });
                }
            }
            ControlCommand::Clear => {
                self.log.clear();
                self.emit(RuntimeEvent::ConversationCleared);
            }
        }
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    fn on_timers(&mut self, now: Instant) {
        if self.greeting.take_if_due(now) {
            self.greet();
        }
        if self.aggregator.take_if_due(now) {
            self.on_debounce();
        }
        if self.buffer.take_if_due(now) {
            self.on_buffer_elapsed();
        }
        if self.restart.take_if_due(now) && self.state.may_listen() {
            info!("restarting recognition after error");
            self.start_recognition();
        }
        if self.capture_timeout.take_if_due(now) {
            self.on_capture_timeout();
        }
    }

    fn on_debounce(&mut self) {
        if self.state.mode != Mode::CommandCapture {
            self.aggregator.cancel();
            return;
        }
        if self.state.is_processing {
            warn!("utterance dropped, a response is still in flight");
            self.aggregator.cancel();
            self.set_mode(Mode::WaitingForWakeWord);
            return;
        }
        if self.state.is_speaking || self.buffer.is_armed() {
            debug!("utterance dropped, overlaps our own speech");
            self.aggregator.cancel();
            return;
        }
        match self
            .aggregator
            .commit(&self.gate, &self.state.last_processed_utterance)
        {
            Commit::Dispatch(text) => {
                self.state.last_processed_utterance.clone_from(&text);
                self.begin_turn(text);
            }
            Commit::Rejected(reason) => {
                debug!(?reason, "utterance not dispatched");
                self.capture_timeout.cancel();
                self.set_mode(Mode::WaitingForWakeWord);
            }
        }
    }

    fn on_buffer_elapsed(&mut self) {
        debug!("post-speech buffer elapsed");
        match self.state.mode {
            Mode::Processing if !self.state.is_processing => {
                self.set_mode(Mode::WaitingForWakeWord);
            }
            Mode::CommandCapture => self.arm_capture_timeout(),
            _ => {}
        }
        if self.state.may_listen() {
            self.start_recognition();
        }
    }

    fn on_capture_timeout(&mut self) {
        if self.state.mode != Mode::CommandCapture {
            return;
        }
        if self.state.is_speaking || self.buffer.is_armed() || self.aggregator.deadline().is_some() {
            self.arm_capture_timeout();
            return;
        }
        info!("no command heard, returning to wake-word mode");
        self.set_mode(Mode::WaitingForWakeWord);
    }

    fn greet(&mut self) {
        let greeting = self.config.conversation.greeting.clone();
        if !greeting.message.is_empty() {
            self.append(Role::Assistant, &greeting.message);
        }
        if let Some(played) = self.animations.play_greeting() {
            self.emit_animation(played);
        }
        if !greeting.spoken.is_empty() {
            self.speak(&greeting.spoken);
        }
    }

    // ------------------------------------------------------------------
    // Turn handling
    // ------------------------------------------------------------------

    fn turn_in_progress(&self) -> bool {
        self.state.is_processing || self.state.mode == Mode::Processing
    }

    /// Wake phrase accepted: open command capture and acknowledge.
    fn activate(&mut self) {
        self.aggregator.cancel();
        self.state.last_processed_utterance.clear();
        self.set_mode(Mode::CommandCapture);
        self.arm_capture_timeout();
        let readiness = self.config.conversation.readiness_reply.clone();
        if !readiness.is_empty() {
            self.speak(&readiness);
        }
    }

    /// Stop word: cancel speech and capture, back to passive listening.
    fn interrupt(&mut self) {
        let was_speaking = self.speech.cancel();
        let capturing = self.state.mode != Mode::WaitingForWakeWord;
        if !was_speaking && !capturing {
            debug!("stop word with nothing to interrupt");
            return;
        }
        info!(was_speaking, mode = %self.state.mode, "stop word, interrupting");
        self.aggregator.cancel();
        self.state.last_processed_utterance.clear();
        self.capture_timeout.cancel();
        if self.state.is_processing {
            self.muted_turn = self.active_turn;
        }
        if was_speaking {
            self.speech_ended();
        }
        self.set_mode(Mode::WaitingForWakeWord);
    }

    /// Wake phrase heard over our own speech.
    fn barge_in(&mut self) {
        info!("barge-in, canceling speech");
        if self.speech.cancel() {
            self.speech_ended();
        }
        if self.state.is_processing {
            self.muted_turn = self.active_turn;
        }
        self.activate();
    }

    fn begin_turn(&mut self, text: String) {
        self.turn_seq += 1;
        let turn = self.turn_seq;
        info!(turn, utterance = text.as_str(), "dispatching utterance");

        self.capture_timeout.cancel();
        self.set_mode(Mode::Processing);
        self.set_processing(true);
        self.stop_recognition();
        self.append(Role::User, &text);

        self.active_turn = Some(turn);
        let pipeline = Arc::clone(&self.pipeline);
        let tx = self.replies_tx.clone();
        self.dispatch_task = Some(tokio::spawn(async move {
            let reply = pipeline.dispatch(&text).await;
            let _ = tx.send(TurnReply { turn, reply });
        }));
    }

    fn on_reply(&mut self, TurnReply { turn, reply }: TurnReply) {
        if self.active_turn != Some(turn) {
            debug!(turn, "stale reply ignored");
            return;
        }
        self.active_turn = None;
        self.dispatch_task = None;
        self.set_processing(false);
        info!(turn, source = ?reply.source, "reply received");
        self.append(Role::Assistant, &reply.text);

        if self.muted_turn.take() == Some(turn) {
            debug!(turn, "turn was interrupted, reply not spoken");
            if self.state.may_listen() {
                self.start_recognition();
            }
            return;
        }

        if let Some(played) = self.animations.play_reply() {
            self.emit_animation(played);
        }

        match self.speak(&reply.text) {
            // Turn completes once speech ends and the buffer elapses.
            SpeakOutcome::Queued(_) | SpeakOutcome::Busy => {}
            SpeakOutcome::Unavailable => self.finish_turn(),
        }
    }

    /// Reply handled without speech: go straight back to passive listening.
    fn finish_turn(&mut self) {
        if self.state.mode == Mode::Processing {
            self.set_mode(Mode::WaitingForWakeWord);
        }
        if self.state.may_listen() && !self.buffer.is_armed() {
            self.start_recognition();
        }
    }

    // ------------------------------------------------------------------
    // Engine control
    // ------------------------------------------------------------------

    fn speak(&mut self, text: &str) -> SpeakOutcome {
        let outcome = self.speech.speak(text);
        if let SpeakOutcome::Queued(id) = outcome {
            debug!(utterance_id = id, "speaking");
            self.aggregator.cancel();
            self.buffer.cancel();
            self.restart.cancel();
            self.set_speaking(true);
            self.stop_recognition();
        }
        outcome
    }

    fn speech_ended(&mut self) {
        self.set_speaking(false);
        self.buffer
            .schedule(Duration::from_millis(self.config.speech.post_speech_buffer_ms));
    }

    fn start_recognition(&mut self) {
        if !self.state.voice_mode_enabled || self.state.is_listening {
            return;
        }
        match self.recognizer.start() {
            Ok(()) => self.set_listening(true),
            Err(e) => {
                warn!(error = %e, "could not start recognition");
                self.set_listening(false);
            }
        }
    }

    fn stop_recognition(&mut self) {
        if self.state.is_listening || self.recognizer.start_pending() {
            self.recognizer.stop();
        }
        self.set_listening(false);
    }

    fn set_voice_mode(&mut self, enabled: bool) {
        if self.state.voice_mode_enabled == enabled {
            return;
        }
        self.state.voice_mode_enabled = enabled;
        info!(enabled, "voice mode toggled");
        self.emit(RuntimeEvent::VoiceMode { enabled });

        if enabled {
            if self.state.mode == Mode::CommandCapture {
                self.set_mode(Mode::WaitingForWakeWord);
            }
            if self.state.may_listen() {
                self.start_recognition();
            }
        } else {
            self.restart.cancel();
            self.aggregator.cancel();
            self.capture_timeout.cancel();
            if self.state.mode == Mode::CommandCapture {
                self.set_mode(Mode::WaitingForWakeWord);
            }
            self.stop_recognition();
        }
    }

    fn arm_capture_timeout(&mut self) {
        let secs = self.config.conversation.capture_timeout_s;
        if secs > 0 {
            self.capture_timeout
                .schedule(Duration::from_secs(u64::from(secs)));
        }
    }

    // ------------------------------------------------------------------
    // State and notifications
    // ------------------------------------------------------------------

    fn append(&mut self, role: Role, content: &str) -> ConversationMessage {
        let message = self.log.push(role, content);
        self.emit(RuntimeEvent::MessageAppended {
            message: message.clone(),
        });
        message
    }

    fn set_mode(&mut self, mode: Mode) {
        if self.state.mode == mode {
            return;
        }
        info!(from = %self.state.mode, to = %mode, "mode changed");
        self.state.mode = mode;
        self.emit(RuntimeEvent::ModeChanged { mode });
    }

    fn set_listening(&mut self, active: bool) {
        if self.state.is_listening != active {
            self.state.is_listening = active;
            self.emit(RuntimeEvent::Listening { active });
        }
    }

    fn set_speaking(&mut self, active: bool) {
        if self.state.is_speaking != active {
            self.state.is_speaking = active;
            self.emit(RuntimeEvent::Speaking { active });
        }
    }

    fn set_processing(&mut self, active: bool) {
        if self.state.is_processing != active {
            self.state.is_processing = active;
            self.emit(RuntimeEvent::Processing { active });
        }
    }

    fn emit_animation(&self, played: PlayedAnimation) {
        self.emit(RuntimeEvent::Animation { played });
    }

    fn emit(&self, event: RuntimeEvent) {
        if let Some(tx) = &self.runtime_tx {
            let _ = tx.send(event);
        }
    }
}
