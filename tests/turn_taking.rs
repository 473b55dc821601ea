//! End-to-end turn-taking scenarios against mock engines and providers.
//!
//! Every test runs on a paused clock, so debounce windows, post-speech
//! buffers and provider backoff are exercised at their configured values
//! without real waiting.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use jarvis::conversation::{ConversationLog, Role};
use jarvis::llm::{ChatProvider, ChatRequest, ProviderChain, ProviderError, ResponsePipeline, RetryPolicy};
use jarvis::pipeline::messages::ControlCommand;
use jarvis::stt::{RecognitionEngine, RecognitionEvent, RecognitionSegment, SessionOptions};
use jarvis::tts::{SynthesisEngine, SynthesisEvent, Utterance};
use jarvis::{AssistantConfig, CoordinatorHandle, Mode, RuntimeEvent, TurnCoordinator};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[derive(Default)]
struct EngineCalls {
    stt_starts: usize,
    stt_stops: usize,
    spoken: Vec<Utterance>,
    tts_cancels: usize,
}

struct MockRecognizer(Arc<Mutex<EngineCalls>>);

impl RecognitionEngine for MockRecognizer {
    fn start(&mut self, _options: &SessionOptions) -> jarvis::Result<()> {
        self.0.lock().unwrap().stt_starts += 1;
        Ok(())
    }

    fn stop(&mut self) {
        self.0.lock().unwrap().stt_stops += 1;
    }
}

struct MockSynthesizer(Arc<Mutex<EngineCalls>>);

impl SynthesisEngine for MockSynthesizer {
    fn speak(&mut self, utterance: &Utterance) -> jarvis::Result<()> {
        self.0.lock().unwrap().spoken.push(utterance.clone());
        Ok(())
    }

    fn cancel(&mut self) {
        self.0.lock().unwrap().tts_cancels += 1;
    }
}

/// Replays a fixed result forever and counts calls.
struct FixedProvider {
    name: &'static str,
    result: Result<String, ProviderError>,
    calls: AtomicU32,
}

impl FixedProvider {
    fn new(name: &'static str, result: Result<String, ProviderError>) -> Arc<Self> {
        Arc::new(Self {
            name,
            result,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatProvider for FixedProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

struct Harness {
    calls: Arc<Mutex<EngineCalls>>,
    handle: CoordinatorHandle,
    runtime: broadcast::Receiver<RuntimeEvent>,
    task: JoinHandle<jarvis::Result<ConversationLog>>,
    mode: Mode,
    speaking: bool,
    listening: bool,
    removed: Vec<u64>,
    cleared: bool,
}

impl Harness {
    fn start(chain: ProviderChain) -> Self {
        let mut config = AssistantConfig::default();
        config.conversation.greeting.enabled = false;
        Self::start_with(config, chain)
    }

    fn start_with(config: AssistantConfig, chain: ProviderChain) -> Self {
        let calls = Arc::new(Mutex::new(EngineCalls::default()));
        let (runtime_tx, runtime) = broadcast::channel(256);
        let pipeline = ResponsePipeline::new(config.llm.clone(), chain);
        let coordinator = TurnCoordinator::new(
            config,
            Box::new(MockRecognizer(Arc::clone(&calls))),
            Box::new(MockSynthesizer(Arc::clone(&calls))),
            pipeline,
        )
        .with_runtime_events(runtime_tx);
        let handle = coordinator.handle();
        let task = tokio::spawn(coordinator.run());
        Self {
            calls,
            handle,
            runtime,
            task,
            mode: Mode::WaitingForWakeWord,
            speaking: false,
            listening: false,
            removed: Vec::new(),
            cleared: false,
        }
    }

    /// Let the coordinator drain its queue.
    async fn settle(&mut self) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.drain();
    }

    async fn wait(&mut self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        self.drain();
    }

    fn drain(&mut self) {
        while let Ok(event) = self.runtime.try_recv() {
            match event {
                RuntimeEvent::ModeChanged { mode } => self.mode = mode,
                RuntimeEvent::Speaking { active } => self.speaking = active,
                RuntimeEvent::Listening { active } => self.listening = active,
                RuntimeEvent::MessageRemoved { id } => self.removed.push(id),
                RuntimeEvent::ConversationCleared => self.cleared = true,
                _ => {}
            }
        }
    }

    async fn hear(&mut self, text: &str) {
        self.handle
            .send(RecognitionEvent::Result {
                result_index: 0,
                results: vec![RecognitionSegment::interim(text)],
            })
            .unwrap();
        self.settle().await;
    }

    async fn type_text(&mut self, text: &str) {
        self.handle
            .send(ControlCommand::SubmitText { text: text.into() })
            .unwrap();
        self.settle().await;
    }

    /// Report the most recent utterance as played to the end.
    async fn finish_speech(&mut self) {
        let id = self.last_spoken().id;
        self.handle.send(SynthesisEvent::Start { id }).unwrap();
        self.handle.send(SynthesisEvent::End { id }).unwrap();
        self.settle().await;
    }

    fn last_spoken(&self) -> Utterance {
        self.calls.lock().unwrap().spoken.last().cloned().expect("something spoken")
    }

    fn spoken_count(&self) -> usize {
        self.calls.lock().unwrap().spoken.len()
    }

    async fn finish(self) -> ConversationLog {
        self.handle.shutdown();
        self.task.await.unwrap().unwrap()
    }
}

fn texts(log: &ConversationLog) -> Vec<(Role, String)> {
    log.messages()
        .iter()
        .map(|m| (m.role, m.content.clone()))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn wake_then_identity_question_full_turn() {
    let mut h = Harness::start(ProviderChain::new());
    h.settle().await;
    assert!(h.listening);

    h.hear("hey jarvis").await;
    assert_eq!(h.mode, Mode::CommandCapture);
    assert!(h.speaking);
    assert_eq!(h.last_spoken().text, "Aha, I'm listening");

    h.finish_speech().await;
    assert!(!h.speaking);
    // Still inside the post-speech buffer.
    assert!(!h.listening);
    h.wait(2_100).await;
    assert!(h.listening);
    assert_eq!(h.mode, Mode::CommandCapture);

    h.hear("what is jarvis").await;
    h.wait(2_600).await;
    assert_eq!(h.mode, Mode::Processing);
    assert!(h.last_spoken().text.starts_with("I am Jarvis"));

    h.finish_speech().await;
    h.wait(2_100).await;
    assert_eq!(h.mode, Mode::WaitingForWakeWord);
    assert!(h.listening);

    let log = h.finish().await;
    let entries = texts(&log);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], (Role::User, "what is jarvis".to_owned()));
    assert_eq!(entries[1].0, Role::Assistant);
    assert!(entries[1].1.starts_with("I am Jarvis"));
}

#[tokio::test(start_paused = true)]
async fn rate_limited_provider_fails_over_to_backup() {
    let a = FixedProvider::new("a", Err(ProviderError::RateLimited("429".into())));
    let b = FixedProvider::new("b", Ok("It is noon.".into()));
    let chain = ProviderChain::new()
        .with(a.clone(), RetryPolicy::default())
        .with(b.clone(), RetryPolicy::default());
    let mut h = Harness::start(chain);

    h.type_text("what time is it").await;
    assert_eq!(h.mode, Mode::Processing);
    // Rate-limit backoff: 5s then 10s before giving up on `a`.
    h.wait(16_000).await;

    assert_eq!(a.calls(), 3);
    assert_eq!(b.calls(), 1);
    assert_eq!(h.last_spoken().text, "It is noon.");

    let log = h.finish().await;
    assert_eq!(log.last().unwrap().content, "It is noon.");
}

#[tokio::test(start_paused = true)]
async fn exhausted_chain_produces_fallback_reply() {
    let a = FixedProvider::new("a", Err(ProviderError::KeyInvalid("401".into())));
    let chain = ProviderChain::new().with(a.clone(), RetryPolicy::default());
    let mut h = Harness::start(chain);

    h.type_text("what time is it").await;
    assert_eq!(a.calls(), 1);

    let log = h.finish().await;
    let reply = &log.last().unwrap().content;
    assert!(reply.starts_with("Sorry, the AI service is currently unavailable."));
    assert!(reply.contains("API Key Error"));
}

#[tokio::test(start_paused = true)]
async fn transcripts_are_ignored_while_speaking_and_during_buffer() {
    let mut h = Harness::start(ProviderChain::new());

    h.hear("hey jarvis").await;
    assert!(h.speaking);
    h.hear("turn on the lights").await;
    h.wait(3_000).await;
    assert_eq!(h.mode, Mode::CommandCapture);

    h.finish_speech().await;
    h.hear("turn on the lights").await;
    h.wait(2_600).await;
    assert_eq!(h.mode, Mode::CommandCapture);
    assert_eq!(h.spoken_count(), 1);

    // Buffer has elapsed: the same words now count.
    h.hear("turn on the lights").await;
    h.wait(2_600).await;
    assert_eq!(h.mode, Mode::Processing);

    let log = h.finish().await;
    let users: Vec<_> = log
        .messages()
        .iter()
        .filter(|m| m.role == Role::User)
        .collect();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].content, "turn on the lights");
}

#[tokio::test(start_paused = true)]
async fn stop_word_interrupts_once() {
    let mut h = Harness::start(ProviderChain::new());

    h.hear("hey jarvis").await;
    assert!(h.speaking);

    h.hear("stop").await;
    assert!(!h.speaking);
    assert_eq!(h.mode, Mode::WaitingForWakeWord);
    assert_eq!(h.calls.lock().unwrap().tts_cancels, 1);

    h.hear("stop").await;
    assert_eq!(h.calls.lock().unwrap().tts_cancels, 1);
    assert_eq!(h.mode, Mode::WaitingForWakeWord);

    h.wait(2_100).await;
    assert!(h.listening);
    h.finish().await;
}

#[tokio::test(start_paused = true)]
async fn wake_phrase_barges_in_on_reply() {
    let b = FixedProvider::new("b", Ok("A long answer about the weather.".into()));
    let chain = ProviderChain::new().with(b, RetryPolicy::default());
    let mut h = Harness::start(chain);

    h.type_text("tell me the weather").await;
    assert!(h.speaking);
    assert_eq!(h.spoken_count(), 1);

    h.hear("jarvis").await;
    assert_eq!(h.calls.lock().unwrap().tts_cancels, 1);
    assert_eq!(h.mode, Mode::CommandCapture);
    assert_eq!(h.last_spoken().text, "Aha, I'm listening");
    h.finish().await;
}

#[tokio::test(start_paused = true)]
async fn debounce_collapses_burst_into_one_dispatch() {
    let b = FixedProvider::new("b", Ok("Done.".into()));
    let chain = ProviderChain::new().with(b.clone(), RetryPolicy::default());
    let mut h = Harness::start(chain);

    h.hear("hey jarvis").await;
    h.finish_speech().await;
    h.wait(2_100).await;

    for partial in ["turn", "turn on", "turn on the", "turn on the kitchen lights"] {
        h.hear(partial).await;
        h.wait(500).await;
    }
    assert_eq!(b.calls(), 0);
    h.wait(2_500).await;
    assert_eq!(b.calls(), 1);

    let log = h.finish().await;
    assert_eq!(log.messages()[0].content, "turn on the kitchen lights");
}

#[tokio::test(start_paused = true)]
async fn undo_removes_last_entry() {
    let mut h = Harness::start(ProviderChain::new());
    h.type_text("first question").await;
    h.finish_speech().await;
    h.wait(2_100).await;

    h.handle.send(ControlCommand::Undo).unwrap();
    h.settle().await;
    assert_eq!(h.removed, vec![2]);
    let log = h.finish().await;
    assert_eq!(log.len(), 1);
    assert_eq!(log.messages()[0].content, "first question");
}

#[tokio::test(start_paused = true)]
async fn clear_empties_the_log() {
    let mut h = Harness::start(ProviderChain::new());
    h.type_text("first question").await;
    h.finish_speech().await;
    h.wait(2_100).await;

    h.handle.send(ControlCommand::Clear).unwrap();
    h.settle().await;
    assert!(h.cleared);

    h.type_text("second question").await;
    let log = h.finish().await;
    assert_eq!(log.messages()[0].id, 1);
    assert_eq!(log.messages()[0].content, "second question");
    assert_eq!(log.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn same_command_is_answered_again_after_new_wake_phrase() {
    let b = FixedProvider::new("b", Ok("It is noon.".into()));
    let chain = ProviderChain::new().with(b.clone(), RetryPolicy::default());
    let mut h = Harness::start(chain);

    for round in 1..=2 {
        h.hear("hey jarvis").await;
        assert_eq!(h.mode, Mode::CommandCapture);
        h.finish_speech().await;
        h.wait(2_100).await;

        h.hear("what time is it").await;
        h.wait(2_600).await;
        assert_eq!(h.mode, Mode::Processing);
        assert_eq!(b.calls(), round);

        h.finish_speech().await;
        h.wait(2_100).await;
        assert_eq!(h.mode, Mode::WaitingForWakeWord);
    }

    let log = h.finish().await;
    assert_eq!(log.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn command_pending_when_greeting_starts_is_not_dispatched() {
    let b = FixedProvider::new("b", Ok("Lights on.".into()));
    let chain = ProviderChain::new().with(b.clone(), RetryPolicy::default());
    let mut config = AssistantConfig::default();
    config.conversation.greeting.delay_ms = 3_500;
    let mut h = Harness::start_with(config, chain);

    h.hear("hey jarvis").await;
    h.finish_speech().await;
    h.wait(2_100).await;
    h.hear("turn on the lights").await;

    // Greeting fires at 3.5s, before the 2.5s quiet period ends.
    h.wait(2_600).await;
    assert!(h.speaking);
    assert_eq!(h.mode, Mode::CommandCapture);
    assert_eq!(b.calls(), 0);

    h.finish_speech().await;
    h.wait(2_100).await;
    h.hear("turn on the lights").await;
    h.wait(2_600).await;
    assert_eq!(b.calls(), 1);
    assert_eq!(h.last_spoken().text, "Lights on.");
    h.finish().await;
}

#[tokio::test(start_paused = true)]
async fn greeting_plays_after_delay() {
    let mut h = Harness::start_with(AssistantConfig::default(), ProviderChain::new());
    h.wait(500).await;
    assert_eq!(h.spoken_count(), 0);
    h.wait(600).await;
    assert_eq!(h.spoken_count(), 1);
    assert!(h.speaking);

    let log = h.finish().await;
    assert_eq!(log.messages()[0].content, "Welcome.");
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_engines() {
    let mut h = Harness::start(ProviderChain::new());
    h.settle().await;
    let calls = Arc::clone(&h.calls);
    h.finish().await;
    assert_eq!(calls.lock().unwrap().stt_stops, 1);
}
