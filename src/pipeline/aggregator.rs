//! Utterance aggregator.
//!
//! Spoken commands arrive as a burst of partial and final transcripts.
//! Instead of trusting `is_final` (engines disagree on when to set it),
//! the aggregator waits for a quiet period: every transcript re-arms the
//! debounce timer, and only when the timer fires is the latest text
//! committed.

use super::timer::TimerSlot;
use crate::wakeword::{WakeWordGate, normalize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Why a committed utterance was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    TooShort,
    /// Same text as the previous dispatch.
    Duplicate,
    /// Nothing but a wake phrase.
    WakeEcho,
}

/// Outcome of [`UtteranceAggregator::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commit {
    Dispatch(String),
    Rejected(Rejection),
}

#[derive(Debug)]
pub struct UtteranceAggregator {
    pending_text: String,
    timer: TimerSlot,
    debounce: Duration,
    min_chars: usize,
}

impl UtteranceAggregator {
    pub fn new(debounce: Duration, min_chars: usize) -> Self {
        Self {
            pending_text: String::new(),
            timer: TimerSlot::new(),
            debounce,
            min_chars,
        }
    }

    /// Store the latest transcript and restart the quiet period.
    pub fn offer(&mut self, text: &str) {
        self.pending_text = text.trim().to_owned();
        self.timer.schedule(self.debounce);
        debug!(pending = self.pending_text.as_str(), "debounce re-armed");
    }

    /// Drop pending text and disarm the timer.
    pub fn cancel(&mut self) {
        self.pending_text.clear();
        self.timer.cancel();
    }

    pub fn pending_text(&self) -> &str {
        &self.pending_text
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Whether the debounce fired; disarms it if so.
    pub fn take_if_due(&mut self, now: Instant) -> bool {
        self.timer.take_if_due(now)
    }

    /// Take the pending text and decide whether it should be dispatched.
    ///
    /// A leading wake phrase ("hey jarvis, what time is it") is removed
    /// before the checks.
    pub fn commit(&mut self, gate: &WakeWordGate, last_processed: &str) -> Commit {
        self.timer.cancel();
        let raw = std::mem::take(&mut self.pending_text);

        if raw.trim().is_empty() {
            return Commit::Rejected(Rejection::Empty);
        }
        if gate.is_wake_phrase(&raw) {
            return Commit::Rejected(Rejection::WakeEcho);
        }
        let text = gate.strip_leading(&raw).unwrap_or(raw);
        if text.chars().count() < self.min_chars {
            return Commit::Rejected(Rejection::TooShort);
        }
        if !last_processed.is_empty() && normalize(&text) == normalize(last_processed) {
            return Commit::Rejected(Rejection::Duplicate);
        }
        Commit::Dispatch(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversationConfig;

    fn setup() -> (UtteranceAggregator, WakeWordGate) {
        (
            UtteranceAggregator::new(Duration::from_millis(2_500), 3),
            WakeWordGate::from_config(&ConversationConfig::default()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_into_latest_text() {
        let (mut agg, gate) = setup();
        agg.offer("what");
        tokio::time::advance(Duration::from_millis(1_000)).await;
        agg.offer("what is the");
        tokio::time::advance(Duration::from_millis(1_000)).await;
        agg.offer("what is the weather");

        // 2.0s after the first event: still quiet-period pending.
        assert!(!agg.take_if_due(Instant::now()));
        tokio::time::advance(Duration::from_millis(2_500)).await;
        assert!(agg.take_if_due(Instant::now()));
        assert_eq!(
            agg.commit(&gate, ""),
            Commit::Dispatch("what is the weather".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rejections() {
        let (mut agg, gate) = setup();

        agg.offer("   ");
        assert_eq!(agg.commit(&gate, ""), Commit::Rejected(Rejection::Empty));

        agg.offer("Hey Jarvis.");
        assert_eq!(agg.commit(&gate, ""), Commit::Rejected(Rejection::WakeEcho));

        agg.offer("ok");
        assert_eq!(agg.commit(&gate, ""), Commit::Rejected(Rejection::TooShort));

        agg.offer("Turn on the lights.");
        assert_eq!(
            agg.commit(&gate, "turn on the lights"),
            Commit::Rejected(Rejection::Duplicate)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn question_mentioning_name_is_dispatched() {
        let (mut agg, gate) = setup();
        agg.offer("what is jarvis");
        assert_eq!(agg.commit(&gate, ""), Commit::Dispatch("what is jarvis".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn leading_wake_phrase_is_removed() {
        let (mut agg, gate) = setup();
        agg.offer("hey jarvis what's the time");
        assert_eq!(agg.commit(&gate, ""), Commit::Dispatch("whats the time".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_disarms() {
        let (mut agg, _) = setup();
        agg.offer("something");
        agg.cancel();
        assert!(agg.deadline().is_none());
        assert!(agg.pending_text().is_empty());
    }
}
