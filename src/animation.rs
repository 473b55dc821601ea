//! Animation side channel.
//!
//! The orchestrator never renders anything. It names an animation and a
//! duration, hands them to an [`AnimationSink`], and remembers the last few
//! commands for display. Commands arrive from an external push transport
//! as `{command, timestamp}` or are issued internally (greeting, reply nod).

use crate::config::AnimationConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

/// A push-transport animation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationCommand {
    /// Animation name, e.g. `wave`.
    pub command: String,
    /// Sender-side timestamp, passed through untouched.
    #[serde(default)]
    pub timestamp: String,
}

impl AnimationCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// An executed command as kept in the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayedAnimation {
    pub command: String,
    pub duration_ms: u64,
    pub played_at: DateTime<Utc>,
}

/// Playback layer.
pub trait AnimationSink: Send + Sync {
    fn play(&self, name: &str, duration: Duration);
}

/// Sink for hosts without an animation layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAnimationSink;

impl AnimationSink for NoopAnimationSink {
    fn play(&self, _name: &str, _duration: Duration) {}
}

pub struct AnimationManager {
    config: AnimationConfig,
    sink: Box<dyn AnimationSink>,
    history: VecDeque<PlayedAnimation>,
}

impl std::fmt::Debug for AnimationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationManager")
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

impl AnimationManager {
    pub fn new(config: AnimationConfig, sink: Box<dyn AnimationSink>) -> Self {
        Self {
            history: VecDeque::with_capacity(config.history_len),
            config,
            sink,
        }
    }

    /// Playback length for `name`.
    pub fn duration_for(&self, name: &str) -> Duration {
        let ms = self
            .config
            .durations_ms
            .get(name)
            .copied()
            .unwrap_or(self.config.default_duration_ms);
        Duration::from_millis(ms)
    }

    /// Play a named animation. Blank names are ignored.
    pub fn play(&mut self, name: &str) -> Option<PlayedAnimation> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return None;
        }
        let duration = self.duration_for(&name);
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.sink.play(&name, duration);
        debug!(animation = name.as_str(), duration_ms, "animation played");

        let played = PlayedAnimation {
            command: name,
            duration_ms,
            played_at: Utc::now(),
        };
        if self.config.history_len > 0 {
            while self.history.len() >= self.config.history_len {
                self.history.pop_front();
            }
            self.history.push_back(played.clone());
        }
        Some(played)
    }

    /// Play a push-transport command.
    pub fn execute(&mut self, command: &AnimationCommand) -> Option<PlayedAnimation> {
        self.play(&command.command)
    }

    /// Animation that follows each assistant reply.
    pub fn play_reply(&mut self) -> Option<PlayedAnimation> {
        let name = self.config.reply_animation.clone();
        self.play(&name)
    }

    /// Animation that accompanies the startup greeting.
    pub fn play_greeting(&mut self) -> Option<PlayedAnimation> {
        let name = self.config.greeting_animation.clone();
        self.play(&name)
    }

    /// Most recent commands, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &PlayedAnimation> {
        self.history.iter()
    }
}
