//! Wake-word gate and stop-token interrupt detection.
//!
//! Both checks run on every transcript event, partial or final, so that
//! activation and interruption latency is bounded by the recognizer rather
//! than by end-of-utterance detection.
//!
//! Matching is done on a normalized form of the text: lower-cased, with
//! punctuation removed and whitespace collapsed. STT engines disagree on
//! punctuation ("Hey, Jarvis." vs "hey jarvis"), so the raw string is never
//! compared directly.

use crate::config::ConversationConfig;

/// Lower-case, strip punctuation, and collapse whitespace.
///
/// For example, `"  Hey, JARVIS!  "` becomes `"hey jarvis"`.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stateless matcher for the configured activation phrases.
#[derive(Debug, Clone)]
pub struct WakeWordGate {
    /// Normalized, non-empty phrases.
    phrases: Vec<String>,
    /// Normalized interrupt token.
    stop_word: String,
}

impl WakeWordGate {
    /// Build a gate from raw phrases. Empty phrases are dropped.
    pub fn new<I, S>(phrases: I, stop_word: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| normalize(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            phrases,
            stop_word: normalize(stop_word),
        }
    }

    /// Build a gate from the conversation section of the config.
    pub fn from_config(config: &ConversationConfig) -> Self {
        Self::new(&config.wake_phrases, &config.stop_word)
    }

    /// Whether the transcript contains any activation phrase.
    pub fn matches(&self, transcript: &str) -> bool {
        let text = normalize(transcript);
        !text.is_empty() && self.phrases.iter().any(|p| text.contains(p.as_str()))
    }

    /// Whether the transcript consists of nothing but an activation phrase.
    ///
    /// Used to reject the tail end of a wake phrase that the recognizer
    /// reports again after the gate has already opened.
    pub fn is_wake_phrase(&self, transcript: &str) -> bool {
        let text = normalize(transcript);
        self.phrases.iter().any(|p| *p == text)
    }

    /// Whether the transcript contains the interrupt token as a whole word.
    ///
    /// "stop" and "Stop!" match; "stopwatch" does not.
    pub fn is_interrupt(&self, transcript: &str) -> bool {
        if self.stop_word.is_empty() {
            return false;
        }
        let text = normalize(transcript);
        if self.stop_word.contains(' ') {
            return format!(" {text} ").contains(&format!(" {} ", self.stop_word));
        }
        text.split_whitespace().any(|w| w == self.stop_word)
    }

    /// Remainder of the transcript after a leading activation phrase.
    ///
    /// Returns `None` when the transcript does not start with one. The
    /// longest matching phrase wins, so "hey jarvis" is removed whole rather
    /// than leaving "hey" behind for "jarvis".
    pub fn strip_leading(&self, transcript: &str) -> Option<String> {
        let text = normalize(transcript);
        self.phrases
            .iter()
            .filter(|p| text.starts_with(&format!("{p} ")))
            .max_by_key(|p| p.len())
            .map(|p| text[p.len()..].trim().to_owned())
    }

    /// Number of configured phrases.
    pub fn phrase_count(&self) -> usize {
        self.phrases.len()
    }
}
