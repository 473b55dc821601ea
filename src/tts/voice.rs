//! Voice ranking.

use serde::{Deserialize, Serialize};

/// An installed synthesis voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    /// Language tag as reported by the engine (e.g. `en-GB`).
    pub lang: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// Pick a voice: first preference that any installed voice name contains,
/// then any voice whose language starts with `language`, else `None`
/// (engine default).
pub fn select_voice<'a>(
    voices: &'a [Voice],
    preferred: &[String],
    language: &str,
) -> Option<&'a Voice> {
    for wanted in preferred {
        let wanted = wanted.to_lowercase();
        if wanted.is_empty() {
            continue;
        }
        if let Some(v) = voices
            .iter()
            .find(|v| v.name.to_lowercase().contains(&wanted))
        {
            return Some(v);
        }
    }

    let language = language.to_lowercase();
    if language.is_empty() {
        return None;
    }
    voices
        .iter()
        .find(|v| v.lang.to_lowercase().starts_with(&language))
}
