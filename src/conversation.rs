//! Conversation log.
//!
//! Append-only ordered store of user and assistant messages. The only
//! removals are [`ConversationLog::undo`] (last entry) and
//! [`ConversationLog::clear`] (everything). Nothing is persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who said it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A logged message. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Monotonic id assigned on append.
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ConversationLog {
    messages: Vec<ConversationMessage>,
    next_id: u64,
}

impl ConversationLog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            next_id: 1,
        }
    }

    /// Append a message and return a copy of the stored entry.
    pub fn push(&mut self, role: Role, content: impl Into<String>) -> ConversationMessage {
        let message = ConversationMessage {
            id: self.next_id,
            role,
            content: content.into(),
            timestamp: Utc::now(),
        };
        self.next_id += 1;
        self.messages.push(message.clone());
        message
    }

    /// Remove the last message. No-op on an empty log.
    pub fn undo(&mut self) -> Option<ConversationMessage> {
        self.messages.pop()
    }

    /// Remove everything and restart id numbering.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.next_id = 1;
    }

    #[must_use]
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Owned, ordered copy for a display layer.
    #[must_use]
    pub fn export(&self) -> Vec<ConversationMessage> {
        self.messages.clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<&ConversationMessage> {
        self.messages.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let mut log = ConversationLog::new();
        let a = log.push(Role::User, "hello");
        let b = log.push(Role::Assistant, "hi");
        assert!(b.id > a.id);
        assert!(b.timestamp >= a.timestamp);
    }

    #[test]
    fn undo_removes_exactly_the_last_entry() {
        let mut log = ConversationLog::new();
        let m1 = log.push(Role::User, "m1");
        log.push(Role::Assistant, "m2");

        let removed = log.undo().unwrap();
        assert_eq!(removed.content, "m2");
        assert_eq!(log.messages(), &[m1]);
    }

    #[test]
    fn undo_on_empty_is_noop() {
        let mut log = ConversationLog::new();
        assert!(log.undo().is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn ids_keep_increasing_after_undo() {
        let mut log = ConversationLog::new();
        log.push(Role::User, "a");
        log.undo();
        let b = log.push(Role::User, "b");
        assert_eq!(b.id, 2);
    }

    #[test]
    fn clear_restarts_numbering() {
        let mut log = ConversationLog::new();
        log.push(Role::User, "a");
        log.push(Role::Assistant, "b");
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.push(Role::User, "c").id, 1);
    }

    #[test]
    fn export_serializes_lowercase_roles() {
        let mut log = ConversationLog::new();
        log.push(Role::Assistant, "Welcome.");
        let json = serde_json::to_value(log.export()).unwrap();
        assert_eq!(json[0]["role"], "assistant");
        assert_eq!(json[0]["id"], 1);
        assert!(json[0]["timestamp"].is_string());
    }
}
