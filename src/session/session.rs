//! Chat session records
//!
//! A `ChatSession` is one persisted conversation bound to one agent. Its
//! message list only ever grows: messages are appended, and the newest one
//! may have its content extended while a reply streams in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::ChatMessage;

/// A conversation with one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// Unique session ID, immutable after creation
    pub id: String,

    /// Display label
    pub name: String,

    /// Agent this conversation is bound to
    pub agent: String,

    /// Messages in chronological order
    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// When the session last changed
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// Create a new empty session bound to `agent`
    pub fn new(agent: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), agent)
    }

    /// Create a new empty session with a caller-chosen id
    pub fn with_id(id: impl Into<String>, agent: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: default_name(now),
            agent: agent.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Refresh `updated_at`, never moving it backwards
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Append a message
    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.touch();
    }

    /// Replace the last message with a copy whose content has `fragment` appended
    ///
    /// Returns the updated message, or `None` if there are no messages.
    pub fn extend_last(&mut self, fragment: &str) -> Option<&ChatMessage> {
        let last = self.messages.last()?.extended(fragment);
        if let Some(slot) = self.messages.last_mut() {
            *slot = last;
        }
        self.touch();
        self.messages.last()
    }

    /// Rename the session
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}

/// Display label derived from the creation time
fn default_name(created_at: DateTime<Utc>) -> String {
    format!("Chat {}", created_at.format("%Y-%m-%d %H:%M:%S"))
}
