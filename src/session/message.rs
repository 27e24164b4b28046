//! Conversation message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error_content;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Unique within its session
    pub id: String,

    pub role: Role,

    /// Text of the turn; only the newest assistant message grows while streaming
    pub content: String,

    /// Creation time, never updated
    pub timestamp: DateTime<Utc>,

    /// Agent that produced an assistant reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>, agent: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            agent,
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, None)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>, agent: Option<String>) -> Self {
        Self::new(Role::Assistant, content, agent)
    }

    /// Create an assistant message carrying an error
    pub fn assistant_error(text: impl AsRef<str>, agent: Option<String>) -> Self {
        Self::new(Role::Assistant, error_content(text), agent)
    }

    /// Create an empty assistant message that streamed chunks will fill
    pub fn placeholder(agent: Option<String>) -> Self {
        Self::new(Role::Assistant, String::new(), agent)
    }

    /// Copy of this message with `fragment` appended to its content
    pub fn extended(&self, fragment: &str) -> Self {
        let mut content = String::with_capacity(self.content.len() + fragment.len());
        content.push_str(&self.content);
        content.push_str(fragment);
        Self {
            content,
            ..self.clone()
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// Whether the content is an in-band error
    pub fn is_error(&self) -> bool {
        self.is_assistant() && self.content.starts_with(crate::core::ERROR_PREFIX)
    }
}
