//! Stream mode frames
//!
//! The server pushes JSON objects tagged by `type`. They are decoded once
//! here into the closed `StreamFrame` sum type; nothing past this module
//! looks at raw JSON.

use serde::{Deserialize, Serialize};

use crate::core::{ChatError, ChatResult, ERROR_PREFIX};

/// Client to server frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFrame {
    pub message: String,
    pub agent: String,
}

impl ClientFrame {
    pub fn new(message: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            agent: agent.into(),
        }
    }

    pub fn to_json(&self) -> ChatResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Server to client frame
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// Incremental text of the reply in progress
    Chunk {
        content: String,
        agent: Option<String>,
    },

    /// The current turn finished
    Complete { agent: Option<String> },

    /// The current turn failed
    Error {
        message: String,
        agent: Option<String>,
    },
}

/// Frame as it appears on the wire
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    frame_type: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    agent: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl StreamFrame {
    /// Decode one text frame
    ///
    /// A frame without a `type` but with an `error` field is an error frame.
    pub fn decode(text: &str) -> ChatResult<Self> {
        let raw: RawFrame = serde_json::from_str(text)
            .map_err(|e| ChatError::InvalidFrame(format!("{}: {}", e, truncate(text))))?;
        raw.into_frame()
            .ok_or_else(|| ChatError::InvalidFrame(truncate(text)))
    }

    /// Create a chunk frame
    pub fn chunk(content: impl Into<String>) -> Self {
        StreamFrame::Chunk {
            content: content.into(),
            agent: None,
        }
    }

    /// Create a completion frame
    pub fn complete() -> Self {
        StreamFrame::Complete { agent: None }
    }

    /// Create an error frame
    pub fn error(message: impl Into<String>) -> Self {
        StreamFrame::Error {
            message: message.into(),
            agent: None,
        }
    }

    /// Agent named by the frame, if any
    pub fn agent(&self) -> Option<&str> {
        match self {
            StreamFrame::Chunk { agent, .. }
            | StreamFrame::Complete { agent }
            | StreamFrame::Error { agent, .. } => agent.as_deref(),
        }
    }

    /// Check if this frame ends the current turn
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamFrame::Complete { .. } | StreamFrame::Error { .. })
    }
}

impl RawFrame {
    fn into_frame(self) -> Option<StreamFrame> {
        match self.frame_type.as_deref() {
            Some("chunk") => Some(StreamFrame::Chunk {
                content: self.content.unwrap_or_default(),
                agent: self.agent,
            }),
            Some("complete") => Some(StreamFrame::Complete { agent: self.agent }),
            Some("error") => {
                let message = self.error.or(self.content)?;
                Some(error_frame(&message, self.agent))
            }
            None => self.error.map(|message| error_frame(&message, self.agent)),
            Some(_) => None,
        }
    }
}

fn error_frame(message: &str, agent: Option<String>) -> StreamFrame {
    StreamFrame::Error {
        message: strip_error_prefix(message).to_string(),
        agent,
    }
}

/// The server already prefixes some error texts; keep only the detail
fn strip_error_prefix(message: &str) -> &str {
    message.strip_prefix(ERROR_PREFIX).unwrap_or(message)
}

fn truncate(text: &str) -> String {
    text.chars().take(120).collect()
}
