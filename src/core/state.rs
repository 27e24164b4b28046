//! Chat client state types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::backend::AgentInfo;
use crate::session::ChatSession;

use super::error::ChatError;

/// How user messages are delivered to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// One call per message, one complete reply
    #[default]
    Request,

    /// One long-lived channel per session, replies arrive as frames
    Stream,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionMode::Request => write!(f, "request"),
            ConnectionMode::Stream => write!(f, "stream"),
        }
    }
}

impl FromStr for ConnectionMode {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "request" | "rest" | "http" => Ok(ConnectionMode::Request),
            "stream" | "websocket" | "ws" => Ok(ConnectionMode::Stream),
            other => Err(ChatError::InvalidConfig(format!(
                "unknown connection mode: {}",
                other
            ))),
        }
    }
}

/// Lifecycle of a stream channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelState {
    /// No channel, or the channel has terminated
    #[default]
    Closed,

    /// Connection is being established
    Opening,

    /// Frames can be sent and received
    Open,
}

impl ChannelState {
    /// Check if the channel can carry frames
    pub fn is_open(&self) -> bool {
        matches!(self, ChannelState::Open)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelState::Closed => write!(f, "Closed"),
            ChannelState::Opening => write!(f, "Opening"),
            ChannelState::Open => write!(f, "Open"),
        }
    }
}

/// Snapshot of everything the presentation layer renders
#[derive(Debug, Clone, Default)]
pub struct ChatState {
    /// All known sessions, in store order
    pub sessions: Vec<ChatSession>,

    /// The selected session, if any
    pub current_session: Option<ChatSession>,

    /// Available agents
    pub agents: Vec<AgentInfo>,

    /// Agent used for new sessions and outgoing messages
    pub selected_agent: Option<String>,

    /// Active transport strategy
    pub connection_mode: ConnectionMode,

    /// State of the stream channel
    pub channel_state: ChannelState,

    /// A send is outstanding
    pub is_sending: bool,

    /// Sessions or agents are being loaded
    pub is_loading: bool,
}

impl ChatState {
    /// ID of the selected session
    pub fn current_session_id(&self) -> Option<&str> {
        self.current_session.as_ref().map(|s| s.id.as_str())
    }

    /// Find a session in the list by id
    pub fn session(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }
}
