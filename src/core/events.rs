//! State change notifications emitted by the session manager

use serde::{Deserialize, Serialize};

use super::state::{ChannelState, ConnectionMode};
use crate::session::ChatMessage;

/// A change to the chat state that presentation should re-render
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StateEvent {
    /// The session list was replaced or changed
    SessionsChanged {
        /// Number of sessions now in the list
        count: usize,
    },

    /// The selected session changed
    SessionSelected(Option<String>),

    /// A message was appended to a session
    MessageAppended {
        /// Session the message belongs to
        session_id: String,
        /// The new message
        message: ChatMessage,
    },

    /// The last message of a session grew
    MessageUpdated {
        /// Session the message belongs to
        session_id: String,
        /// ID of the updated message
        message_id: String,
        /// Full content after the update
        content: String,
    },

    /// The agent catalog was loaded
    AgentsLoaded {
        /// Number of agents available
        count: usize,
    },

    /// The selected agent changed
    AgentSelected(Option<String>),

    /// The transport strategy changed
    ModeChanged(ConnectionMode),

    /// The stream channel changed state
    ChannelChanged {
        /// New channel state
        state: ChannelState,
        /// Session the channel is bound to
        session_id: Option<String>,
    },

    /// The sending flag changed
    SendingChanged(bool),

    /// The loading flag changed
    LoadingChanged(bool),
}

impl StateEvent {
    /// Create a channel change event
    pub fn channel(state: ChannelState, session_id: Option<&str>) -> Self {
        StateEvent::ChannelChanged {
            state,
            session_id: session_id.map(str::to_string),
        }
    }

    /// Check if this event touches conversation content
    pub fn is_message(&self) -> bool {
        matches!(
            self,
            StateEvent::MessageAppended { .. } | StateEvent::MessageUpdated { .. }
        )
    }
}
