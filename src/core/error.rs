//! Chat client error types

use std::time::Duration;

use thiserror::Error;

/// Prefix that marks an assistant message as a synthesized error
pub const ERROR_PREFIX: &str = "Error: ";

/// Errors that can occur in the chat client
#[derive(Error, Debug)]
pub enum ChatError {
    /// Session not found in the store
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Message content was empty
    #[error("Message is empty")]
    EmptyMessage,

    /// An agent is required but none is selected
    #[error("No agent selected")]
    NoAgentSelected,

    /// A send is already outstanding for the session
    #[error("A message is already being sent for session {0}")]
    SendInProgress(String),

    /// Stream channel is not open
    #[error("Stream channel is not connected")]
    NotConnected,

    /// Stream channel closed unexpectedly
    #[error("Channel closed")]
    ChannelClosed,

    /// Failed to establish the stream channel
    #[error("Failed to connect: {0}")]
    Connect(String),

    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Inbound frame could not be decoded
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned an error payload
    #[error("Backend error ({status}): {detail}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Human-readable `detail` field from the payload
        detail: String,
    },

    /// Operation did not finish in time
    #[error("Timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl ChatError {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        ChatError::Other(msg.into())
    }

    /// Human-readable text for showing the error inside a conversation
    ///
    /// Backend errors surface only their `detail`; everything else uses the
    /// regular display form.
    pub fn display_message(&self) -> String {
        match self {
            ChatError::Api { detail, .. } => detail.clone(),
            ChatError::Timeout(_) => "response timed out".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether this error is a caller precondition failure
    ///
    /// Precondition failures are rejected before any side effect.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ChatError::EmptyMessage | ChatError::NoAgentSelected | ChatError::SendInProgress(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ChatError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ChatError::WebSocket(err.to_string())
    }
}

/// Format text as an in-band error message
pub fn error_content(text: impl AsRef<str>) -> String {
    format!("{}{}", ERROR_PREFIX, text.as_ref())
}

/// Result type alias for chat client operations
pub type ChatResult<T> = Result<T, ChatError>;
