//! Chat client SDK
//!
//! Keeps chat sessions with remote agents: a durable session store, request
//! mode (one REST call per message) and stream mode (one WebSocket channel per
//! session, replies arriving as frames), all driven by a `SessionManager`
//! that broadcasts every state change.

pub mod backend;
pub mod config;
pub mod core;
pub mod logging;
pub mod manager;
pub mod runtime;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use backend::{AgentBackend, AgentInfo, AuthConfig, HttpBackend};
pub use config::ClientConfig;
pub use core::{ChannelState, ChatError, ChatResult, ChatState, ConnectionMode, StateEvent};
pub use manager::{ManagerConfig, SessionManager, StreamUpdate};
pub use session::{ChatMessage, ChatSession, FileSessionStore, MemorySessionStore, Role, SessionStore};
pub use transport::{StreamConnector, StreamFrame, WebSocketConnector};
