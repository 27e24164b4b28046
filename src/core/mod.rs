//! Core types for the chat client
//!
//! This module provides the fundamental types used throughout the crate:
//! - `ChatState` - Snapshot of everything the presentation renders
//! - `ConnectionMode` / `ChannelState` - Transport selection and channel lifecycle
//! - `StateEvent` - Change notifications
//! - `ChatError` - Error types

pub mod error;
pub mod events;
pub mod state;

pub use error::{error_content, ChatError, ChatResult, ERROR_PREFIX};
pub use events::StateEvent;
pub use state::{ChannelState, ChatState, ConnectionMode};
