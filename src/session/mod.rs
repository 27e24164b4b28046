//! Session records and their durable store
//!
//! This module provides `ChatSession` (one conversation bound to one agent),
//! its `ChatMessage` turns, and the `SessionStore` persistence trait with
//! file-backed and in-memory implementations.

pub mod message;
pub mod session;
pub mod storage;

pub use message::{ChatMessage, Role};
pub use session::ChatSession;
pub use storage::{FileSessionStore, MemorySessionStore, SessionStore};
