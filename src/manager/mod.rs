//! Session manager
//!
//! `SessionManager` owns the chat state and drives both transports.

pub mod config;
pub mod manager;

pub use config::ManagerConfig;
pub use manager::{SessionManager, StreamUpdate};
