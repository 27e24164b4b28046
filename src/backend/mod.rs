//! Agent backend boundary
//!
//! The backend executes agents; this crate only consumes its catalog and
//! request-mode chat endpoints. Stream mode lives in `transport`.

pub mod auth;
pub mod client;
pub mod types;

pub use auth::{auth_provider, AuthConfig, AuthProvider, AuthSource, API_KEY_HEADER};
pub use client::{AgentBackend, HttpBackend};
pub use types::{AgentInfo, ChatRequest, ChatResponse, ErrorDetail};
