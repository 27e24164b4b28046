//! Wire types exchanged with the agent backend

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of the agent catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub status: String,
}

impl AgentInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            capabilities: vec!["chat".to_string()],
            status: "active".to_string(),
        }
    }

    /// Check if the agent advertises a capability (e.g. "streaming")
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}

/// Request mode call body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
    pub agent: String,
}

/// Request mode reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Error payload returned by the backend
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    /// Usually a string; validation failures send a structured value
    pub detail: Value,
}

impl ErrorDetail {
    /// Human-readable text of the detail
    pub fn text(&self) -> String {
        match &self.detail {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
