//! Client configuration
//!
//! Settings are read from environment variables, with builder overrides:
//!
//! - `CHAT_API_BASE_URL` - REST base (default `http://localhost:8000`)
//! - `CHAT_WS_BASE_URL` - stream channel base (default derived from the REST base)
//! - `CHAT_API_TOKEN` - bearer token
//! - `CHAT_API_KEY` - service API key
//! - `CHAT_SESSIONS_DIR` - session store directory (default `sessions`)
//! - `CHAT_CONNECTION_MODE` - `request` or `stream` (default `request`)
//! - `CHAT_REQUEST_TIMEOUT_SECS` - request mode timeout (default 300)
//! - `CHAT_STREAM_TIMEOUT_SECS` - idle timeout of a streamed reply (default 300)
//! - `CHAT_CONNECT_TIMEOUT_SECS` - channel opening timeout (default 10)

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{AuthConfig, HttpBackend};
use crate::core::{ChatError, ChatResult, ConnectionMode};
use crate::manager::{ManagerConfig, SessionManager};
use crate::session::FileSessionStore;
use crate::transport::{ws_base_from_http, WebSocketConnector};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const DEFAULT_SESSIONS_DIR: &str = "sessions";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything needed to wire a session manager to a backend
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub ws_base_url: String,
    pub auth: AuthConfig,
    pub sessions_dir: PathBuf,
    pub connection_mode: ConnectionMode,
    pub request_timeout: Duration,
    pub stream_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE.to_string(),
            ws_base_url: "ws://localhost:8000".to_string(),
            auth: AuthConfig::none(),
            sessions_dir: PathBuf::from(DEFAULT_SESSIONS_DIR),
            connection_mode: ConnectionMode::Request,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> ChatResult<Self> {
        tracing::info!("Loading chat client configuration from environment");
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration through a variable lookup function
    pub fn from_lookup<F>(lookup: F) -> ChatResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_base_url = get("CHAT_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        let ws_base_url = match get("CHAT_WS_BASE_URL") {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => ws_base_from_http(&api_base_url)?,
        };

        let auth = AuthConfig {
            bearer_token: get("CHAT_API_TOKEN"),
            api_key: get("CHAT_API_KEY"),
        };

        let connection_mode = match get("CHAT_CONNECTION_MODE") {
            Some(mode) => mode.parse()?,
            None => ConnectionMode::Request,
        };

        let config = Self {
            api_base_url,
            ws_base_url,
            auth,
            sessions_dir: get("CHAT_SESSIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSIONS_DIR)),
            connection_mode,
            request_timeout: secs(&get, "CHAT_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT)?,
            stream_timeout: secs(&get, "CHAT_STREAM_TIMEOUT_SECS", DEFAULT_STREAM_TIMEOUT)?,
            connect_timeout: secs(&get, "CHAT_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT)?,
        };

        tracing::info!(
            api = %config.api_base_url,
            ws = %config.ws_base_url,
            mode = %config.connection_mode,
            sessions_dir = %config.sessions_dir.display(),
            "Chat client configured"
        );
        Ok(config)
    }

    /// Point at another REST base
    ///
    /// The WebSocket base follows along unless it was set explicitly.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> ChatResult<Self> {
        let url = url.into().trim_end_matches('/').to_string();
        let derived = ws_base_from_http(&url)?;
        let was_derived = ws_base_from_http(&self.api_base_url).ok().as_deref() == Some(self.ws_base_url.as_str());

        self.api_base_url = url;
        if was_derived {
            self.ws_base_url = derived;
        }
        Ok(self)
    }

    pub fn with_ws_base_url(mut self, url: impl Into<String>) -> Self {
        self.ws_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_sessions_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sessions_dir = dir.into();
        self
    }

    pub fn with_connection_mode(mut self, mode: ConnectionMode) -> Self {
        self.connection_mode = mode;
        self
    }

    /// The manager-facing subset of this configuration
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig::new()
            .with_connection_mode(self.connection_mode)
            .with_request_timeout(self.request_timeout)
            .with_stream_timeout(self.stream_timeout)
            .with_connect_timeout(self.connect_timeout)
    }

    /// Build a session manager backed by HTTP, WebSocket and on-disk storage
    pub fn build_manager(&self) -> ChatResult<SessionManager> {
        let backend = HttpBackend::new(&self.api_base_url)?.with_auth(self.auth.clone());
        let connector = WebSocketConnector::new(&self.ws_base_url)?.with_auth(backend.auth().clone());
        let store = FileSessionStore::with_dir(&self.sessions_dir);

        Ok(SessionManager::new(
            Arc::new(store),
            Arc::new(backend),
            Arc::new(connector),
            self.manager_config(),
        ))
    }
}

fn secs<G>(get: &G, key: &str, default: Duration) -> ChatResult<Duration>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ChatError::InvalidConfig(format!("{} must be whole seconds, got {:?}", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.ws_base_url, "ws://localhost:8000");
        assert_eq!(config.connection_mode, ConnectionMode::Request);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(config.auth.is_empty());
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("CHAT_API_BASE_URL", "https://chat.example.com/"),
            ("CHAT_API_TOKEN", "tok"),
            ("CHAT_CONNECTION_MODE", "stream"),
            ("CHAT_STREAM_TIMEOUT_SECS", "45"),
            ("CHAT_SESSIONS_DIR", "/tmp/chats"),
        ]))
        .unwrap();

        assert_eq!(config.api_base_url, "https://chat.example.com");
        assert_eq!(config.ws_base_url, "wss://chat.example.com");
        assert_eq!(config.auth.bearer_token.as_deref(), Some("tok"));
        assert_eq!(config.connection_mode, ConnectionMode::Stream);
        assert_eq!(config.stream_timeout, Duration::from_secs(45));
        assert_eq!(config.sessions_dir, PathBuf::from("/tmp/chats"));
    }

    #[test]
    fn test_explicit_ws_base() {
        let config = ClientConfig::from_lookup(lookup(&[("CHAT_WS_BASE_URL", "ws://gateway:9000/")])).unwrap();
        assert_eq!(config.ws_base_url, "ws://gateway:9000");
    }

    #[test]
    fn test_api_base_rederives_ws_base() {
        let config = ClientConfig::default()
            .with_api_base_url("https://chat.example.com/")
            .unwrap();
        assert_eq!(config.api_base_url, "https://chat.example.com");
        assert_eq!(config.ws_base_url, "wss://chat.example.com");
    }

    #[test]
    fn test_api_base_keeps_explicit_ws_base() {
        let config = ClientConfig::from_lookup(lookup(&[("CHAT_WS_BASE_URL", "ws://gateway:9000")]))
            .unwrap()
            .with_api_base_url("https://chat.example.com")
            .unwrap();
        assert_eq!(config.api_base_url, "https://chat.example.com");
        assert_eq!(config.ws_base_url, "ws://gateway:9000");

        let config = ClientConfig::default()
            .with_ws_base_url("ws://edge:7000/")
            .with_api_base_url("http://api:8080")
            .unwrap();
        assert_eq!(config.ws_base_url, "ws://edge:7000");
    }

    #[test]
    fn test_debug_hides_credentials() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("CHAT_API_TOKEN", "secret-token"),
            ("CHAT_API_KEY", "secret-key"),
        ]))
        .unwrap();
        let debug = format!("{:?}", config);

        assert!(!debug.contains("secret-token"));
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("api_base_url"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[("CHAT_REQUEST_TIMEOUT_SECS", "soon")])),
            Err(ChatError::InvalidConfig(_))
        ));
        assert!(ClientConfig::from_lookup(lookup(&[("CHAT_CONNECTION_MODE", "fax")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("CHAT_API_BASE_URL", "localhost")])).is_err());
    }

    #[test]
    fn test_manager_config_subset() {
        let config = ClientConfig::default().with_connection_mode(ConnectionMode::Stream);
        let manager_config = config.manager_config();
        assert_eq!(manager_config.connection_mode, ConnectionMode::Stream);
        assert_eq!(manager_config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[tokio::test]
    async fn test_build_manager() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = ClientConfig::default().with_sessions_dir(temp.path());
        let manager = config.build_manager().unwrap();
        assert!(manager.state().sessions.is_empty());
    }
}
