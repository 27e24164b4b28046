//! Backend client
//!
//! `AgentBackend` abstracts the two REST calls the session manager needs:
//! the agent catalog and the request-mode chat call. `HttpBackend` is the
//! reqwest implementation talking to `/api/agents/*`.

use async_trait::async_trait;
use reqwest::{Client, Response};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{ChatError, ChatResult};

use super::auth::{auth_provider, AuthConfig, AuthProvider, AuthSource};
use super::types::{AgentInfo, ChatRequest, ChatResponse, ErrorDetail};

const AGENTS_LIST_PATH: &str = "/api/agents/list";
const AGENTS_CHAT_PATH: &str = "/api/agents/chat";

/// Backend operations used by the session manager
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Fetch the ordered agent catalog
    async fn list_agents(&self) -> ChatResult<Vec<AgentInfo>>;

    /// Send one message and wait for the complete reply
    async fn chat(&self, request: &ChatRequest) -> ChatResult<ChatResponse>;
}

/// HTTP client for the agent backend
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    auth: AuthSource,
}

impl HttpBackend {
    /// Create a client for the backend at `base_url` (e.g. `http://localhost:8000`)
    pub fn new(base_url: impl Into<String>) -> ChatResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ChatError::InvalidConfig(format!(
                "backend URL must be http(s): {}",
                base_url
            )));
        }
        Ok(Self {
            client: Client::new(),
            base_url,
            auth: AuthSource::default(),
        })
    }

    /// Use static credentials
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = AuthSource::Static(auth);
        self
    }

    /// Fetch credentials from a callback before each request
    pub fn with_auth_provider<F, Fut>(mut self, provider: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ChatResult<AuthConfig>> + Send + 'static,
    {
        self.auth = AuthSource::Dynamic(Arc::new(auth_provider(provider)));
        self
    }

    /// Use a trait object auth provider
    pub fn with_auth_provider_boxed(mut self, provider: Arc<dyn AuthProvider>) -> Self {
        self.auth = AuthSource::Dynamic(provider);
        self
    }

    /// Apply a per-request timeout at the HTTP layer
    pub fn with_timeout(mut self, timeout: Duration) -> ChatResult<Self> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The credential source, shared with the stream connector
    pub fn auth(&self) -> &AuthSource {
        &self.auth
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-success response into `ChatError::Api`
    async fn check(response: Response) -> ChatResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorDetail>(&body)
            .map(|e| e.text())
            .unwrap_or_else(|_| {
                if body.trim().is_empty() {
                    status.to_string()
                } else {
                    body.clone()
                }
            });

        tracing::error!(status = status.as_u16(), detail = %detail, "Backend returned an error");
        Err(ChatError::Api {
            status: status.as_u16(),
            detail,
        })
    }
}

#[async_trait]
impl AgentBackend for HttpBackend {
    async fn list_agents(&self) -> ChatResult<Vec<AgentInfo>> {
        let auth = self.auth.get_auth().await?;
        let url = self.url(AGENTS_LIST_PATH);
        tracing::debug!(url = %url, "Fetching agent catalog");

        let response = auth.apply(self.client.get(&url)).send().await?;
        let agents: Vec<AgentInfo> = Self::check(response).await?.json().await?;

        tracing::info!("Fetched {} agents", agents.len());
        Ok(agents)
    }

    async fn chat(&self, request: &ChatRequest) -> ChatResult<ChatResponse> {
        let auth = self.auth.get_auth().await?;
        let url = self.url(AGENTS_CHAT_PATH);
        tracing::debug!(
            session_id = %request.session_id,
            agent = %request.agent,
            "Sending chat request"
        );

        let response = auth
            .apply(self.client.post(&url))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    tracing::warn!(session_id = %request.session_id, "Chat request timed out");
                }
                ChatError::from(e)
            })?;
        let reply: ChatResponse = Self::check(response).await?.json().await?;

        tracing::debug!(
            session_id = %request.session_id,
            length = reply.message.len(),
            "Received chat reply"
        );
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve exactly one HTTP response, returning the raw request text
    async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });

        (format!("http://{}", addr), handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    #[test]
    fn test_rejects_non_http_url() {
        assert!(HttpBackend::new("ftp://example.com").is_err());
        let backend = HttpBackend::new("http://localhost:8000/").unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8000");
    }

    #[tokio::test]
    async fn test_list_agents() {
        let body = r#"[{"name":"alpha","description":"A","capabilities":["chat"],"status":"active"},{"name":"beta"}]"#;
        let (url, server) = serve_once("200 OK", body).await;

        let backend = HttpBackend::new(url).unwrap();
        let agents = backend.list_agents().await.unwrap();

        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].name, "alpha");
        assert_eq!(agents[1].name, "beta");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/agents/list"));
    }

    #[tokio::test]
    async fn test_chat_sends_body_and_auth() {
        let body = r#"{"message":"hello","agent":"agentX","session_id":"s1","timestamp":"2024-01-01T00:00:00Z"}"#;
        let (url, server) = serve_once("200 OK", body).await;

        let backend = HttpBackend::new(url)
            .unwrap()
            .with_auth(AuthConfig::bearer("tok123"));
        let reply = backend
            .chat(&ChatRequest {
                message: "hi".into(),
                session_id: "s1".into(),
                agent: "agentX".into(),
            })
            .await
            .unwrap();

        assert_eq!(reply.message, "hello");
        assert_eq!(reply.agent.as_deref(), Some("agentX"));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/agents/chat"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer tok123"));
        assert!(request.contains("\"session_id\":\"s1\""));
    }

    #[tokio::test]
    async fn test_chat_error_detail() {
        let (url, server) =
            serve_once("503 Service Unavailable", r#"{"detail":"backend unavailable"}"#).await;

        let backend = HttpBackend::new(url).unwrap();
        let err = backend
            .chat(&ChatRequest {
                message: "hi".into(),
                session_id: "s1".into(),
                agent: "agentX".into(),
            })
            .await
            .unwrap_err();

        match err {
            ChatError::Api { status, detail } => {
                assert_eq!(status, 503);
                assert_eq!(detail, "backend unavailable");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_without_json_body() {
        let (url, server) = serve_once("500 Internal Server Error", "").await;

        let backend = HttpBackend::new(url).unwrap();
        let err = backend.list_agents().await.unwrap_err();
        assert!(matches!(err, ChatError::Api { status: 500, .. }));
        server.await.unwrap();
    }
}
