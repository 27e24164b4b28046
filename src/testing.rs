//! In-crate fakes for the backend and stream connector

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::backend::{AgentBackend, AgentInfo, ChatRequest, ChatResponse};
use crate::core::{ChatError, ChatResult};
use crate::session::{ChatSession, MemorySessionStore, SessionStore};
use crate::transport::{ChannelParts, ClientFrame, StreamConnector, StreamFrame, OUTBOUND_CHANNEL_SIZE};

// ============================================================================
// Store
// ============================================================================

/// In-memory store whose writes and listings can be made to fail
#[derive(Default)]
pub struct FailingStore {
    inner: MemorySessionStore,
    fail_save: AtomicBool,
    fail_list: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_save(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    fn disk_full() -> ChatError {
        ChatError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
    }
}

#[async_trait]
impl SessionStore for FailingStore {
    async fn save(&self, session: &ChatSession) -> ChatResult<()> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(Self::disk_full());
        }
        self.inner.save(session).await
    }

    async fn load(&self, id: &str) -> ChatResult<Option<ChatSession>> {
        self.inner.load(id).await
    }

    async fn list(&self) -> ChatResult<Vec<ChatSession>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Self::disk_full());
        }
        self.inner.list().await
    }

    async fn delete(&self, id: &str) -> ChatResult<()> {
        self.inner.delete(id).await
    }
}

// ============================================================================
// Backend
// ============================================================================

/// Scripted backend: replies are served in the order they were queued
#[derive(Default)]
pub struct MockBackend {
    agents: Mutex<Option<Vec<AgentInfo>>>,
    replies: Mutex<VecDeque<ChatResult<ChatResponse>>>,
    requests: Mutex<Vec<ChatRequest>>,
    delay: Mutex<Option<Duration>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose catalog lists the given agent names
    pub fn with_agents(names: &[&str]) -> Self {
        let backend = Self::new();
        backend.set_agents(
            names
                .iter()
                .map(|n| AgentInfo::new(*n, format!("{} agent", n)))
                .collect(),
        );
        backend
    }

    pub fn set_agents(&self, agents: Vec<AgentInfo>) {
        *self.agents.lock().unwrap() = Some(agents);
    }

    /// Make catalog fetches fail
    pub fn fail_agents(&self) {
        *self.agents.lock().unwrap() = None;
    }

    pub fn push_reply(&self, message: &str, agent: &str) {
        self.replies.lock().unwrap().push_back(Ok(ChatResponse {
            message: message.to_string(),
            agent: Some(agent.to_string()),
            session_id: None,
            timestamp: None,
        }));
    }

    pub fn push_error(&self, error: ChatError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    /// Delay every chat reply
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentBackend for MockBackend {
    async fn list_agents(&self) -> ChatResult<Vec<AgentInfo>> {
        self.agents
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ChatError::Api {
                status: 503,
                detail: "catalog unavailable".to_string(),
            })
    }

    async fn chat(&self, request: &ChatRequest) -> ChatResult<ChatResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self.replies.lock().unwrap().pop_front();
        reply.unwrap_or_else(|| Err(ChatError::other("no reply queued")))
    }
}

// ============================================================================
// Stream connector
// ============================================================================

/// Connector that hands out in-process channels
#[derive(Default)]
pub struct MockConnector {
    connections: Mutex<Vec<MockConnection>>,
    fail: AtomicBool,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector whose connects always fail
    pub fn failing() -> Self {
        let connector = Self::new();
        connector.set_failing(true);
        connector
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Server end of the `index`-th connection
    pub fn connection(&self, index: usize) -> MockConnection {
        self.connections.lock().unwrap()[index].clone()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }
}

#[async_trait]
impl StreamConnector for MockConnector {
    async fn connect(&self, session_id: &str, cancel: CancellationToken) -> ChatResult<ChannelParts> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChatError::Connect("connection refused".to_string()));
        }

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_SIZE);
        let (frames_tx, mut frames_rx) = mpsc::unbounded_channel::<ChatResult<StreamFrame>>();

        let reader_cancel = cancel.clone();
        let inbound = async_stream::stream! {
            loop {
                let item = tokio::select! {
                    _ = reader_cancel.cancelled() => break,
                    item = frames_rx.recv() => item,
                };
                match item {
                    Some(item) => yield item,
                    None => break,
                }
            }
        };

        self.connections.lock().unwrap().push(MockConnection {
            inner: Arc::new(MockConnectionInner {
                session_id: session_id.to_string(),
                frames: Mutex::new(Some(frames_tx)),
                sent: tokio::sync::Mutex::new(outbound_rx),
                cancel,
            }),
        });

        Ok(ChannelParts {
            outbound: outbound_tx,
            inbound: Box::pin(inbound),
        })
    }
}

/// Server end of a mock channel
#[derive(Clone)]
pub struct MockConnection {
    inner: Arc<MockConnectionInner>,
}

struct MockConnectionInner {
    session_id: String,
    frames: Mutex<Option<mpsc::UnboundedSender<ChatResult<StreamFrame>>>>,
    sent: tokio::sync::Mutex<mpsc::Receiver<ClientFrame>>,
    cancel: CancellationToken,
}

impl MockConnection {
    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// Push a frame to the client; false if the client side is gone
    pub fn push(&self, frame: StreamFrame) -> bool {
        self.push_result(Ok(frame))
    }

    /// Push a transport failure to the client
    pub fn push_failure(&self, error: ChatError) -> bool {
        self.push_result(Err(error))
    }

    fn push_result(&self, item: ChatResult<StreamFrame>) -> bool {
        match self.inner.frames.lock().unwrap().as_ref() {
            Some(tx) => tx.send(item).is_ok(),
            None => false,
        }
    }

    /// Close the server side
    pub fn hang_up(&self) {
        self.inner.frames.lock().unwrap().take();
    }

    /// Next frame the client sent, `None` once the client side is gone
    pub async fn next_sent(&self) -> Option<ClientFrame> {
        self.inner.sent.lock().await.recv().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }
}
