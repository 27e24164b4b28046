//! Stream channel connectors
//!
//! A connector opens one duplex channel for one session and hands back its
//! two halves: a sender for client frames and a stream of decoded server
//! frames. Both halves stop when the supplied `CancellationToken` fires, so
//! tearing a channel down is a single `cancel()`.

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::Stream;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use crate::backend::AuthSource;
use crate::core::{ChatError, ChatResult};

use super::frame::{ClientFrame, StreamFrame};

/// Buffer size for outbound client frames
pub const OUTBOUND_CHANNEL_SIZE: usize = 32;

/// Decoded inbound frames; ends when the channel closes
pub type FrameStream = Pin<Box<dyn Stream<Item = ChatResult<StreamFrame>> + Send>>;

/// The two halves of an established channel
pub struct ChannelParts {
    /// Sender for client frames
    pub outbound: mpsc::Sender<ClientFrame>,
    /// Inbound server frames
    pub inbound: FrameStream,
}

/// Opens stream channels addressed by session id
#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Establish a channel for `session_id`
    ///
    /// Implementations must stop both halves once `cancel` fires.
    async fn connect(&self, session_id: &str, cancel: CancellationToken) -> ChatResult<ChannelParts>;
}

/// WebSocket connector for `{base}/ws/chat/{session_id}`
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    base_url: String,
    auth: AuthSource,
}

impl WebSocketConnector {
    /// Create a connector for a `ws://` or `wss://` base URL
    pub fn new(base_url: impl Into<String>) -> ChatResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("ws://") || base_url.starts_with("wss://")) {
            return Err(ChatError::InvalidConfig(format!(
                "stream URL must be ws(s): {}",
                base_url
            )));
        }
        Ok(Self {
            base_url,
            auth: AuthSource::default(),
        })
    }

    /// Derive the channel base from the REST base (`http` -> `ws`, `https` -> `wss`)
    pub fn from_http_base(http_base: &str) -> ChatResult<Self> {
        Self::new(ws_base_from_http(http_base)?)
    }

    /// Send credentials with the handshake
    pub fn with_auth(mut self, auth: AuthSource) -> Self {
        self.auth = auth;
        self
    }

    /// URL of the channel for a session
    pub fn channel_url(&self, session_id: &str) -> String {
        format!("{}/ws/chat/{}", self.base_url, session_id)
    }
}

#[async_trait]
impl StreamConnector for WebSocketConnector {
    async fn connect(&self, session_id: &str, cancel: CancellationToken) -> ChatResult<ChannelParts> {
        let url = self.channel_url(session_id);
        let auth = self.auth.get_auth().await?;

        let mut request = url.as_str().into_client_request()?;
        for (name, value) in auth.headers() {
            let value = HeaderValue::from_str(&value)
                .map_err(|e| ChatError::InvalidConfig(format!("invalid {} header: {}", name, e)))?;
            request.headers_mut().insert(name, value);
        }

        tracing::debug!(session_id = %session_id, url = %url, "Opening stream channel");
        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| ChatError::Connect(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<ClientFrame>(OUTBOUND_CHANNEL_SIZE);

        // Writer task: forwards client frames until cancelled or the sender is dropped
        let writer_cancel = cancel.clone();
        let writer_session = session_id.to_string();
        tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    _ = writer_cancel.cancelled() => break,
                    frame = outbound_rx.recv() => frame,
                };
                let Some(frame) = frame else { break };

                let json = match frame.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!(session_id = %writer_session, error = %e, "Dropping unserializable frame");
                        continue;
                    }
                };
                if let Err(e) = write.send(WsMessage::Text(json.into())).await {
                    tracing::warn!(session_id = %writer_session, error = %e, "Failed to send frame");
                    break;
                }
            }
            let _ = write.send(WsMessage::Close(None)).await;
            tracing::debug!(session_id = %writer_session, "Stream writer stopped");
        });

        let reader_session = session_id.to_string();
        let inbound = async_stream::stream! {
            loop {
                let msg = tokio::select! {
                    _ = cancel.cancelled() => break,
                    msg = read.next() => msg,
                };
                match msg {
                    Some(Ok(WsMessage::Text(text))) => match StreamFrame::decode(text.as_str()) {
                        Ok(frame) => yield Ok(frame),
                        Err(e) => {
                            tracing::warn!(session_id = %reader_session, error = %e, "Skipping undecodable frame");
                        }
                    },
                    Some(Ok(WsMessage::Close(_))) | None => {
                        tracing::debug!(session_id = %reader_session, "Stream channel closed by server");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        yield Err(ChatError::from(e));
                        break;
                    }
                }
            }
        };

        Ok(ChannelParts {
            outbound: outbound_tx,
            inbound: Box::pin(inbound),
        })
    }
}

/// Map an `http(s)://` base to its `ws(s)://` counterpart
pub fn ws_base_from_http(http_base: &str) -> ChatResult<String> {
    if let Some(rest) = http_base.strip_prefix("https://") {
        Ok(format!("wss://{}", rest))
    } else if let Some(rest) = http_base.strip_prefix("http://") {
        Ok(format!("ws://{}", rest))
    } else {
        Err(ChatError::InvalidConfig(format!(
            "cannot derive stream URL from {}",
            http_base
        )))
    }
}
