//! StreamChannel - one open stream mode channel
//!
//! A channel instance is bound to exactly one session and is single-use:
//! it is `Open` once constructed and becomes `Closed` for good on `close()`,
//! on drop, or when the server side goes away. Reconnecting means opening a
//! fresh instance.

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::{ChannelState, ChatError, ChatResult};

use super::connector::{FrameStream, StreamConnector};
use super::frame::{ClientFrame, StreamFrame};

/// An open duplex channel for one session
pub struct StreamChannel {
    session_id: String,
    state: ChannelState,
    outbound: Option<mpsc::Sender<ClientFrame>>,
    inbound: Option<FrameStream>,
    cancel: CancellationToken,
}

impl StreamChannel {
    /// Open a channel for `session_id`, giving up after `timeout`
    pub async fn open(
        connector: &dyn StreamConnector,
        session_id: &str,
        timeout: Duration,
    ) -> ChatResult<Self> {
        let cancel = CancellationToken::new();

        let parts = match tokio::time::timeout(timeout, connector.connect(session_id, cancel.clone())).await {
            Ok(Ok(parts)) => parts,
            Ok(Err(e)) => {
                cancel.cancel();
                return Err(e);
            }
            Err(_) => {
                cancel.cancel();
                return Err(ChatError::Timeout(timeout));
            }
        };

        tracing::info!(session_id = %session_id, "Stream channel open");

        Ok(Self {
            session_id: session_id.to_string(),
            state: ChannelState::Open,
            outbound: Some(parts.outbound),
            inbound: Some(parts.inbound),
            cancel,
        })
    }

    /// Session this channel is bound to
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Token that tears the channel down when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Send a client frame
    ///
    /// Fire-and-forget: the reply arrives later through `next_frame`.
    pub async fn send(&self, frame: ClientFrame) -> ChatResult<()> {
        let outbound = match (&self.outbound, self.state) {
            (Some(outbound), ChannelState::Open) => outbound,
            _ => return Err(ChatError::NotConnected),
        };
        outbound
            .send(frame)
            .await
            .map_err(|_| ChatError::ChannelClosed)
    }

    /// Wait for the next inbound frame
    ///
    /// Returns `None` once the channel is closed. A transport error is
    /// returned once, after which the channel yields `None`.
    pub async fn next_frame(&mut self) -> Option<ChatResult<StreamFrame>> {
        let inbound = self.inbound.as_mut()?;
        let next = inbound.next().await;
        if next.is_none() {
            self.mark_closed();
        }
        next
    }

    /// Close the channel; closing a closed channel does nothing
    pub fn close(&mut self) {
        let was_open = self.state != ChannelState::Closed;
        self.cancel.cancel();
        self.mark_closed();
        if was_open {
            tracing::info!(session_id = %self.session_id, "Stream channel closed");
        }
    }

    fn mark_closed(&mut self) {
        self.state = ChannelState::Closed;
        self.outbound = None;
        self.inbound = None;
    }
}

impl Drop for StreamChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for StreamChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamChannel")
            .field("session_id", &self.session_id)
            .field("state", &self.state)
            .finish()
    }
}
