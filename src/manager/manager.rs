//! SessionManager - the single owner of chat state
//!
//! The manager holds the session list, the selected session and agent, the
//! transport mode and the open stream channel. Every command completes its
//! persistence and in-memory update before returning, and every change is
//! broadcast as a `StateEvent`.
//!
//! # Request mode
//!
//! `send_message` appends the user turn, awaits one backend call and appends
//! the reply (or an in-band `"Error: ..."` message).
//!
//! # Stream mode
//!
//! `send_message` appends the user turn together with an empty assistant
//! placeholder, then sends the frame and returns. Replies arrive later: the
//! caller drives them with `next_stream_update` + `handle_stream_update`
//! (cancel-safe, suited for `tokio::select!`) or with `pump_stream`.
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         line = lines.next_line() => { /* manager.send_message(...) */ }
//!         update = manager.next_stream_update() => manager.handle_stream_update(update).await,
//!     }
//! }
//! ```

use std::sync::Arc;

use crate::backend::{AgentBackend, ChatRequest};
use crate::core::{
    error_content, ChannelState, ChatError, ChatResult, ChatState, ConnectionMode, StateEvent,
};
use crate::runtime::{create_event_channel, emit, EventReceiver, EventSender};
use crate::session::{ChatMessage, ChatSession, SessionStore};
use crate::transport::{ClientFrame, StreamChannel, StreamConnector, StreamFrame};

use super::config::ManagerConfig;

/// Something that happened on the stream channel, not yet applied to state
#[derive(Debug)]
pub enum StreamUpdate {
    /// A decoded server frame
    Frame(StreamFrame),
    /// The transport failed
    Failed(ChatError),
    /// The server closed the channel
    Closed,
    /// A turn was in flight and no frame arrived within the stream timeout
    TimedOut,
}

/// The assistant placeholder a streamed reply is filling
#[derive(Debug, Clone)]
struct PendingReply {
    session_id: String,
    message_id: String,
}

/// Controller for sessions, agents and transports
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    backend: Arc<dyn AgentBackend>,
    connector: Arc<dyn StreamConnector>,
    config: ManagerConfig,
    state: ChatState,
    channel: Option<StreamChannel>,
    pending: Option<PendingReply>,
    events: EventSender,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        backend: Arc<dyn AgentBackend>,
        connector: Arc<dyn StreamConnector>,
        config: ManagerConfig,
    ) -> Self {
        let state = ChatState {
            connection_mode: config.connection_mode,
            ..ChatState::default()
        };
        Self {
            store,
            backend,
            connector,
            config,
            state,
            channel: None,
            pending: None,
            events: create_event_channel(),
        }
    }

    /// Current state snapshot
    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Subscribe to state change notifications
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    pub fn current_session(&self) -> Option<&ChatSession> {
        self.state.current_session.as_ref()
    }

    pub fn is_sending(&self) -> bool {
        self.state.is_sending
    }

    /// Whether a stream channel is currently held
    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Replace the in-memory session list with the store's contents
    ///
    /// A store failure is logged and leaves the previous list in place.
    pub async fn load_sessions(&mut self) {
        self.set_loading(true);
        self.refresh_sessions().await;
        self.set_loading(false);
    }

    /// Create a session bound to `agent`, persist it and select it
    pub async fn create_session(&mut self, agent: &str) -> ChatResult<ChatSession> {
        let agent = agent.trim();
        if agent.is_empty() {
            return Err(ChatError::NoAgentSelected);
        }

        let session = ChatSession::new(agent);
        if let Err(e) = self.store.save(&session).await {
            tracing::error!(session_id = %session.id, error = %e, "Failed to persist new session");
            return Err(e);
        }
        tracing::info!(session_id = %session.id, agent = %agent, "Session created");

        if !self.refresh_sessions().await {
            self.commit(session.clone());
            self.notify_sessions_changed();
        }
        self.make_current(session.clone()).await;
        Ok(session)
    }

    /// Select a stored session and adopt its agent
    ///
    /// An unknown id leaves the state untouched.
    pub async fn select_session(&mut self, id: &str) -> ChatResult<()> {
        let session = match self.store.load(id).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                tracing::debug!(session_id = %id, "Session not found");
                return Err(ChatError::SessionNotFound(id.to_string()));
            }
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "Failed to load session");
                return Err(e);
            }
        };
        self.make_current(session).await;
        Ok(())
    }

    /// Delete a session; clears the selection if it was selected
    pub async fn delete_session_by_id(&mut self, id: &str) -> ChatResult<()> {
        if let Err(e) = self.store.delete(id).await {
            tracing::warn!(session_id = %id, error = %e, "Failed to delete session");
            return Err(e);
        }
        tracing::info!(session_id = %id, "Session deleted");

        if !self.refresh_sessions().await {
            self.state.sessions.retain(|s| s.id != id);
            self.notify_sessions_changed();
        }

        if self.state.current_session_id() == Some(id) {
            self.teardown_channel();
            self.abandon_turn();
            self.state.current_session = None;
            self.notify(StateEvent::SessionSelected(None));
        }
        Ok(())
    }

    pub async fn rename_session(&mut self, id: &str, name: &str) -> ChatResult<()> {
        let mut session = match self.state.current_session.as_ref().filter(|s| s.id == id) {
            Some(current) => current.clone(),
            None => self
                .store
                .load(id)
                .await?
                .ok_or_else(|| ChatError::SessionNotFound(id.to_string()))?,
        };

        session.rename(name.trim());
        self.store.save(&session).await?;
        self.commit(session);
        self.notify_sessions_changed();
        Ok(())
    }

    // ========================================================================
    // Agents and mode
    // ========================================================================

    /// Fetch the agent catalog
    ///
    /// Selects the first agent if none is selected yet. A failed fetch is
    /// logged and leaves the catalog and selection unchanged.
    pub async fn load_agents(&mut self) {
        self.set_loading(true);
        match self.backend.list_agents().await {
            Ok(agents) => {
                tracing::info!(count = agents.len(), "Agents loaded");
                let first = agents.first().map(|a| a.name.clone());
                let count = agents.len();
                self.state.agents = agents;
                self.notify(StateEvent::AgentsLoaded { count });
                if self.state.selected_agent.is_none() && first.is_some() {
                    self.set_selected_agent(first);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load agents");
            }
        }
        self.set_loading(false);
    }

    pub fn set_selected_agent(&mut self, agent: Option<String>) {
        if self.state.selected_agent == agent {
            return;
        }
        self.state.selected_agent = agent.clone();
        self.notify(StateEvent::AgentSelected(agent));
    }

    /// Switch transport strategy
    ///
    /// Leaving stream mode closes the channel; entering it opens one for the
    /// selected session.
    pub async fn set_connection_mode(&mut self, mode: ConnectionMode) {
        if self.state.connection_mode == mode {
            return;
        }
        tracing::info!(mode = %mode, "Connection mode changed");
        self.state.connection_mode = mode;
        self.notify(StateEvent::ModeChanged(mode));

        match mode {
            ConnectionMode::Request => self.disconnect_web_socket(),
            ConnectionMode::Stream => self.follow_selection().await,
        }
    }

    // ========================================================================
    // Messages
    // ========================================================================

    /// Send a user message through the active transport
    ///
    /// Does nothing without a selected session. Transport and storage
    /// failures end up in the conversation as error messages; only caller
    /// precondition failures are returned.
    pub async fn send_message(&mut self, content: &str) -> ChatResult<()> {
        if content.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let Some(session) = self.state.current_session.as_ref() else {
            tracing::debug!("No session selected, ignoring send");
            return Ok(());
        };
        let session_id = session.id.clone();
        if self.state.is_sending {
            return Err(ChatError::SendInProgress(session_id));
        }
        let agent = self
            .state
            .selected_agent
            .clone()
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| session.agent.clone());

        match self.state.connection_mode {
            ConnectionMode::Request => self.send_request(session_id, content, agent).await,
            ConnectionMode::Stream => self.send_stream(session_id, content, agent).await,
        }
        Ok(())
    }

    async fn send_request(&mut self, session_id: String, content: &str, agent: String) {
        if let Err(e) = self.add_message(ChatMessage::user(content)).await {
            tracing::error!(session_id = %session_id, error = %e, "Failed to persist user message");
            return;
        }
        self.set_sending(true);

        let request = ChatRequest {
            message: content.to_string(),
            session_id: session_id.clone(),
            agent: agent.clone(),
        };
        let timeout = self.config.request_timeout;
        let reply = match tokio::time::timeout(timeout, self.backend.chat(&request)).await {
            Ok(reply) => reply,
            Err(_) => Err(ChatError::Timeout(timeout)),
        };

        let message = match reply {
            Ok(response) => {
                tracing::debug!(session_id = %session_id, len = response.message.len(), "Reply received");
                let agent = response.agent.filter(|a| !a.is_empty()).unwrap_or(agent);
                ChatMessage::assistant(response.message, Some(agent))
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Chat request failed");
                ChatMessage::assistant_error(e.display_message(), Some(agent))
            }
        };

        if let Err(e) = self.add_message(message).await {
            tracing::error!(session_id = %session_id, error = %e, "Failed to persist reply");
        }
        self.set_sending(false);
    }

    async fn send_stream(&mut self, session_id: String, content: &str, agent: String) {
        let connected = self
            .channel
            .as_ref()
            .map(|c| c.is_open() && c.session_id() == session_id)
            .unwrap_or(false);

        if !connected {
            tracing::warn!(session_id = %session_id, "No open stream channel for send");
            let messages = vec![
                ChatMessage::user(content),
                ChatMessage::assistant_error(ChatError::NotConnected.display_message(), Some(agent)),
            ];
            if let Err(e) = self.append_messages(messages).await {
                tracing::error!(session_id = %session_id, error = %e, "Failed to persist messages");
            }
            return;
        }

        let placeholder = ChatMessage::placeholder(Some(agent.clone()));
        let message_id = placeholder.id.clone();
        if let Err(e) = self.append_messages(vec![ChatMessage::user(content), placeholder]).await {
            tracing::error!(session_id = %session_id, error = %e, "Failed to persist user message");
            return;
        }
        self.pending = Some(PendingReply {
            session_id: session_id.clone(),
            message_id,
        });
        self.set_sending(true);

        let sent = match self.channel.as_ref() {
            Some(channel) => channel.send(ClientFrame::new(content, agent)).await,
            None => Err(ChatError::NotConnected),
        };
        if let Err(e) = sent {
            tracing::warn!(session_id = %session_id, error = %e, "Failed to send over stream channel");
            self.finish_turn_with_error(&e.display_message(), None).await;
            self.teardown_channel();
        }
    }

    /// Append a message to the selected session and persist it
    ///
    /// Rejected while a streamed reply is filling the session's last message.
    pub async fn add_message(&mut self, message: ChatMessage) -> ChatResult<()> {
        if let Some(pending) = self.pending.as_ref().filter(|_| self.turn_in_flight()) {
            return Err(ChatError::SendInProgress(pending.session_id.clone()));
        }
        self.append_messages(vec![message]).await
    }

    /// Append `fragment` to the content of the selected session's last message
    ///
    /// The message is replaced by an extended copy. Does nothing when there
    /// is no selected session or it has no messages.
    pub async fn update_last_message(&mut self, fragment: &str) -> ChatResult<()> {
        self.rewrite_last(|session| session.extend_last(fragment).is_some())
            .await
    }

    // ========================================================================
    // Stream channel
    // ========================================================================

    /// Open a stream channel for the selected session
    ///
    /// Any existing channel is closed first. Does nothing without a selected
    /// session.
    pub async fn connect_web_socket(&mut self) -> ChatResult<()> {
        let Some(session_id) = self.state.current_session_id().map(str::to_string) else {
            tracing::debug!("No session selected, not connecting");
            return Ok(());
        };

        self.teardown_channel();
        self.state.channel_state = ChannelState::Opening;
        self.notify(StateEvent::channel(ChannelState::Opening, Some(&session_id)));

        match StreamChannel::open(self.connector.as_ref(), &session_id, self.config.connect_timeout).await {
            Ok(channel) => {
                self.channel = Some(channel);
                self.state.channel_state = ChannelState::Open;
                self.notify(StateEvent::channel(ChannelState::Open, Some(&session_id)));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Failed to open stream channel");
                self.state.channel_state = ChannelState::Closed;
                self.notify(StateEvent::channel(ChannelState::Closed, Some(&session_id)));
                Err(e)
            }
        }
    }

    /// Close the stream channel; closing a closed channel changes nothing
    pub fn disconnect_web_socket(&mut self) {
        self.teardown_channel();
    }

    /// Wait for the next stream channel update
    ///
    /// Pends forever when no channel is held. While a turn is in flight the
    /// wait is bounded by the stream timeout. Cancel-safe: dropping the
    /// future loses nothing.
    pub async fn next_stream_update(&mut self) -> StreamUpdate {
        let waiting = self.pending.is_some();
        let stream_timeout = self.config.stream_timeout;
        let Some(channel) = self.channel.as_mut() else {
            return std::future::pending().await;
        };

        let next = if waiting {
            match tokio::time::timeout(stream_timeout, channel.next_frame()).await {
                Ok(next) => next,
                Err(_) => return StreamUpdate::TimedOut,
            }
        } else {
            channel.next_frame().await
        };

        match next {
            Some(Ok(frame)) => StreamUpdate::Frame(frame),
            Some(Err(e)) => StreamUpdate::Failed(e),
            None => StreamUpdate::Closed,
        }
    }

    /// Apply a stream channel update to the state
    pub async fn handle_stream_update(&mut self, update: StreamUpdate) {
        match update {
            StreamUpdate::Frame(frame) => self.handle_frame(frame).await,
            StreamUpdate::Failed(e) => {
                tracing::warn!(error = %e, "Stream channel failed");
                self.teardown_channel();
            }
            StreamUpdate::Closed => {
                tracing::info!("Stream channel closed by server");
                self.teardown_channel();
            }
            StreamUpdate::TimedOut => {
                let error = ChatError::Timeout(self.config.stream_timeout);
                tracing::warn!(error = %error, "Streamed reply timed out");
                self.finish_turn_with_error(&error.display_message(), None)
                    .await;
            }
        }
    }

    /// Wait for and apply one stream update; false when no channel is held
    ///
    /// Not cancel-safe once a frame has been received.
    pub async fn pump_stream(&mut self) -> bool {
        if self.channel.is_none() {
            return false;
        }
        let update = self.next_stream_update().await;
        self.handle_stream_update(update).await;
        true
    }

    /// Apply one server frame
    pub async fn handle_frame(&mut self, frame: StreamFrame) {
        match frame {
            StreamFrame::Chunk { content, agent } => {
                if !self.awaiting_reply() {
                    tracing::debug!(len = content.len(), "Dropping chunk with no turn in flight");
                    return;
                }
                let result = self
                    .rewrite_last(|session| {
                        if let (Some(agent), Some(last)) = (agent, session.messages.last_mut()) {
                            last.agent = Some(agent);
                        }
                        session.extend_last(&content).is_some()
                    })
                    .await;
                if let Err(e) = result {
                    tracing::error!(error = %e, "Failed to persist streamed chunk");
                }
            }
            StreamFrame::Complete { agent } => {
                if !self.turn_in_flight() {
                    tracing::debug!("Ignoring completion with no turn in flight");
                    return;
                }
                if let Some(agent) = agent.filter(|_| self.awaiting_reply()) {
                    let result = self
                        .rewrite_last(|session| match session.messages.last_mut() {
                            Some(last) if last.agent.as_deref() != Some(agent.as_str()) => {
                                last.agent = Some(agent);
                                session.touch();
                                true
                            }
                            _ => false,
                        })
                        .await;
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Failed to persist reply agent");
                    }
                }
                self.end_turn();
            }
            StreamFrame::Error { message, agent } => {
                tracing::warn!(error = %message, "Stream error frame");
                self.finish_turn_with_error(&message, agent).await;
            }
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Open, close or keep the channel so it matches the selection and mode
    async fn follow_selection(&mut self) {
        let current = self.state.current_session_id().map(str::to_string);
        let bound = self
            .channel
            .as_ref()
            .filter(|c| c.is_open())
            .map(|c| c.session_id().to_string());

        match (self.state.connection_mode, current) {
            (ConnectionMode::Stream, Some(current)) => {
                if bound.as_deref() != Some(current.as_str()) {
                    if let Err(e) = self.connect_web_socket().await {
                        tracing::warn!(session_id = %current, error = %e, "Stream channel unavailable");
                    }
                }
            }
            (_, current) => {
                if self.channel.is_some() && bound != current {
                    self.teardown_channel();
                }
            }
        }
    }

    async fn make_current(&mut self, session: ChatSession) {
        let session_id = session.id.clone();
        let agent = session.agent.clone();
        if self.state.current_session_id() != Some(session_id.as_str()) {
            self.abandon_turn();
        }

        tracing::debug!(session_id = %session_id, "Session selected");
        self.state.current_session = Some(session);
        self.notify(StateEvent::SessionSelected(Some(session_id)));
        self.set_selected_agent(Some(agent));
        self.follow_selection().await;
    }

    /// Close and drop the channel; returns false if there was none
    fn teardown_channel(&mut self) -> bool {
        let Some(mut channel) = self.channel.take() else {
            return false;
        };
        channel.close();
        self.state.channel_state = ChannelState::Closed;
        self.notify(StateEvent::channel(ChannelState::Closed, Some(channel.session_id())));
        self.abandon_turn();
        true
    }

    /// Reload the session list from the store; false on failure
    async fn refresh_sessions(&mut self) -> bool {
        match self.store.list().await {
            Ok(sessions) => {
                tracing::debug!(count = sessions.len(), "Sessions loaded");
                self.state.sessions = sessions;
                self.notify_sessions_changed();
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list sessions");
                false
            }
        }
    }

    async fn append_messages(&mut self, messages: Vec<ChatMessage>) -> ChatResult<()> {
        let Some(current) = self.state.current_session.as_ref() else {
            tracing::debug!("No session selected, dropping message");
            return Ok(());
        };

        let mut updated = current.clone();
        for message in &messages {
            updated.push_message(message.clone());
        }
        self.store.save(&updated).await?;

        let session_id = updated.id.clone();
        self.commit(updated);
        for message in messages {
            self.notify(StateEvent::MessageAppended {
                session_id: session_id.clone(),
                message,
            });
        }
        Ok(())
    }

    /// Edit a copy of the selected session's tail, persist it, then adopt it
    ///
    /// `edit` returns false to leave everything unchanged.
    async fn rewrite_last<F>(&mut self, edit: F) -> ChatResult<()>
    where
        F: FnOnce(&mut ChatSession) -> bool,
    {
        let Some(current) = self.state.current_session.as_ref() else {
            return Ok(());
        };
        if current.is_empty() {
            return Ok(());
        }

        let mut updated = current.clone();
        if !edit(&mut updated) {
            return Ok(());
        }
        self.store.save(&updated).await?;

        let session_id = updated.id.clone();
        let last = updated.last_message().cloned();
        self.commit(updated);
        if let Some(last) = last {
            self.notify(StateEvent::MessageUpdated {
                session_id,
                message_id: last.id,
                content: last.content,
            });
        }
        Ok(())
    }

    /// Adopt a persisted session into the list and, if selected, the selection
    fn commit(&mut self, session: ChatSession) {
        match self.state.sessions.iter_mut().find(|s| s.id == session.id) {
            Some(entry) => *entry = session.clone(),
            None => self.state.sessions.push(session.clone()),
        }
        if self.state.current_session_id() == Some(session.id.as_str()) {
            self.state.current_session = Some(session);
        }
    }

    /// Whether a streamed turn is pending for the selected session
    fn turn_in_flight(&self) -> bool {
        match (&self.pending, self.state.current_session_id()) {
            (Some(pending), Some(current)) => pending.session_id == current,
            _ => false,
        }
    }

    /// Whether the selected session's last message is the in-flight placeholder
    fn awaiting_reply(&self) -> bool {
        match (&self.pending, &self.state.current_session) {
            (Some(pending), Some(session)) => {
                session.id == pending.session_id
                    && session
                        .last_message()
                        .map(|m| m.id == pending.message_id)
                        .unwrap_or(false)
            }
            _ => false,
        }
    }

    /// End the in-flight turn with an error message
    ///
    /// An untouched placeholder is filled with the error; otherwise a new
    /// error message is appended.
    async fn finish_turn_with_error(&mut self, message: &str, agent: Option<String>) {
        let placeholder_empty = self.awaiting_reply()
            && self
                .current_session()
                .and_then(|s| s.last_message())
                .map(|m| m.content.is_empty())
                .unwrap_or(false);

        let result = if placeholder_empty {
            let content = error_content(message);
            self.rewrite_last(|session| {
                if let (Some(agent), Some(last)) = (agent, session.messages.last_mut()) {
                    last.agent = Some(agent);
                }
                session.extend_last(&content).is_some()
            })
            .await
        } else {
            let agent = agent.or_else(|| self.state.selected_agent.clone());
            self.append_messages(vec![ChatMessage::assistant_error(message, agent)])
                .await
        };
        if let Err(e) = result {
            tracing::error!(error = %e, "Failed to persist error message");
        }
        self.end_turn();
    }

    fn end_turn(&mut self) {
        self.pending = None;
        self.set_sending(false);
    }

    /// Forget the in-flight turn without touching its messages
    fn abandon_turn(&mut self) {
        if let Some(pending) = self.pending.take() {
            tracing::debug!(session_id = %pending.session_id, "Abandoning streamed reply");
        }
        self.set_sending(false);
    }

    fn set_sending(&mut self, sending: bool) {
        if self.state.is_sending != sending {
            self.state.is_sending = sending;
            self.notify(StateEvent::SendingChanged(sending));
        }
    }

    fn set_loading(&mut self, loading: bool) {
        if self.state.is_loading != loading {
            self.state.is_loading = loading;
            self.notify(StateEvent::LoadingChanged(loading));
        }
    }

    fn notify_sessions_changed(&self) {
        self.notify(StateEvent::SessionsChanged {
            count: self.state.sessions.len(),
        });
    }

    fn notify(&self, event: StateEvent) {
        emit(&self.events, event);
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("current_session", &self.state.current_session_id())
            .field("connection_mode", &self.state.connection_mode)
            .field("channel", &self.channel)
            .field("is_sending", &self.state.is_sending)
            .finish()
    }
}
