//! Session manager configuration

use std::time::Duration;

use crate::config::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_STREAM_TIMEOUT};
use crate::core::ConnectionMode;

/// Configuration for a SessionManager
///
/// ```ignore
/// let config = ManagerConfig::new()
///     .with_connection_mode(ConnectionMode::Stream)
///     .with_stream_timeout(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Transport strategy the manager starts in
    pub connection_mode: ConnectionMode,

    /// Upper bound on one Request Mode call
    pub request_timeout: Duration,

    /// How long a streamed turn may go without a frame
    pub stream_timeout: Duration,

    /// Upper bound on opening a stream channel
    pub connect_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self {
            connection_mode: ConnectionMode::Request,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connection_mode(mut self, mode: ConnectionMode) -> Self {
        self.connection_mode = mode;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
