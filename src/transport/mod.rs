//! Stream mode transport
//!
//! This module provides:
//! - `StreamFrame` / `ClientFrame` - The typed frames exchanged over a channel
//! - `StreamConnector` - Opens a channel for a session (`WebSocketConnector` in production)
//! - `StreamChannel` - One open channel with explicit teardown

pub mod channel;
pub mod connector;
pub mod frame;

pub use channel::StreamChannel;
pub use connector::{
    ws_base_from_http, ChannelParts, FrameStream, StreamConnector, WebSocketConnector,
    OUTBOUND_CHANNEL_SIZE,
};
pub use frame::{ClientFrame, StreamFrame};
