//! Runtime plumbing shared by the session manager and its subscribers

pub mod channels;

pub use channels::{create_event_channel, emit, EventReceiver, EventSender, EVENT_CHANNEL_SIZE};
