//! Channel type definitions for state notifications
//!
//! The session manager owns the sending half of a broadcast channel; any
//! number of presentation components subscribe and re-render on each
//! `StateEvent`. Slow subscribers lag and miss events rather than block the
//! manager, so they should treat a lag as "re-read the whole state".

use tokio::sync::broadcast;

use crate::core::StateEvent;

/// Default buffer size for the event broadcast channel
pub const EVENT_CHANNEL_SIZE: usize = 256;

/// Sender half of the event broadcast channel (owned by the session manager)
pub type EventSender = broadcast::Sender<StateEvent>;

/// Receiver half of the event broadcast channel (used by subscribers)
pub type EventReceiver = broadcast::Receiver<StateEvent>;

/// Create a new event broadcast channel
///
/// Returns the sender. Receivers are created by calling `sender.subscribe()`.
pub fn create_event_channel() -> EventSender {
    let (tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
    tx
}

/// Send an event to all subscribers
///
/// Returns the number of subscribers reached; having none is not an error.
pub fn emit(tx: &EventSender, event: StateEvent) -> usize {
    tx.send(event).unwrap_or(0)
}
