//! A live, addressable channel to one remote party.
//!
//! The registry only ever holds the sending half. The transport owns the
//! `mpsc::Receiver` returned by [`Connection::open`], drains it onto the socket, and drops
//! it when the socket closes; that drop is what the registry's watcher tasks observe.

use crate::model::ServerEvent;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::warn;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Result of a best-effort send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// The outbound queue was full; the event was discarded.
    Dropped,
    /// The transport is gone.
    Closed,
}

/// Sending half of a connection with a bounded outbound queue.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    sender: mpsc::Sender<ServerEvent>,
}

impl Connection {
    /// Opens a connection whose outbound queue holds at most `capacity` events.
    pub fn open(capacity: usize) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let id = ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        (Self { id, sender }, receiver)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues `event` without waiting. A slow reader loses events instead of stalling
    /// the sender.
    pub fn send(&self, event: ServerEvent) -> SendOutcome {
        match self.sender.try_send(event) {
            Ok(()) => SendOutcome::Delivered,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(connection = %self.id, event = event.event_type(), "Outbound queue full, dropping event");
                SendOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Resolves once the transport has dropped its receiver.
    pub async fn closed(&self) {
        self.sender.closed().await
    }
}
