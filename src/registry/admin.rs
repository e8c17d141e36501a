//! Admin fan-out: every admin connection receives every lifecycle and progress event,
//! whether or not it joined the delivery.

use super::connection::{Connection, ConnectionId, SendOutcome};
use crate::model::ServerEvent;
use dashmap::DashMap;
use tracing::debug;

#[derive(Default)]
pub struct AdminFanout {
    connections: DashMap<ConnectionId, Connection>,
}

impl AdminFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, conn: Connection) {
        self.connections.insert(conn.id(), conn);
    }

    pub fn remove(&self, id: ConnectionId) -> bool {
        self.connections.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Sends to every admin. Returns how many connections accepted the event.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        let targets: Vec<Connection> = self.connections.iter().map(|c| c.value().clone()).collect();
        let mut delivered = 0;
        for conn in targets {
            match conn.send(event.clone()) {
                SendOutcome::Delivered => delivered += 1,
                SendOutcome::Dropped => {}
                SendOutcome::Closed => {
                    self.remove(conn.id());
                    debug!(connection = %conn.id(), "Pruned closed admin connection");
                }
            }
        }
        delivered
    }
}
