//! # Connection Registry
//!
//! The only in-process shared mutable state of the service. Three indexes over live
//! [`Connection`]s, each a `DashMap` so registration, pruning and fan-out never contend
//! on a global lock:
//!
//! | Index | Key | Who is in it |
//! |-------|-----|--------------|
//! | agents | `AgentId` | every connection an agent has open |
//! | deliveries | `DeliveryId` | subscribers of that delivery (buyer, admins who joined) |
//! | admins | – | every admin connection, see [`admin`] |
//!
//! Each registration spawns a watcher that waits for the transport to drop its receiver
//! and removes the connection; an index entry is removed with its last connection.
//! Sends are best effort: a closed connection is pruned on the spot, a full one loses
//! the event, and nothing is queued for redelivery.
//!
//! The registry also remembers which agent holds which live delivery, so a reconnecting
//! agent can be told what it is working on.

pub mod admin;
pub mod connection;

pub use admin::AdminFanout;
pub use connection::{Connection, ConnectionId, SendOutcome};

use crate::model::{AgentId, DeliveryId, ServerEvent, Topic};
use dashmap::DashMap;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Typed publish interface used by the lifecycle and tracking components.
///
/// Publishing never fails: an audience with no live connection simply receives nothing.
pub trait EventPublisher: Send + Sync {
    /// Sends `event` to `topic`. Returns how many connections accepted it.
    fn publish(&self, topic: Topic, event: ServerEvent) -> usize;

    /// Records `agent_id` as the holder of a live delivery.
    fn register_delivery(&self, delivery_id: DeliveryId, agent_id: AgentId);

    /// Forgets the holder of a delivery that reached a terminal state.
    fn release_delivery(&self, delivery_id: &DeliveryId);
}

type ConnectionSet = HashMap<ConnectionId, Connection>;

#[derive(Default)]
struct Indexes {
    agents: DashMap<AgentId, ConnectionSet>,
    deliveries: DashMap<DeliveryId, ConnectionSet>,
    admins: AdminFanout,
    assignments: DashMap<DeliveryId, AgentId>,
}

/// Cheap to clone; clones share the same indexes.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Indexes>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_agent_connection(&self, agent_id: AgentId, conn: Connection) {
        debug!(%agent_id, connection = %conn.id(), "Agent connection registered");
        insert(&self.inner.agents, agent_id.clone(), conn.clone());
        self.watch(conn, move |indexes, id| {
            if prune(&indexes.agents, &agent_id, id) {
                debug!(%agent_id, connection = %id, "Agent connection closed");
            }
        });
    }

    pub fn register_subscriber(&self, delivery_id: DeliveryId, conn: Connection) {
        debug!(%delivery_id, connection = %conn.id(), "Subscriber registered");
        insert(&self.inner.deliveries, delivery_id, conn.clone());
        self.watch(conn, move |indexes, id| {
            if prune(&indexes.deliveries, &delivery_id, id) {
                debug!(%delivery_id, connection = %id, "Subscriber closed");
            }
        });
    }

    pub fn register_admin(&self, conn: Connection) {
        debug!(connection = %conn.id(), "Admin connection registered");
        self.inner.admins.insert(conn.clone());
        self.watch(conn, |indexes, id| {
            if indexes.admins.remove(id) {
                debug!(connection = %id, "Admin connection closed");
            }
        });
    }

    /// Removes a subscriber that left a delivery while staying connected.
    pub fn unsubscribe(&self, delivery_id: &DeliveryId, id: ConnectionId) -> bool {
        prune(&self.inner.deliveries, delivery_id, id)
    }

    pub fn broadcast_to_delivery(&self, delivery_id: &DeliveryId, event: &ServerEvent) -> usize {
        fan_out(&self.inner.deliveries, delivery_id, event)
    }

    pub fn broadcast_to_agent(&self, agent_id: &AgentId, event: &ServerEvent) -> usize {
        fan_out(&self.inner.agents, agent_id, event)
    }

    pub fn broadcast_to_admins(&self, event: &ServerEvent) -> usize {
        self.inner.admins.broadcast(event)
    }

    /// Live deliveries held by `agent_id`.
    pub fn deliveries_for_agent(&self, agent_id: &AgentId) -> Vec<DeliveryId> {
        let mut deliveries: Vec<DeliveryId> = self
            .inner
            .assignments
            .iter()
            .filter(|entry| entry.value() == agent_id)
            .map(|entry| *entry.key())
            .collect();
        deliveries.sort();
        deliveries
    }

    pub fn assigned_agent(&self, delivery_id: &DeliveryId) -> Option<AgentId> {
        self.inner
            .assignments
            .get(delivery_id)
            .map(|agent| agent.value().clone())
    }

    pub fn subscriber_count(&self, delivery_id: &DeliveryId) -> usize {
        self.inner
            .deliveries
            .get(delivery_id)
            .map(|set| set.len())
            .unwrap_or(0)
    }

    pub fn agent_connection_count(&self, agent_id: &AgentId) -> usize {
        self.inner.agents.get(agent_id).map(|set| set.len()).unwrap_or(0)
    }

    pub fn admin_count(&self) -> usize {
        self.inner.admins.len()
    }

    /// Number of deliveries with at least one subscriber.
    pub fn watched_deliveries(&self) -> usize {
        self.inner.deliveries.len()
    }

    /// Spawns the task that prunes `conn` once its transport is gone.
    fn watch<F>(&self, conn: Connection, on_close: F)
    where
        F: FnOnce(&Indexes, ConnectionId) + Send + 'static,
    {
        let indexes: Weak<Indexes> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            conn.closed().await;
            if let Some(indexes) = indexes.upgrade() {
                on_close(&indexes, conn.id());
            }
        });
    }
}

impl EventPublisher for ConnectionRegistry {
    fn publish(&self, topic: Topic, event: ServerEvent) -> usize {
        let reached = match &topic {
            Topic::Delivery(delivery_id) => self.broadcast_to_delivery(delivery_id, &event),
            Topic::Agent(agent_id) => self.broadcast_to_agent(agent_id, &event),
            Topic::Admins => self.broadcast_to_admins(&event),
        };
        trace!(?topic, event = event.event_type(), reached, "Published");
        reached
    }

    fn register_delivery(&self, delivery_id: DeliveryId, agent_id: AgentId) {
        self.inner.assignments.insert(delivery_id, agent_id);
    }

    fn release_delivery(&self, delivery_id: &DeliveryId) {
        self.inner.assignments.remove(delivery_id);
    }
}

fn insert<K: Eq + Hash>(index: &DashMap<K, ConnectionSet>, key: K, conn: Connection) {
    index.entry(key).or_default().insert(conn.id(), conn);
}

/// Removes one connection and drops the key once its set is empty.
fn prune<K: Eq + Hash>(index: &DashMap<K, ConnectionSet>, key: &K, id: ConnectionId) -> bool {
    let removed = match index.get_mut(key) {
        Some(mut set) => set.remove(&id).is_some(),
        None => false,
    };
    index.remove_if(key, |_, set| set.is_empty());
    removed
}

fn fan_out<K: Eq + Hash>(index: &DashMap<K, ConnectionSet>, key: &K, event: &ServerEvent) -> usize {
    // Snapshot first so no shard lock is held while sending.
    let targets: Vec<Connection> = match index.get(key) {
        Some(set) => set.values().cloned().collect(),
        None => return 0,
    };

    let mut delivered = 0;
    for conn in targets {
        match conn.send(event.clone()) {
            SendOutcome::Delivered => delivered += 1,
            SendOutcome::Dropped => {}
            SendOutcome::Closed => {
                prune(index, key, conn.id());
            }
        }
    }
    delivered
}
