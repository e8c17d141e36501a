//! In-process collaborators backed by `DashMap`.
//!
//! [`MemoryStore`] implements every store trait; [`MemoryAgentDirectory`] derives agent
//! load from the deliveries held by a `MemoryStore`; [`RecordingNotifier`] keeps the
//! notifications it was asked to send. All three are cheap to clone and share state
//! between clones.
//!
//! `MemoryStore` can inject transient failures and latency so retry and timeout paths
//! can be exercised without a real backend.

use super::retry::RetryPolicy;
use super::{
    AgentDirectory, CollectionStore, DeliveryStore, Notifier, OrderStore, PositionStore, StoreError,
    Stores,
};
use crate::model::{
    AgentId, CollectionEntry, Delivery, DeliveryFilter, DeliveryId, LineItem, NewPositionSample,
    Order, OrderId, Page, PositionSample, ProductId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Inner {
    orders: DashMap<OrderId, (Order, Vec<LineItem>)>,
    delivered_orders: DashMap<OrderId, DateTime<Utc>>,
    deliveries: DashMap<DeliveryId, Delivery>,
    deliveries_by_order: DashMap<OrderId, DeliveryId>,
    collections: DashMap<DeliveryId, Vec<CollectionEntry>>,
    positions: DashMap<DeliveryId, Vec<PositionSample>>,
    next_sample_id: AtomicU64,
    pending_failures: AtomicU32,
    rejected_delivery_writes: AtomicU32,
    latency_ms: AtomicU64,
}

/// Orders, deliveries, collection entries and position samples in memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an order and its line items.
    pub fn add_order(&self, order: Order, items: Vec<LineItem>) {
        self.inner.orders.insert(order.id.clone(), (order, items));
    }

    pub fn is_order_delivered(&self, order_id: &OrderId) -> bool {
        self.inner.delivered_orders.contains_key(order_id)
    }

    /// Makes the next `count` calls fail with [`StoreError::Transient`].
    pub fn fail_next(&self, count: u32) {
        self.inner.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` delivery inserts or updates fail with
    /// [`StoreError::Backend`], which is never retried.
    pub fn reject_delivery_writes(&self, count: u32) {
        self.inner.rejected_delivery_writes.store(count, Ordering::SeqCst);
    }

    /// Delays every subsequent call.
    pub fn set_latency(&self, latency: Duration) {
        self.inner
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Live deliveries currently assigned to `agent_id`.
    pub fn live_load(&self, agent_id: &AgentId) -> usize {
        self.inner
            .deliveries
            .iter()
            .filter(|d| !d.status.is_terminal() && d.agent_id.as_ref() == Some(agent_id))
            .count()
    }

    pub fn sample_count(&self, delivery_id: &DeliveryId) -> usize {
        self.inner
            .positions
            .get(delivery_id)
            .map(|samples| samples.len())
            .unwrap_or(0)
    }

    async fn check(&self) -> Result<(), StoreError> {
        let latency = self.inner.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        let injected = self
            .inner
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match injected {
            Ok(_) => Err(StoreError::Transient("injected failure".into())),
            Err(_) => Ok(()),
        }
    }

    fn check_delivery_write(&self) -> Result<(), StoreError> {
        let rejected = self
            .inner
            .rejected_delivery_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match rejected {
            Ok(_) => Err(StoreError::Backend("write rejected".into())),
            Err(_) => Ok(()),
        }
    }
}

impl Stores {
    /// Wires every collaborator to in-memory backends sharing `store`.
    pub fn in_memory(
        store: &MemoryStore,
        agents: MemoryAgentDirectory,
        notifier: RecordingNotifier,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            orders: Arc::new(store.clone()),
            agents: Arc::new(agents),
            deliveries: Arc::new(store.clone()),
            collections: Arc::new(store.clone()),
            positions: Arc::new(store.clone()),
            notifier: Arc::new(notifier),
            retry,
        }
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn line_items(&self, order_id: &OrderId) -> Result<Vec<LineItem>, StoreError> {
        self.check().await?;
        Ok(self
            .inner
            .orders
            .get(order_id)
            .map(|entry| entry.1.clone())
            .unwrap_or_default())
    }

    async fn order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        self.check().await?;
        Ok(self.inner.orders.get(order_id).map(|entry| entry.0.clone()))
    }

    async fn mark_delivered(&self, order_id: &OrderId) -> Result<(), StoreError> {
        self.check().await?;
        if !self.inner.orders.contains_key(order_id) {
            return Err(StoreError::Missing(format!("order {order_id}")));
        }
        self.inner
            .delivered_orders
            .entry(order_id.clone())
            .or_insert_with(Utc::now);
        Ok(())
    }
}

#[async_trait]
impl DeliveryStore for MemoryStore {
    async fn insert(&self, delivery: &Delivery) -> Result<(), StoreError> {
        self.check().await?;
        self.check_delivery_write()?;
        if self.inner.deliveries.contains_key(&delivery.id) {
            return Err(StoreError::Conflict(format!("delivery {}", delivery.id)));
        }
        match self.inner.deliveries_by_order.entry(delivery.order_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "order {} already has a delivery",
                delivery.order_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(delivery.id);
                self.inner.deliveries.insert(delivery.id, delivery.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, id: &DeliveryId) -> Result<Option<Delivery>, StoreError> {
        self.check().await?;
        Ok(self.inner.deliveries.get(id).map(|d| d.clone()))
    }

    async fn find_by_order(&self, order_id: &OrderId) -> Result<Option<Delivery>, StoreError> {
        self.check().await?;
        let Some(id) = self.inner.deliveries_by_order.get(order_id).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.inner.deliveries.get(&id).map(|d| d.clone()))
    }

    async fn update(&self, delivery: &Delivery) -> Result<(), StoreError> {
        self.check().await?;
        self.check_delivery_write()?;
        match self.inner.deliveries.get_mut(&delivery.id) {
            Some(mut stored) => {
                *stored = delivery.clone();
                Ok(())
            }
            None => Err(StoreError::Missing(format!("delivery {}", delivery.id))),
        }
    }

    async fn list(&self, filter: &DeliveryFilter, page: Page) -> Result<Vec<Delivery>, StoreError> {
        self.check().await?;
        let mut matching: Vec<Delivery> = self
            .inner
            .deliveries
            .iter()
            .filter(|d| filter.matches(d.value()))
            .map(|d| d.value().clone())
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(matching
            .into_iter()
            .skip(page.offset())
            .take(page.size)
            .collect())
    }
}

#[async_trait]
impl CollectionStore for MemoryStore {
    async fn insert_batch(&self, entries: &[CollectionEntry]) -> Result<(), StoreError> {
        self.check().await?;
        let Some(first) = entries.first() else {
            return Ok(());
        };
        let delivery_id = first.delivery_id;
        if entries.iter().any(|e| e.delivery_id != delivery_id) {
            return Err(StoreError::Backend(
                "a batch must target a single delivery".into(),
            ));
        }
        let mut seen = HashSet::new();
        if !entries.iter().all(|e| seen.insert(&e.product_id)) {
            return Err(StoreError::Conflict(format!(
                "duplicate product in batch for delivery {delivery_id}"
            )));
        }

        match self.inner.collections.entry(delivery_id) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "collection entries already exist for delivery {delivery_id}"
            ))),
            Entry::Vacant(slot) => {
                slot.insert(entries.to_vec());
                Ok(())
            }
        }
    }

    async fn get(
        &self,
        delivery_id: &DeliveryId,
        product_id: &ProductId,
    ) -> Result<Option<CollectionEntry>, StoreError> {
        self.check().await?;
        Ok(self.inner.collections.get(delivery_id).and_then(|entries| {
            entries
                .iter()
                .find(|e| &e.product_id == product_id)
                .cloned()
        }))
    }

    async fn entries(&self, delivery_id: &DeliveryId) -> Result<Vec<CollectionEntry>, StoreError> {
        self.check().await?;
        Ok(self
            .inner
            .collections
            .get(delivery_id)
            .map(|entries| entries.clone())
            .unwrap_or_default())
    }

    async fn update(&self, entry: &CollectionEntry) -> Result<(), StoreError> {
        self.check().await?;
        let missing = || {
            StoreError::Missing(format!(
                "collection entry {}/{}",
                entry.delivery_id, entry.product_id
            ))
        };
        let mut entries = self
            .inner
            .collections
            .get_mut(&entry.delivery_id)
            .ok_or_else(missing)?;
        let stored = entries
            .iter_mut()
            .find(|e| e.product_id == entry.product_id)
            .ok_or_else(missing)?;
        *stored = entry.clone();
        Ok(())
    }
}

#[async_trait]
impl PositionStore for MemoryStore {
    async fn append(&self, sample: NewPositionSample) -> Result<PositionSample, StoreError> {
        self.check().await?;
        let id = self.inner.next_sample_id.fetch_add(1, Ordering::SeqCst) + 1;
        let sample = PositionSample::from_new(id, sample);
        self.inner
            .positions
            .entry(sample.delivery_id)
            .or_default()
            .push(sample.clone());
        Ok(sample)
    }

    async fn latest(&self, delivery_id: &DeliveryId) -> Result<Option<PositionSample>, StoreError> {
        self.check().await?;
        Ok(self.inner.positions.get(delivery_id).and_then(|samples| {
            samples
                .iter()
                .max_by(|a, b| a.recorded_at.cmp(&b.recorded_at).then(a.id.cmp(&b.id)))
                .cloned()
        }))
    }
}

#[derive(Debug, Clone)]
struct AgentRecord {
    name: String,
    courier: bool,
    available: bool,
}

/// Agent directory whose load figures come from a [`MemoryStore`].
#[derive(Clone)]
pub struct MemoryAgentDirectory {
    agents: Arc<DashMap<AgentId, AgentRecord>>,
    store: MemoryStore,
}

impl MemoryAgentDirectory {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            agents: Arc::new(DashMap::new()),
            store,
        }
    }

    /// Registers an available courier.
    pub fn add_courier(&self, agent_id: AgentId, name: impl Into<String>) {
        self.agents.insert(
            agent_id,
            AgentRecord {
                name: name.into(),
                courier: true,
                available: true,
            },
        );
    }

    /// Registers an account without the courier capability.
    pub fn add_non_courier(&self, agent_id: AgentId, name: impl Into<String>) {
        self.agents.insert(
            agent_id,
            AgentRecord {
                name: name.into(),
                courier: false,
                available: false,
            },
        );
    }

    pub fn set_available(&self, agent_id: &AgentId, available: bool) {
        if let Some(mut record) = self.agents.get_mut(agent_id) {
            record.available = available;
        }
    }
}

#[async_trait]
impl AgentDirectory for MemoryAgentDirectory {
    async fn find_least_loaded(&self) -> Result<Option<AgentId>, StoreError> {
        self.store.check().await?;
        let candidates: Vec<AgentId> = self
            .agents
            .iter()
            .filter(|record| record.courier && record.available)
            .map(|record| record.key().clone())
            .collect();
        Ok(candidates
            .into_iter()
            .min_by_key(|agent| (self.store.live_load(agent), agent.clone())))
    }

    async fn is_courier(&self, agent_id: &AgentId) -> Result<bool, StoreError> {
        self.store.check().await?;
        Ok(self
            .agents
            .get(agent_id)
            .map(|record| record.courier)
            .unwrap_or(false))
    }

    async fn agent_name(&self, agent_id: &AgentId) -> Result<Option<String>, StoreError> {
        self.store.check().await?;
        Ok(self.agents.get(agent_id).map(|record| record.name.clone()))
    }
}

/// A notification the [`RecordingNotifier`] was asked to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCode {
    pub contact: String,
    pub code: String,
    pub summary: String,
}

/// Notifier that keeps every message instead of sending it.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentCode>>>,
    failing: Arc<std::sync::atomic::AtomicBool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentCode> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Makes every subsequent send fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_confirmation_code(
        &self,
        contact: &str,
        code: &str,
        summary: &str,
    ) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("notification gateway unreachable".into()));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| StoreError::Backend("notifier poisoned".into()))?;
        sent.push(SentCode {
            contact: contact.to_string(),
            code: code.to_string(),
            summary: summary.to_string(),
        });
        Ok(())
    }
}
