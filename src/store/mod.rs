//! # External Collaborators
//!
//! Everything the core reads or writes outside its own process is behind a trait in this
//! module. The core never caches a [`Delivery`] or [`CollectionEntry`]: each command reads
//! the record, decides, and writes it back.
//!
//! [`Stores`] bundles the collaborators and applies the retry policy from [`retry`] to
//! every call, so component code reads like plain async calls:
//!
//! ```rust,ignore
//! let delivery = stores.delivery(&delivery_id).await?;
//! ```
//!
//! [`memory`] holds in-process implementations used by the demo binary and the tests.

pub mod memory;
pub mod retry;

use crate::model::{
    AgentId, CollectionEntry, Delivery, DeliveryFilter, DeliveryId, LineItem, NewPositionSample,
    Order, OrderId, Page, PositionSample, ProductId,
};
use async_trait::async_trait;
use retry::{with_retry, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A record expected to exist was absent.
    #[error("record not found: {0}")]
    Missing(String),

    /// The backend failed in a way that may succeed on retry.
    #[error("transient store failure: {0}")]
    Transient(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_) | StoreError::Timeout(_))
    }
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn line_items(&self, order_id: &OrderId) -> Result<Vec<LineItem>, StoreError>;
    async fn order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;
    /// Idempotent.
    async fn mark_delivered(&self, order_id: &OrderId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// The available courier with the fewest live deliveries, ties broken arbitrarily.
    async fn find_least_loaded(&self) -> Result<Option<AgentId>, StoreError>;
    async fn is_courier(&self, agent_id: &AgentId) -> Result<bool, StoreError>;
    async fn agent_name(&self, agent_id: &AgentId) -> Result<Option<String>, StoreError>;
}

#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] if the id or the order already has a delivery.
    async fn insert(&self, delivery: &Delivery) -> Result<(), StoreError>;
    async fn get(&self, id: &DeliveryId) -> Result<Option<Delivery>, StoreError>;
    async fn find_by_order(&self, order_id: &OrderId) -> Result<Option<Delivery>, StoreError>;
    /// Fails with [`StoreError::Missing`] if the delivery does not exist.
    async fn update(&self, delivery: &Delivery) -> Result<(), StoreError>;
    /// Newest first.
    async fn list(&self, filter: &DeliveryFilter, page: Page) -> Result<Vec<Delivery>, StoreError>;
}

#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Inserts all entries or none. Fails with [`StoreError::Conflict`] on a duplicate
    /// `(delivery, product)` pair, within the batch or against stored entries.
    async fn insert_batch(&self, entries: &[CollectionEntry]) -> Result<(), StoreError>;
    async fn get(
        &self,
        delivery_id: &DeliveryId,
        product_id: &ProductId,
    ) -> Result<Option<CollectionEntry>, StoreError>;
    async fn entries(&self, delivery_id: &DeliveryId) -> Result<Vec<CollectionEntry>, StoreError>;
    async fn update(&self, entry: &CollectionEntry) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Appends a sample and returns it with its store-assigned id.
    async fn append(&self, sample: NewPositionSample) -> Result<PositionSample, StoreError>;
    /// Most recent sample by its own timestamp.
    async fn latest(&self, delivery_id: &DeliveryId) -> Result<Option<PositionSample>, StoreError>;
}

/// Outbound notification to the buyer. Delivery of the message is best effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_confirmation_code(
        &self,
        contact: &str,
        code: &str,
        summary: &str,
    ) -> Result<(), StoreError>;
}

/// All collaborators plus the retry policy applied to them.
#[derive(Clone)]
pub struct Stores {
    pub orders: Arc<dyn OrderStore>,
    pub agents: Arc<dyn AgentDirectory>,
    pub deliveries: Arc<dyn DeliveryStore>,
    pub collections: Arc<dyn CollectionStore>,
    pub positions: Arc<dyn PositionStore>,
    pub notifier: Arc<dyn Notifier>,
    pub retry: RetryPolicy,
}

impl Stores {
    /// Same collaborators, one attempt per call. Used by queries, whose latency must stay
    /// within a single store timeout.
    pub fn single_attempt(&self) -> Self {
        Self {
            retry: RetryPolicy::no_retry(self.retry.timeout),
            ..self.clone()
        }
    }

    // --- orders ---

    pub async fn line_items(&self, order_id: &OrderId) -> Result<Vec<LineItem>, StoreError> {
        with_retry(&self.retry, "order.line_items", || self.orders.line_items(order_id)).await
    }

    pub async fn order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        with_retry(&self.retry, "order.get", || self.orders.order(order_id)).await
    }

    pub async fn mark_order_delivered(&self, order_id: &OrderId) -> Result<(), StoreError> {
        with_retry(&self.retry, "order.mark_delivered", || {
            self.orders.mark_delivered(order_id)
        })
        .await
    }

    // --- agents ---

    pub async fn least_loaded_agent(&self) -> Result<Option<AgentId>, StoreError> {
        with_retry(&self.retry, "agent.least_loaded", || self.agents.find_least_loaded()).await
    }

    pub async fn is_courier(&self, agent_id: &AgentId) -> Result<bool, StoreError> {
        with_retry(&self.retry, "agent.is_courier", || self.agents.is_courier(agent_id)).await
    }

    /// Display name for admin events. Falls back to the id when the directory has none.
    pub async fn agent_name(&self, agent_id: &AgentId) -> Result<String, StoreError> {
        let name = with_retry(&self.retry, "agent.name", || self.agents.agent_name(agent_id)).await?;
        Ok(name.unwrap_or_else(|| agent_id.to_string()))
    }

    // --- deliveries ---

    pub async fn insert_delivery(&self, delivery: &Delivery) -> Result<(), StoreError> {
        with_retry(&self.retry, "delivery.insert", || self.deliveries.insert(delivery)).await
    }

    pub async fn delivery(&self, id: &DeliveryId) -> Result<Option<Delivery>, StoreError> {
        with_retry(&self.retry, "delivery.get", || self.deliveries.get(id)).await
    }

    pub async fn delivery_for_order(&self, order_id: &OrderId) -> Result<Option<Delivery>, StoreError> {
        with_retry(&self.retry, "delivery.find_by_order", || {
            self.deliveries.find_by_order(order_id)
        })
        .await
    }

    pub async fn update_delivery(&self, delivery: &Delivery) -> Result<(), StoreError> {
        with_retry(&self.retry, "delivery.update", || self.deliveries.update(delivery)).await
    }

    pub async fn list_deliveries(
        &self,
        filter: &DeliveryFilter,
        page: Page,
    ) -> Result<Vec<Delivery>, StoreError> {
        with_retry(&self.retry, "delivery.list", || self.deliveries.list(filter, page)).await
    }

    // --- collection entries ---

    pub async fn insert_entries(&self, entries: &[CollectionEntry]) -> Result<(), StoreError> {
        with_retry(&self.retry, "collection.insert_batch", || {
            self.collections.insert_batch(entries)
        })
        .await
    }

    pub async fn entry(
        &self,
        delivery_id: &DeliveryId,
        product_id: &ProductId,
    ) -> Result<Option<CollectionEntry>, StoreError> {
        with_retry(&self.retry, "collection.get", || {
            self.collections.get(delivery_id, product_id)
        })
        .await
    }

    pub async fn entries(&self, delivery_id: &DeliveryId) -> Result<Vec<CollectionEntry>, StoreError> {
        with_retry(&self.retry, "collection.entries", || self.collections.entries(delivery_id)).await
    }

    pub async fn update_entry(&self, entry: &CollectionEntry) -> Result<(), StoreError> {
        with_retry(&self.retry, "collection.update", || self.collections.update(entry)).await
    }

    // --- positions ---

    pub async fn append_position(&self, sample: NewPositionSample) -> Result<PositionSample, StoreError> {
        with_retry(&self.retry, "position.append", || self.positions.append(sample.clone())).await
    }

    pub async fn latest_position(
        &self,
        delivery_id: &DeliveryId,
    ) -> Result<Option<PositionSample>, StoreError> {
        with_retry(&self.retry, "position.latest", || self.positions.latest(delivery_id)).await
    }
}
