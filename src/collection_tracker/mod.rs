//! # Collection Tracker
//!
//! Owns the per-product [`CollectionEntry`] records of every delivery and answers one
//! question for the delivery actor: *how many of the ordered products have been picked
//! up?*
//!
//! The tracker never touches the [`Delivery`](crate::model::Delivery) record. It records
//! a pickup, recounts the entries, and hands the counts back; the delivery actor decides
//! on state transitions. Every call for a delivery is made from that delivery's worker,
//! so the read-modify-write below never races with itself.

pub mod error;

pub use error::*;

use crate::model::{
    AgentId, CollectionCounts, CollectionEntry, CollectionStatus, DeliveryId, LineItem, ProductId,
};
use crate::store::{StoreError, Stores};
use chrono::Utc;
use tracing::{debug, info};

/// Outcome of a successful pickup.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionOutcome {
    pub entry: CollectionEntry,
    pub counts: CollectionCounts,
}

#[derive(Clone)]
pub struct CollectionTracker {
    stores: Stores,
}

impl CollectionTracker {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Creates one pending entry per distinct product, as a single batch.
    ///
    /// Returns the number of entries created, which becomes the delivery's
    /// `total_products`.
    pub async fn create_entries(
        &self,
        delivery_id: DeliveryId,
        items: &[LineItem],
    ) -> Result<u32, CollectionError> {
        let entries: Vec<CollectionEntry> = merge_line_items(items)
            .into_iter()
            .map(|item| CollectionEntry {
                delivery_id,
                product_id: item.product_id,
                shop_id: item.shop_id,
                product_name: item.product_name,
                shop_name: item.shop_name,
                status: CollectionStatus::Pending,
                collected_at: None,
                collected_by: None,
            })
            .collect();

        self.stores
            .insert_entries(&entries)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => CollectionError::EntriesExist(delivery_id),
                other => CollectionError::Store(other),
            })?;

        let total = u32::try_from(entries.len()).unwrap_or(u32::MAX);
        debug!(%delivery_id, total, "Collection entries created");
        Ok(total)
    }

    /// Marks one product as picked up by `agent_id` and returns the recounted totals.
    pub async fn record_collection(
        &self,
        delivery_id: DeliveryId,
        product_id: &ProductId,
        agent_id: &AgentId,
    ) -> Result<CollectionOutcome, CollectionError> {
        let mut entry = self
            .stores
            .entry(&delivery_id, product_id)
            .await?
            .ok_or_else(|| CollectionError::ProductNotFound {
                delivery_id,
                product_id: product_id.clone(),
            })?;

        if entry.is_collected() {
            return Err(CollectionError::AlreadyCollected {
                delivery_id,
                product_id: product_id.clone(),
            });
        }

        entry.status = CollectionStatus::Collected;
        entry.collected_at = Some(Utc::now());
        entry.collected_by = Some(agent_id.clone());
        self.stores.update_entry(&entry).await?;

        let counts = self.progress(delivery_id).await?;
        info!(
            %delivery_id,
            %product_id,
            collected = counts.collected,
            total = counts.total,
            "Product collected"
        );
        Ok(CollectionOutcome { entry, counts })
    }

    /// Recounts the entries of a delivery.
    pub async fn progress(&self, delivery_id: DeliveryId) -> Result<CollectionCounts, CollectionError> {
        let entries = self.stores.entries(&delivery_id).await?;
        Ok(CollectionCounts::from_entries(&entries))
    }

    pub async fn entries(&self, delivery_id: DeliveryId) -> Result<Vec<CollectionEntry>, CollectionError> {
        Ok(self.stores.entries(&delivery_id).await?)
    }
}

/// Folds repeated line items for the same product into one, summing quantities.
///
/// Keeps first-seen order.
pub fn merge_line_items(items: &[LineItem]) -> Vec<LineItem> {
    let mut merged: Vec<LineItem> = Vec::with_capacity(items.len());
    for item in items {
        match merged.iter_mut().find(|m| m.product_id == item.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => merged.push(item.clone()),
        }
    }
    merged
}
