use super::{AgentId, DeliveryId, ProductId, ShopId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    Pending,
    Collected,
}

/// One ordered product to be picked up from its shop.
///
/// Unique per `(delivery_id, product_id)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionEntry {
    pub delivery_id: DeliveryId,
    pub product_id: ProductId,
    pub shop_id: ShopId,
    pub product_name: String,
    pub shop_name: String,
    pub status: CollectionStatus,
    pub collected_at: Option<DateTime<Utc>>,
    pub collected_by: Option<AgentId>,
}

impl CollectionEntry {
    pub fn is_collected(&self) -> bool {
        self.status == CollectionStatus::Collected
    }
}

/// Aggregate collection state of a delivery, recounted from its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollectionCounts {
    pub collected: u32,
    pub total: u32,
}

impl CollectionCounts {
    pub fn from_entries(entries: &[CollectionEntry]) -> Self {
        let collected = entries.iter().filter(|entry| entry.is_collected()).count();
        Self {
            collected: u32::try_from(collected).unwrap_or(u32::MAX),
            total: u32::try_from(entries.len()).unwrap_or(u32::MAX),
        }
    }

    pub fn progress(&self) -> f64 {
        super::progress(self.collected, self.total)
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.collected == self.total
    }
}
