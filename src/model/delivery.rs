use super::{AgentId, DeliveryId, OrderId, UserId, ValidationCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a delivery.
///
/// ```text
/// pending ─► assigned ─► collecting ─► en_route ─► delivered
///    └──────────┴────────────┴────────────┴──────► failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Assigned,
    Collecting,
    EnRoute,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    /// `delivered` and `failed` accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Assigned => "assigned",
            DeliveryStatus::Collecting => "collecting",
            DeliveryStatus::EnRoute => "en_route",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percentage of collected products, clamped to `[0, 100]` and rounded to two decimals.
///
/// An empty delivery reports `0`.
pub fn progress(collected: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = (f64::from(collected) / f64::from(total) * 100.0).clamp(0.0, 100.0);
    (raw * 100.0).round() / 100.0
}

/// The unit of work tracking one order's physical fulfillment.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub id: DeliveryId,
    pub order_id: OrderId,
    pub agent_id: Option<AgentId>,
    pub status: DeliveryStatus,
    pub total_products: u32,
    pub collected_products: u32,
    pub validation_code: ValidationCode,
    pub gps_active: bool,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub confirmed_by: Option<UserId>,
    pub notes: Option<String>,
}

impl Delivery {
    pub fn new(
        id: DeliveryId,
        order_id: OrderId,
        total_products: u32,
        validation_code: ValidationCode,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            order_id,
            agent_id: None,
            status: DeliveryStatus::Pending,
            total_products,
            collected_products: 0,
            validation_code,
            gps_active: false,
            created_at: now,
            assigned_at: None,
            picked_up_at: None,
            delivered_at: None,
            confirmed_by: None,
            notes: None,
        }
    }

    pub fn progress(&self) -> f64 {
        progress(self.collected_products, self.total_products)
    }

    pub fn is_fully_collected(&self) -> bool {
        self.collected_products == self.total_products
    }

    pub fn is_assigned_to(&self, agent_id: &AgentId) -> bool {
        self.agent_id.as_ref() == Some(agent_id)
    }

    /// Position reports are accepted while en route or when tracking was switched on.
    pub fn accepts_positions(&self) -> bool {
        self.status == DeliveryStatus::EnRoute || (self.gps_active && !self.status.is_terminal())
    }

    pub fn append_note(&mut self, note: &str) {
        match &mut self.notes {
            Some(notes) => {
                notes.push('\n');
                notes.push_str(note);
            }
            None => self.notes = Some(note.to_string()),
        }
    }
}

/// Read model returned by delivery queries. Never carries the validation code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryDetails {
    pub id: DeliveryId,
    pub order_id: OrderId,
    pub agent_id: Option<AgentId>,
    pub status: DeliveryStatus,
    pub total_products: u32,
    pub collected_products: u32,
    pub progress: f64,
    pub gps_active: bool,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub collections: Vec<super::CollectionEntry>,
}

impl DeliveryDetails {
    pub fn new(delivery: &Delivery, collections: Vec<super::CollectionEntry>) -> Self {
        Self {
            id: delivery.id,
            order_id: delivery.order_id.clone(),
            agent_id: delivery.agent_id.clone(),
            status: delivery.status,
            total_products: delivery.total_products,
            collected_products: delivery.collected_products,
            progress: delivery.progress(),
            gps_active: delivery.gps_active,
            created_at: delivery.created_at,
            assigned_at: delivery.assigned_at,
            picked_up_at: delivery.picked_up_at,
            delivered_at: delivery.delivered_at,
            notes: delivery.notes.clone(),
            collections,
        }
    }
}

/// Filter for listing deliveries. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryFilter {
    pub status: Option<DeliveryStatus>,
    pub agent_id: Option<AgentId>,
}

impl DeliveryFilter {
    pub fn matches(&self, delivery: &Delivery) -> bool {
        self.status.map_or(true, |status| delivery.status == status)
            && self
                .agent_id
                .as_ref()
                .map_or(true, |agent| delivery.agent_id.as_ref() == Some(agent))
    }
}

/// Zero-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Page {
    pub number: usize,
    pub size: usize,
}

impl Page {
    pub const MAX_SIZE: usize = 100;

    pub fn new(number: usize, size: usize) -> Self {
        Self {
            number,
            size: size.clamp(1, Self::MAX_SIZE),
        }
    }

    pub fn offset(&self) -> usize {
        self.number.saturating_mul(self.size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, 20)
    }
}
