//! Real-time events pushed to live connections.
//!
//! Events are JSON objects tagged by `type`:
//!
//! ```json
//! {"type":"product-collected","deliveryId":"…","productName":"Rice 5kg","collected":1,"total":3,"progress":33.33}
//! ```
//!
//! Admin mirrors carry the identity of who acted (agent name, shop name) on top of the
//! fields of the event they mirror.

use super::{AgentId, DeliveryId, DeliveryStatus, OrderId, ProductId, Role, UserId};
use crate::error::ErrorKind;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    ProductCollected {
        delivery_id: DeliveryId,
        product_id: ProductId,
        product_name: String,
        collected: u32,
        total: u32,
        progress: f64,
    },
    DeliveryReady {
        delivery_id: DeliveryId,
        total_products: u32,
    },
    DeliveryStatusUpdate {
        delivery_id: DeliveryId,
        status: DeliveryStatus,
        progress: f64,
    },
    DeliveryCompleted {
        delivery_id: DeliveryId,
        delivered_at: DateTime<Utc>,
    },
    GpsUpdate {
        delivery_id: DeliveryId,
        lat: f64,
        lon: f64,
        accuracy: Option<f64>,
        speed: Option<f64>,
        heading: Option<f64>,
        timestamp: DateTime<Utc>,
    },
    TrackingChanged {
        delivery_id: DeliveryId,
        active: bool,
    },

    AdminProductCollected {
        delivery_id: DeliveryId,
        product_name: String,
        shop_name: String,
        agent_id: AgentId,
        agent_name: String,
        collected: u32,
        total: u32,
        progress: f64,
    },
    AdminDeliveryReady {
        delivery_id: DeliveryId,
        total_products: u32,
        agent_id: AgentId,
        agent_name: String,
    },
    AdminDeliveryStatusUpdate {
        delivery_id: DeliveryId,
        status: DeliveryStatus,
        progress: f64,
        /// Who caused the transition: an agent, an admin, or `system`.
        actor: String,
    },
    AdminDeliveryCompleted {
        delivery_id: DeliveryId,
        agent_id: Option<AgentId>,
        agent_name: String,
        confirmed_by: UserId,
    },
    AdminGpsUpdate {
        delivery_id: DeliveryId,
        agent_id: AgentId,
        lat: f64,
        lon: f64,
        timestamp: DateTime<Utc>,
    },

    DeliveryAssigned {
        delivery_id: DeliveryId,
        order_id: OrderId,
    },
    DeliveryUnassigned {
        delivery_id: DeliveryId,
    },
    PositionAck {
        delivery_id: DeliveryId,
        sample_id: u64,
        timestamp: DateTime<Utc>,
    },

    Authenticated {
        identity: String,
        role: Role,
        /// Live deliveries currently assigned to an agent; empty for other roles.
        deliveries: Vec<DeliveryId>,
    },
    JoinedDelivery {
        delivery_id: DeliveryId,
        status: DeliveryStatus,
        progress: f64,
    },
    LeftDelivery {
        delivery_id: DeliveryId,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl ServerEvent {
    /// The wire name of the event, e.g. `gps-update`.
    pub fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::ProductCollected { .. } => "product-collected",
            ServerEvent::DeliveryReady { .. } => "delivery-ready",
            ServerEvent::DeliveryStatusUpdate { .. } => "delivery-status-update",
            ServerEvent::DeliveryCompleted { .. } => "delivery-completed",
            ServerEvent::GpsUpdate { .. } => "gps-update",
            ServerEvent::TrackingChanged { .. } => "tracking-changed",
            ServerEvent::AdminProductCollected { .. } => "admin-product-collected",
            ServerEvent::AdminDeliveryReady { .. } => "admin-delivery-ready",
            ServerEvent::AdminDeliveryStatusUpdate { .. } => "admin-delivery-status-update",
            ServerEvent::AdminDeliveryCompleted { .. } => "admin-delivery-completed",
            ServerEvent::AdminGpsUpdate { .. } => "admin-gps-update",
            ServerEvent::DeliveryAssigned { .. } => "delivery-assigned",
            ServerEvent::DeliveryUnassigned { .. } => "delivery-unassigned",
            ServerEvent::PositionAck { .. } => "position-ack",
            ServerEvent::Authenticated { .. } => "authenticated",
            ServerEvent::JoinedDelivery { .. } => "joined-delivery",
            ServerEvent::LeftDelivery { .. } => "left-delivery",
            ServerEvent::Error { .. } => "error",
        }
    }
}

/// Audience of a published event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Subscribers of one delivery (buyer, admins who joined).
    Delivery(DeliveryId),
    /// Every live connection of one agent.
    Agent(AgentId),
    /// Every admin connection, regardless of subscriptions.
    Admins,
}
