//! Commands accepted by the delivery actor.
//!
//! Every command names one delivery (the actor key) and is handled by that delivery's
//! worker, one at a time. See [`DeliveryResource`](super::DeliveryResource) for the
//! handling logic.

use crate::model::{
    AgentId, CollectionCounts, Delivery, DeliveryStatus, OrderId, ProductId, SuppliedCode, UserId,
};

/// Lifecycle commands for one delivery.
#[derive(Debug, Clone)]
pub enum DeliveryCommand {
    /// Creates the delivery for `order_id` under the key it was sent to.
    Create { order_id: OrderId },
    /// Hands the delivery to another courier. `actor` is the admin doing it.
    Reassign { agent_id: AgentId, actor: UserId },
    /// The assigned agent picked up one product.
    RecordCollection {
        product_id: ProductId,
        agent_id: AgentId,
    },
    /// Handoff to the buyer, gated by the validation code.
    Confirm {
        code: SuppliedCode,
        scanner_id: UserId,
    },
    MarkFailed { reason: String },
    /// The assigned agent switches live tracking on or off.
    SetTracking { agent_id: AgentId, active: bool },
}

/// Replies from DeliveryCommands - variants match 1:1 with DeliveryCommand
#[derive(Debug, Clone)]
pub enum DeliveryReply {
    Created(Delivery),
    Reassigned(Delivery),
    Collected(CollectionReceipt),
    Confirmed(Delivery),
    Failed(Delivery),
    TrackingSet(Delivery),
}

/// Result of recording one pickup.
#[derive(Debug, Clone)]
pub struct CollectionReceipt {
    /// The delivery as written after this pickup.
    pub delivery: Delivery,
    pub product_id: ProductId,
    pub counts: CollectionCounts,
    /// Status changes caused by this pickup, in order. Empty, `[collecting]`,
    /// `[en_route]`, or both for a single-product delivery.
    pub transitions: Vec<DeliveryStatus>,
}

impl CollectionReceipt {
    pub fn progress(&self) -> f64 {
        self.counts.progress()
    }
}
