//! Error types for the delivery actor.

use crate::collection_tracker::CollectionError;
use crate::error::ErrorKind;
use crate::model::{AgentId, DeliveryId, DeliveryStatus, OrderId, ProductId};
use crate::store::StoreError;
use actor_framework::FrameworkError;
use thiserror::Error;

/// Errors that can occur during delivery lifecycle operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DeliveryError {
    #[error("Delivery not found: {0}")]
    DeliveryNotFound(DeliveryId),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// An order gets at most one delivery.
    #[error("Order {0} already has a delivery")]
    DeliveryAlreadyExists(OrderId),

    #[error("Order {0} has no line items")]
    EmptyOrder(OrderId),

    #[error("No agent available")]
    NoAgentAvailable,

    /// The agent lacks the courier capability.
    #[error("Agent {0} is not a courier")]
    AgentInvalid(AgentId),

    #[error("Agent {agent_id} is not assigned to delivery {delivery_id}")]
    UnauthorizedAgent {
        delivery_id: DeliveryId,
        agent_id: AgentId,
    },

    #[error("Product {product_id} is not part of delivery {delivery_id}")]
    ProductNotInDelivery {
        delivery_id: DeliveryId,
        product_id: ProductId,
    },

    #[error("Product {product_id} of delivery {delivery_id} was already collected")]
    AlreadyCollected {
        delivery_id: DeliveryId,
        product_id: ProductId,
    },

    #[error("Invalid validation code for delivery {0}")]
    InvalidCode(DeliveryId),

    /// Confirmation before every product was picked up. Not retryable.
    #[error("Delivery {delivery_id} is incomplete: {collected}/{total} products collected")]
    IncompleteCollection {
        delivery_id: DeliveryId,
        collected: u32,
        total: u32,
    },

    #[error("Delivery {delivery_id} is {status} and accepts no further changes")]
    DeliveryTerminal {
        delivery_id: DeliveryId,
        status: DeliveryStatus,
    },

    /// The requester may not see this delivery.
    #[error("Access to delivery {0} denied")]
    Forbidden(DeliveryId),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// An error occurred while communicating with the actor system.
    #[error("Actor communication error: {0}")]
    ActorCommunicationError(String),
}

impl DeliveryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeliveryError::DeliveryNotFound(_)
            | DeliveryError::OrderNotFound(_)
            | DeliveryError::ProductNotInDelivery { .. } => ErrorKind::NotFound,
            DeliveryError::DeliveryAlreadyExists(_)
            | DeliveryError::EmptyOrder(_)
            | DeliveryError::AlreadyCollected { .. }
            | DeliveryError::InvalidCode(_)
            | DeliveryError::IncompleteCollection { .. }
            | DeliveryError::DeliveryTerminal { .. } => ErrorKind::InvariantViolation,
            DeliveryError::AgentInvalid(_)
            | DeliveryError::UnauthorizedAgent { .. }
            | DeliveryError::Forbidden(_) => ErrorKind::Unauthorized,
            DeliveryError::NoAgentAvailable => ErrorKind::Unavailable,
            DeliveryError::Store(e) if e.is_transient() => ErrorKind::TransientStoreFailure,
            DeliveryError::Store(_) | DeliveryError::ActorCommunicationError(_) => ErrorKind::Internal,
        }
    }
}

impl From<FrameworkError> for DeliveryError {
    fn from(e: FrameworkError) -> Self {
        DeliveryError::ActorCommunicationError(e.to_string())
    }
}

impl From<CollectionError> for DeliveryError {
    fn from(e: CollectionError) -> Self {
        match e {
            CollectionError::ProductNotFound {
                delivery_id,
                product_id,
            } => DeliveryError::ProductNotInDelivery {
                delivery_id,
                product_id,
            },
            CollectionError::AlreadyCollected {
                delivery_id,
                product_id,
            } => DeliveryError::AlreadyCollected {
                delivery_id,
                product_id,
            },
            CollectionError::EntriesExist(delivery_id) => DeliveryError::Store(StoreError::Conflict(
                format!("collection entries already exist for delivery {delivery_id}"),
            )),
            CollectionError::Store(e) => DeliveryError::Store(e),
        }
    }
}
