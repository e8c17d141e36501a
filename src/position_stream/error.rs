//! Error types for the position stream.

use crate::error::ErrorKind;
use crate::model::{AgentId, DeliveryId};
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PositionError {
    #[error("delivery not found: {0}")]
    DeliveryNotFound(DeliveryId),

    #[error("agent {agent_id} is not assigned to delivery {delivery_id}")]
    UnauthorizedAgent {
        delivery_id: DeliveryId,
        agent_id: AgentId,
    },

    /// The delivery is neither en route nor explicitly tracked.
    #[error("tracking is not active for delivery {0}")]
    TrackingNotActive(DeliveryId),

    #[error("coordinates out of range: lat={lat}, lon={lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },

    /// No sample was ever ingested for the delivery.
    #[error("no position data for delivery {0}")]
    NoPositionData(DeliveryId),

    /// The order has no delivery coordinates.
    #[error("destination unknown for delivery {0}")]
    DestinationUnknown(DeliveryId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PositionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PositionError::DeliveryNotFound(_)
            | PositionError::NoPositionData(_)
            | PositionError::DestinationUnknown(_) => ErrorKind::NotFound,
            PositionError::UnauthorizedAgent { .. } => ErrorKind::Unauthorized,
            PositionError::TrackingNotActive(_) | PositionError::InvalidCoordinates { .. } => {
                ErrorKind::InvariantViolation
            }
            PositionError::Store(e) if e.is_transient() => ErrorKind::TransientStoreFailure,
            PositionError::Store(_) => ErrorKind::Internal,
        }
    }
}
