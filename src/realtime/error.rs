use crate::delivery_actor::DeliveryError;
use crate::error::ErrorKind;
use crate::model::Role;
use crate::position_stream::PositionError;
use thiserror::Error;

/// Errors reported back to a live client as an `error` event.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Session is not authenticated")]
    NotAuthenticated,

    #[error("Session is already authenticated as {0}")]
    AlreadyAuthenticated(String),

    #[error("A {role} session cannot {operation}")]
    RoleNotAllowed { role: Role, operation: &'static str },

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Position(#[from] PositionError),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Malformed(_) | SessionError::AlreadyAuthenticated(_) => {
                ErrorKind::InvariantViolation
            }
            SessionError::NotAuthenticated | SessionError::RoleNotAllowed { .. } => {
                ErrorKind::Unauthorized
            }
            SessionError::Delivery(e) => e.kind(),
            SessionError::Position(e) => e.kind(),
        }
    }
}
