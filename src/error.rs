//! Error classification shared by every component.
//!
//! Each component has its own `thiserror` enum; `kind()` on those enums maps a concrete
//! error onto this taxonomy so callers (and the real-time surface) can decide what to do
//! without matching on every variant.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Delivery, product, order or agent absent.
    NotFound,
    /// Rejected by a state-machine rule. Never corrected silently.
    InvariantViolation,
    /// Caller is not allowed to act on the resource.
    Unauthorized,
    /// A required collaborator has nothing to offer right now (e.g. no free agent).
    Unavailable,
    /// Store failure that survived local retries.
    TransientStoreFailure,
    /// Actor channel failure or an unexpected backend error.
    Internal,
}

impl ErrorKind {
    /// Only transient store failures are worth retrying.
    pub fn is_retryable(self) -> bool {
        self == ErrorKind::TransientStoreFailure
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvariantViolation => "invariant_violation",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::TransientStoreFailure => "transient_store_failure",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}
