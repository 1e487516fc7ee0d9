//! Domain error types
//!
//! These errors are framework-agnostic and represent business-level failures.

use std::fmt;

#[derive(Debug)]
pub enum DomainError {
    /// Malformed caller input (bad type, non-positive quantity, unparseable
    /// timestamp). Never retried automatically.
    InvalidArgument(String),
    /// Referenced resource does not exist
    NotFound,
    /// A sale would drive stock below zero. Business-rule rejection, not a
    /// system fault.
    InsufficientStock,
    /// Reserved: the current merge policy (last-write-wins, insert-if-absent)
    /// never surfaces conflicts.
    Conflict(String),
    /// Store unavailable or atomic-unit failure. The only variant a caller
    /// may transparently retry.
    Internal(String),
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            DomainError::NotFound => write!(f, "Resource not found"),
            DomainError::InsufficientStock => write!(f, "Insufficient quantity available"),
            DomainError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            DomainError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}

// Conversion from SeaORM errors (used in the service layer)
impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        DomainError::Internal(e.to_string())
    }
}
