//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is a rejected operation, never a crash: callers abort the
/// current unit of work and leave prior state untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (bad input, failed precondition).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The request collides with existing state (e.g. a second open work order).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Requested consumption exceeds what is on hand.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },

    /// A referenced record does not exist in the caller's building scope.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The record is in a state that forbids the requested change.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// The record being created is already present.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn illegal_state(msg: impl Into<String>) -> Self {
        Self::IllegalState(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound(entity)
    }

    pub fn insufficient_stock(requested: u32, available: u32) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_message_names_both_quantities() {
        let err = DomainError::insufficient_stock(5, 3);
        assert_eq!(
            err.to_string(),
            "insufficient stock: requested 5, available 3"
        );
    }

    #[test]
    fn not_found_message_names_entity() {
        assert_eq!(DomainError::not_found("work order").to_string(), "work order not found");
    }
}
