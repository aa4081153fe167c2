//! Domain error model.

use thiserror::Error;

use crate::id::{BatchRef, Sku};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures. Storage,
/// timeouts and races belong to the infrastructure error types.
///
/// The `Display` output of the allocation variants is the user-facing message
/// returned by the HTTP layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// No batch has ever been registered for this SKU.
    #[error("Invalid sku {0}.")]
    InvalidSku(Sku),

    /// The SKU exists but no batch has enough remaining quantity.
    #[error("Cannot allocate sku {0}. Out of stock.")]
    OutOfStock(Sku),

    /// A requested or purchased quantity is out of range.
    #[error("Invalid quantity {0}.")]
    InvalidQuantity(i64),

    /// A batch with this reference already exists.
    #[error("Batch {0} already exists.")]
    DuplicateBatchRef(BatchRef),

    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_facing_messages() {
        let sku = Sku::new("RED-CHAIR").unwrap();
        assert_eq!(
            DomainError::InvalidSku(sku.clone()).to_string(),
            "Invalid sku RED-CHAIR."
        );
        assert_eq!(
            DomainError::OutOfStock(sku).to_string(),
            "Cannot allocate sku RED-CHAIR. Out of stock."
        );
    }
}
