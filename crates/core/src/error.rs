//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// missing records, conflicts, stock shortages). Infrastructure concerns belong
/// elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. missing field, negative count).
    #[error("{0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced record does not exist (or is not visible to the caller).
    #[error("{0}")]
    NotFound(String),

    /// A uniqueness rule was violated (duplicate name/code).
    #[error("{0}")]
    Conflict(String),

    /// Requested quantity exceeds the stock available at the requested granularity.
    #[error("Insufficient stock for {product}. Available: {available}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn insufficient_stock(product: impl Into<String>, available: i64, requested: i64) -> Self {
        Self::InsufficientStock {
            product: product.into(),
            available,
            requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_message_names_product_and_availability() {
        let err = DomainError::insufficient_stock("Weathercoat White", 3, 5);
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Weathercoat White. Available: 3"
        );
    }

    #[test]
    fn plain_variants_display_their_message() {
        assert_eq!(DomainError::not_found("Brand not found").to_string(), "Brand not found");
        assert_eq!(
            DomainError::invalid_id("ProductId: bad").to_string(),
            "invalid identifier: ProductId: bad"
        );
    }
}
