//! Application-level error for service operations.

use thiserror::Error;

use painterp_core::DomainError;

use crate::store::StoreError;

/// Failure of a service call: either a domain rule (maps to a 4xx) or a
/// storage failure (maps to a 5xx).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage failure: {0}")]
    Store(String),
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Rejected(e) => ServiceError::Domain(e),
            StoreError::Duplicate(msg) => ServiceError::Domain(DomainError::conflict(msg)),
            StoreError::Backend(_) | StoreError::Serialization(_) => {
                ServiceError::Store(value.to_string())
            }
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
