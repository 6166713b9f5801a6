//! Errors returned across the command layer.

use thiserror::Error;

use stockroom_core::{DomainError, ErrorKind};

use crate::store::StoreError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Operation name used when a store failure is converted without context.
const UNTAGGED: &str = "store";

/// Every failure a command or query can return.
///
/// Nothing here panics or aborts the process; callers decide whether to show,
/// retry or drop. A caller retrying after a `Store` failure must re-check its
/// preconditions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{operation} failed: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl From<StoreError> for ServiceError {
    fn from(source: StoreError) -> Self {
        ServiceError::Store {
            operation: UNTAGGED,
            source,
        }
    }
}

impl ServiceError {
    pub fn store(operation: &'static str, source: StoreError) -> Self {
        ServiceError::Store { operation, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Domain(e) => e.kind(),
            ServiceError::Store { .. } => ErrorKind::Store,
        }
    }

    /// Name the operation a store failure happened in, unless already named.
    pub fn during(self, op: &'static str) -> Self {
        match self {
            ServiceError::Store { operation, source } if operation == UNTAGGED => {
                ServiceError::Store { operation: op, source }
            }
            other => other,
        }
    }

    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            ServiceError::Store { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_are_tagged_once() {
        let err: ServiceError = StoreError::LockPoisoned.into();
        let tagged = err.during("add_stock").during("outer");
        assert_eq!(tagged.kind(), ErrorKind::Store);
        assert_eq!(tagged.to_string(), "add_stock failed: lock poisoned");
    }

    #[test]
    fn domain_errors_keep_their_kind_and_message() {
        let err = ServiceError::from(DomainError::InsufficientStock {
            requested: 10,
            available: 5,
        })
        .during("remove_stock");
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.domain().is_some());
        assert_eq!(err.to_string(), DomainError::InsufficientStock { requested: 10, available: 5 }.to_string());
    }
}
