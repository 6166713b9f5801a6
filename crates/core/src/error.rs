//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Coarse error category surfaced to callers.
///
/// Every typed failure maps to exactly one kind; the UI decides how to present
/// it from the kind, and shows the error's message as detail.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or out-of-range input, rejected before any store call.
    Validation,
    /// An unknown unit, category or product id.
    NotFound,
    /// The request is well-formed but collides with current state.
    Conflict,
    /// The underlying persistence failed.
    Store,
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Store => "store",
        };
        f.write_str(s)
    }
}

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A stock quantity was zero/negative where a positive one is required, or too large.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// A conversion factor was not positive or exceeded the configured ceiling.
    #[error("invalid conversion factor: {0}")]
    InvalidConversionFactor(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("unit not found: {0}")]
    UnitNotFound(String),

    #[error("category not found: {0}")]
    CategoryNotFound(String),

    #[error("product not found: {0}")]
    ProductNotFound(String),

    /// A sibling (or unit) already uses this name.
    #[error("name already exists: {0}")]
    DuplicateName(String),

    /// The new category would be deeper than the configured maximum level.
    #[error("max depth reached: level {level} exceeds maximum {max}")]
    MaxDepthReached { level: u8, max: u8 },

    /// A removal asked for more than the current base-unit stock.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// The category still has child categories.
    #[error("category has children: {0}")]
    HasChildren(String),

    /// The category classifies products, so it cannot gain children.
    #[error("category has products: {0}")]
    HasProducts(String),

    /// The category has children and cannot classify a product.
    #[error("category is not a leaf: {0}")]
    NotALeaf(String),

    /// The two units do not share a base unit.
    #[error("incompatible units: {0}")]
    IncompatibleUnits(String),

    /// The unit is still referenced by at least one product.
    #[error("unit in use: {0}")]
    UnitInUse(String),

    /// Base units cannot be deleted and keep a conversion factor of 1.
    #[error("base unit cannot be modified: {0}")]
    BaseUnitImmutable(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_quantity(msg: impl Into<String>) -> Self {
        Self::InvalidQuantity(msg.into())
    }

    pub fn invalid_conversion_factor(msg: impl Into<String>) -> Self {
        Self::InvalidConversionFactor(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn duplicate_name(name: impl Into<String>) -> Self {
        Self::DuplicateName(name.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Classify this error for callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation(_)
            | DomainError::InvalidQuantity(_)
            | DomainError::InvalidConversionFactor(_)
            | DomainError::InvalidId(_) => ErrorKind::Validation,
            DomainError::UnitNotFound(_)
            | DomainError::CategoryNotFound(_)
            | DomainError::ProductNotFound(_) => ErrorKind::NotFound,
            DomainError::DuplicateName(_)
            | DomainError::MaxDepthReached { .. }
            | DomainError::InsufficientStock { .. }
            | DomainError::HasChildren(_)
            | DomainError::HasProducts(_)
            | DomainError::NotALeaf(_)
            | DomainError::IncompatibleUnits(_)
            | DomainError::UnitInUse(_)
            | DomainError::BaseUnitImmutable(_)
            | DomainError::InvariantViolation(_) => ErrorKind::Conflict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_the_taxonomy() {
        assert_eq!(DomainError::invalid_quantity("0").kind(), ErrorKind::Validation);
        assert_eq!(
            DomainError::invalid_conversion_factor("-1").kind(),
            ErrorKind::Validation
        );
        assert_eq!(DomainError::UnitNotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            DomainError::InsufficientStock { requested: 5, available: 1 }.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            DomainError::MaxDepthReached { level: 5, max: 4 }.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(DomainError::HasProducts("Drinks".into()).kind(), ErrorKind::Conflict);
    }

    #[test]
    fn messages_carry_context() {
        let err = DomainError::InsufficientStock { requested: 30, available: 24 };
        assert_eq!(err.to_string(), "insufficient stock: requested 30, available 24");
        assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
    }
}
