//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity, are immutable, and compare by their
/// attribute values. A `ConversionFactor(12)` is the same factor wherever it
/// appears; a `Unit` with a given id is an entity even if renamed.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
