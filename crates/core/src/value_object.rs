//! Value object trait: equality by value, not identity.

/// Marker trait for immutable values compared by their attributes.
///
/// `Money`, `Quantity` and stock-movement source references are value objects: two
/// instances with the same attributes are interchangeable. To "change" one, build a
/// new value (see `Money::checked_add`).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
