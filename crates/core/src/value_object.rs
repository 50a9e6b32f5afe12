//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. `Amount`,
/// `Quantity`, warranty periods and pricing bundles are value objects; purchase
/// orders, line items and stock lines are entities.
///
/// To "modify" a value object, create a new one. Every constructor validates,
/// so holding a value object means holding a valid value.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
