//! Value object trait: equality by value, not identity.
//!
//! Batch snapshots and allocation lines have **no identity** of their own: two
//! snapshots of the same batch with the same quantity and dates are the same
//! value.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// build a new one through its validating constructor.
///
/// ## Design Constraints
///
/// - **Clone**: values are cheap to copy and are handed out by value
/// - **PartialEq**: compared by their attribute values
/// - **Debug**: shows up in logs and test failures
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct ShelfSlot {
///     aisle: u16,
///     bay: u16,
/// }
///
/// impl ValueObject for ShelfSlot {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
