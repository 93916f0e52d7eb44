//! Inventory allocation domain module.
//!
//! This crate contains the business rules for choosing which batches satisfy a
//! dispatch request, implemented purely as deterministic domain logic (no IO,
//! no storage).

pub mod batch;
pub mod location;
pub mod strategy;

pub use batch::{BatchAllocation, BatchInfo};
pub use location::{Location, ShelfCode};
pub use strategy::{
    FifoWithExpiryStrategy, SelectionPolicy, StockSelectionStrategy, total_allocated,
};
