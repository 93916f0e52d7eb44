//! Collaborator ports consumed by the transfer engine.
//!
//! These traits make no storage assumptions. A backend groups them behind a
//! [`StockStore`] so that one transfer's reads and writes share a single
//! transactional boundary.
//!
//! ## Transaction contract
//!
//! - Writes made through a [`StockTransaction`] are invisible to other callers
//!   until [`StockTransaction::commit`] succeeds.
//! - Dropping a transaction without committing discards every staged write.
//! - `commit` is all-or-nothing: if the warehouse moved underneath the
//!   transaction (a batch's quantity changed since it was read) it fails with
//!   [`StoreError::Conflict`] and applies nothing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockflow_core::{BatchId, ItemId, LedgerEntryId};
use stockflow_inventory::{BatchInfo, Location, ShelfCode};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("stock changed concurrently: {0}")]
    Conflict(String),

    #[error("backend failure: {0}")]
    Backend(String),

    #[error("lock poisoned")]
    Poisoned,
}

/// Warehouse side: the source of every transfer.
pub trait WarehouseStock {
    /// Batches of `item_id` with a strictly positive available quantity.
    fn find_available_batches(&mut self, item_id: ItemId) -> Result<Vec<BatchInfo>, StoreError>;

    /// Decrement each named batch by its amount, all or nothing.
    fn allocate_from_batches(
        &mut self,
        item_id: ItemId,
        allocations: &BTreeMap<BatchId, Decimal>,
    ) -> Result<(), StoreError>;
}

/// In-store shelves, keyed by (item, batch, shelf).
pub trait ShelfStock {
    /// Additive upsert; creates the shelf record if absent.
    fn add_to_shelf(
        &mut self,
        item_id: ItemId,
        batch_id: BatchId,
        shelf_code: &ShelfCode,
        quantity: Decimal,
    ) -> Result<(), StoreError>;
}

/// Web sales channel, keyed by (item, batch).
pub trait WebInventory {
    /// Additive upsert; creates the web record if absent.
    fn add_to_web(
        &mut self,
        item_id: ItemId,
        batch_id: BatchId,
        quantity: Decimal,
    ) -> Result<(), StoreError>;
}

/// One movement to be written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub item_id: ItemId,
    pub batch_id: BatchId,
    pub from: Location,
    pub to: Location,
    /// Set when `to` is a shelf.
    pub shelf_code: Option<ShelfCode>,
    pub quantity: Decimal,
    pub reference: String,
}

/// Append-only audit record of one batch movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: LedgerEntryId,
    pub item_id: ItemId,
    pub batch_id: BatchId,
    pub from: Location,
    pub to: Location,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub shelf_code: Option<ShelfCode>,
    pub quantity: Decimal,
    pub reference: String,
    pub recorded_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn from_record(
        record: TransferRecord,
        entry_id: LedgerEntryId,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id,
            item_id: record.item_id,
            batch_id: record.batch_id,
            from: record.from,
            to: record.to,
            shelf_code: record.shelf_code,
            quantity: record.quantity,
            reference: record.reference,
            recorded_at,
        }
    }
}

/// Transfer audit ledger. A failed write aborts the transfer.
pub trait TransferLedger {
    fn record_transfer(&mut self, record: TransferRecord) -> Result<LedgerEntryId, StoreError>;
}

/// Every port, scoped to one unit of work.
pub trait StockTransaction: WarehouseStock + ShelfStock + WebInventory + TransferLedger {
    /// Publish all staged writes atomically.
    fn commit(self) -> Result<(), StoreError>;
}

/// Backend entry point: opens transactions over the ports.
pub trait StockStore: Send + Sync {
    type Transaction<'a>: StockTransaction
    where
        Self: 'a;

    fn begin(&self) -> Result<Self::Transaction<'_>, StoreError>;
}
