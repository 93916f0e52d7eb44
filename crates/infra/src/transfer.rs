//! Warehouse → channel transfer orchestration.
//!
//! ## Transfer Flow
//!
//! ```text
//! transfer_to_shelf / transfer_to_web
//!   ↓
//! 0. Validate input (no collaborator touched)
//!   ↓
//! 1. Lock the item, open a store transaction, read available batches
//!   ↓
//! 2. Gate: total available < requested → InsufficientStock, zero writes
//!   ↓
//! 3. Plan with the configured selection policy (pure)
//!   ↓
//! 4. Per allocation: destination upsert + ledger entry
//!   ↓
//! 5. Decrement the warehouse with the whole allocation map
//!   ↓
//! 6. Commit
//! ```
//!
//! Steps 1–6 run under the item's lock and inside one transaction, so the gate
//! in step 2 and the decrement in step 5 see the same stock. Any failure drops
//! the transaction and nothing is applied. No retries happen here.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use stockflow_core::{DomainError, ItemId, LedgerEntryId};
use stockflow_inventory::{
    BatchAllocation, BatchInfo, Location, SelectionPolicy, ShelfCode, StockSelectionStrategy,
    total_allocated,
};

use crate::config::TransferConfig;
use crate::locks::ItemLocks;
use crate::ports::{
    ShelfStock, StockStore, StockTransaction, StoreError, TransferLedger, TransferRecord,
    WarehouseStock, WebInventory,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Bad input (non-positive quantity, blank shelf code). Nothing was called.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Not enough stock across all batches; nothing was written.
    #[error("insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: ItemId,
        requested: Decimal,
        available: Decimal,
    },

    /// The allocation plan broke a post-condition (e.g. did not cover the request).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A port failed; propagated unchanged.
    #[error(transparent)]
    Collaborator(#[from] StoreError),
}

impl From<DomainError> for TransferError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                TransferError::Validation(msg)
            }
        }
    }
}

/// Where transferred stock lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Shelf(ShelfCode),
    Web,
}

impl Destination {
    pub fn location(&self) -> Location {
        match self {
            Destination::Shelf(_) => Location::Shelf,
            Destination::Web => Location::Web,
        }
    }

    fn shelf_code(&self) -> Option<&ShelfCode> {
        match self {
            Destination::Shelf(code) => Some(code),
            Destination::Web => None,
        }
    }
}

impl core::fmt::Display for Destination {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.shelf_code() {
            Some(code) => write!(f, "{}:{code}", self.location()),
            None => write!(f, "{}", self.location()),
        }
    }
}

/// Outcome of a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub reference: String,
    pub item_id: ItemId,
    pub destination: Destination,
    /// In dispatch order.
    pub allocations: Vec<BatchAllocation>,
    pub ledger_entries: Vec<LedgerEntryId>,
    pub total: Decimal,
}

/// Moves stock from the warehouse to a sales channel, batch by batch.
///
/// Generic over the backing store so tests run on
/// [`InMemoryStockStore`](crate::in_memory::InMemoryStockStore) and a real
/// backend only has to implement the ports.
#[derive(Debug)]
pub struct TransferService<S> {
    store: S,
    locks: ItemLocks,
    policy: SelectionPolicy,
    reference_prefix: String,
}

impl<S> TransferService<S> {
    pub fn new(store: S, config: &TransferConfig) -> Self {
        Self {
            store,
            locks: ItemLocks::new(),
            policy: config.selection_policy,
            reference_prefix: config.reference_prefix.clone(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    fn next_reference(&self) -> String {
        format!("{}-{}", self.reference_prefix, Uuid::now_v7())
    }
}

impl<S> TransferService<S>
where
    S: StockStore,
{
    /// Move `quantity` of `item_id` from the warehouse onto shelf `shelf_code`.
    pub fn transfer_to_shelf(
        &self,
        item_id: ItemId,
        shelf_code: &str,
        quantity: Decimal,
    ) -> Result<TransferReceipt, TransferError> {
        let shelf_code = ShelfCode::new(shelf_code).map_err(TransferError::from)?;
        self.transfer(item_id, Destination::Shelf(shelf_code), quantity)
    }

    /// Move `quantity` of `item_id` from the warehouse to the web channel.
    pub fn transfer_to_web(
        &self,
        item_id: ItemId,
        quantity: Decimal,
    ) -> Result<TransferReceipt, TransferError> {
        self.transfer(item_id, Destination::Web, quantity)
    }

    fn transfer(
        &self,
        item_id: ItemId,
        destination: Destination,
        quantity: Decimal,
    ) -> Result<TransferReceipt, TransferError> {
        if quantity <= Decimal::ZERO {
            return Err(TransferError::Validation(format!(
                "transfer quantity must be positive, got {quantity}"
            )));
        }

        let _guard = self.locks.lock(item_id)?;
        let mut tx = self.store.begin()?;

        // 1) Read
        let batches = tx.find_available_batches(item_id).inspect_err(|e| {
            warn!(item = %item_id, error = %e, "failed to read warehouse batches");
        })?;

        // 2) Gate (before any write)
        let available = total_available(&batches).ok_or_else(|| {
            TransferError::Validation(format!(
                "available stock of item {item_id} exceeds the representable quantity"
            ))
        })?;
        if available < quantity {
            warn!(
                item = %item_id,
                destination = %destination,
                requested = %quantity,
                available = %available,
                "insufficient warehouse stock"
            );
            return Err(TransferError::InsufficientStock {
                item_id,
                requested: quantity,
                available,
            });
        }

        // 3) Plan
        let plan = self.policy.select_batches_for_dispatch(&batches, quantity)?;
        let total = total_allocated(&plan);
        if total != quantity {
            return Err(TransferError::InvariantViolation(format!(
                "allocation plan covers {total} of {quantity} for item {item_id}"
            )));
        }

        // 4) Destination + ledger
        let reference = self.next_reference();
        let ledger_entries = apply_plan(&mut tx, item_id, &destination, &plan, &reference)
            .inspect_err(|e| {
                warn!(item = %item_id, reference = %reference, error = %e, "transfer aborted");
            })?;

        // 5) Warehouse decrement, one call
        let decrements: BTreeMap<_, _> = plan
            .iter()
            .map(|line| (line.batch_id(), line.allocated_quantity()))
            .collect();
        tx.allocate_from_batches(item_id, &decrements)
            .inspect_err(|e| {
                warn!(
                    item = %item_id,
                    reference = %reference,
                    error = %e,
                    "warehouse decrement failed"
                );
            })?;

        // 6) Commit
        tx.commit().inspect_err(|e| {
            warn!(item = %item_id, reference = %reference, error = %e, "transfer commit failed");
        })?;

        info!(
            item = %item_id,
            destination = %destination,
            reference = %reference,
            batches = plan.len(),
            total = %total,
            policy = %self.policy,
            "stock transferred"
        );

        Ok(TransferReceipt {
            reference,
            item_id,
            destination,
            allocations: plan,
            ledger_entries,
            total,
        })
    }
}

/// Sum of batch availability; `None` if it does not fit in a `Decimal`.
fn total_available(batches: &[BatchInfo]) -> Option<Decimal> {
    batches
        .iter()
        .try_fold(Decimal::ZERO, |acc, batch| acc.checked_add(batch.available_quantity()))
}

/// Stage destination upserts and ledger entries for every plan line.
fn apply_plan<T>(
    tx: &mut T,
    item_id: ItemId,
    destination: &Destination,
    plan: &[BatchAllocation],
    reference: &str,
) -> Result<Vec<LedgerEntryId>, StoreError>
where
    T: ShelfStock + WebInventory + TransferLedger,
{
    let mut entries = Vec::with_capacity(plan.len());
    for line in plan {
        let batch_id = line.batch_id();
        let qty = line.allocated_quantity();

        match destination {
            Destination::Shelf(code) => tx.add_to_shelf(item_id, batch_id, code, qty)?,
            Destination::Web => tx.add_to_web(item_id, batch_id, qty)?,
        }

        let entry_id = tx.record_transfer(TransferRecord {
            item_id,
            batch_id,
            from: Location::Warehouse,
            to: destination.location(),
            shelf_code: destination.shelf_code().cloned(),
            quantity: qty,
            reference: reference.to_string(),
        })?;
        entries.push(entry_id);

        debug!(
            item = %item_id,
            batch = %batch_id,
            quantity = %qty,
            to = %destination,
            "batch allocated"
        );
    }
    Ok(entries)
}
