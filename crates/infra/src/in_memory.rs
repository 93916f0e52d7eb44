//! In-memory stock store for tests/dev.
//!
//! All locations live behind one `RwLock`. A transaction reads through to the
//! shared state, stages its writes locally, and applies them in one write-lock
//! section on commit after re-checking every warehouse batch it touched
//! (compare-and-decrement).

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use stockflow_core::{BatchId, ItemId, LedgerEntryId};
use stockflow_inventory::{BatchInfo, ShelfCode};

use crate::ports::{
    LedgerEntry, ShelfStock, StockStore, StockTransaction, StoreError, TransferLedger,
    TransferRecord, WarehouseStock, WebInventory,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct WarehouseBatch {
    received_quantity: Decimal,
    available: Decimal,
    received_date: NaiveDate,
    expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Default)]
struct StockState {
    warehouse: BTreeMap<(ItemId, BatchId), WarehouseBatch>,
    shelves: BTreeMap<(ItemId, BatchId, ShelfCode), Decimal>,
    web: BTreeMap<(ItemId, BatchId), Decimal>,
    ledger: Vec<LedgerEntry>,
}

/// In-memory implementation of every stock port.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    state: RwLock<StockState>,
    fail_ledger_writes: AtomicBool,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a freshly received batch in the warehouse.
    ///
    /// Stands in for the receiving workflow, which lives outside this engine.
    pub fn seed_batch(
        &self,
        item_id: ItemId,
        batch_id: BatchId,
        quantity: Decimal,
        received_date: NaiveDate,
        expiry_date: Option<NaiveDate>,
    ) -> Result<(), StoreError> {
        if quantity < Decimal::ZERO {
            return Err(StoreError::Backend(format!(
                "batch {batch_id} cannot be received with negative quantity {quantity}"
            )));
        }

        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        if state.warehouse.contains_key(&(item_id, batch_id)) {
            return Err(StoreError::Conflict(format!(
                "batch {batch_id} of item {item_id} already received"
            )));
        }
        state.warehouse.insert(
            (item_id, batch_id),
            WarehouseBatch {
                received_quantity: quantity,
                available: quantity,
                received_date,
                expiry_date,
            },
        );
        Ok(())
    }

    /// Make every subsequent ledger write fail (fault injection for tests).
    pub fn fail_ledger_writes(&self, fail: bool) {
        self.fail_ledger_writes.store(fail, Ordering::SeqCst);
    }

    pub fn warehouse_quantity(
        &self,
        item_id: ItemId,
        batch_id: BatchId,
    ) -> Result<Decimal, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        state
            .warehouse
            .get(&(item_id, batch_id))
            .map(|b| b.available)
            .ok_or_else(|| StoreError::NotFound(format!("batch {batch_id} of item {item_id}")))
    }

    pub fn received_quantity(
        &self,
        item_id: ItemId,
        batch_id: BatchId,
    ) -> Result<Decimal, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        state
            .warehouse
            .get(&(item_id, batch_id))
            .map(|b| b.received_quantity)
            .ok_or_else(|| StoreError::NotFound(format!("batch {batch_id} of item {item_id}")))
    }

    pub fn shelf_quantity(
        &self,
        item_id: ItemId,
        batch_id: BatchId,
        shelf_code: &ShelfCode,
    ) -> Result<Decimal, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .shelves
            .get(&(item_id, batch_id, shelf_code.clone()))
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    /// Sum over every shelf holding this batch.
    pub fn total_on_shelves(
        &self,
        item_id: ItemId,
        batch_id: BatchId,
    ) -> Result<Decimal, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        state
            .shelves
            .iter()
            .filter(|((i, b, _), _)| *i == item_id && *b == batch_id)
            .try_fold(Decimal::ZERO, |acc, (_, qty)| checked_add(acc, *qty))
    }

    pub fn web_quantity(&self, item_id: ItemId, batch_id: BatchId) -> Result<Decimal, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.web.get(&(item_id, batch_id)).copied().unwrap_or(Decimal::ZERO))
    }

    /// Ledger entries for one item, in append order.
    pub fn ledger_entries(&self, item_id: ItemId) -> Result<Vec<LedgerEntry>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .ledger
            .iter()
            .filter(|e| e.item_id == item_id)
            .cloned()
            .collect())
    }
}

impl StockStore for InMemoryStockStore {
    type Transaction<'a> = InMemoryTransaction<'a>;

    fn begin(&self) -> Result<Self::Transaction<'_>, StoreError> {
        Ok(InMemoryTransaction {
            store: self,
            observed: BTreeMap::new(),
            decrements: BTreeMap::new(),
            shelf_adds: BTreeMap::new(),
            web_adds: BTreeMap::new(),
            ledger: Vec::new(),
        })
    }
}

/// Staged unit of work against an [`InMemoryStockStore`].
#[derive(Debug)]
pub struct InMemoryTransaction<'a> {
    store: &'a InMemoryStockStore,
    /// Warehouse quantity of every batch as first seen by this transaction.
    observed: BTreeMap<(ItemId, BatchId), Decimal>,
    decrements: BTreeMap<(ItemId, BatchId), Decimal>,
    shelf_adds: BTreeMap<(ItemId, BatchId, ShelfCode), Decimal>,
    web_adds: BTreeMap<(ItemId, BatchId), Decimal>,
    ledger: Vec<LedgerEntry>,
}

impl InMemoryTransaction<'_> {
    fn staged_available(&self, key: (ItemId, BatchId), committed: Decimal) -> Decimal {
        let base = self.observed.get(&key).copied().unwrap_or(committed);
        base - self.decrements.get(&key).copied().unwrap_or(Decimal::ZERO)
    }
}

fn checked_add(current: Decimal, amount: Decimal) -> Result<Decimal, StoreError> {
    current.checked_add(amount).ok_or_else(|| {
        StoreError::Backend(format!("quantity overflow adding {amount} to {current}"))
    })
}

fn ensure_positive(quantity: Decimal, what: &str) -> Result<(), StoreError> {
    if quantity <= Decimal::ZERO {
        return Err(StoreError::Backend(format!(
            "{what} quantity must be positive, got {quantity}"
        )));
    }
    Ok(())
}

impl WarehouseStock for InMemoryTransaction<'_> {
    fn find_available_batches(&mut self, item_id: ItemId) -> Result<Vec<BatchInfo>, StoreError> {
        let store = self.store;
        let state = store.state.read().map_err(|_| StoreError::Poisoned)?;

        let mut batches = Vec::new();
        for (&key, batch) in state.warehouse.iter().filter(|((i, _), _)| *i == item_id) {
            let batch_id = key.1;
            let available = self.staged_available(key, batch.available);
            self.observed.entry(key).or_insert(batch.available);
            if available <= Decimal::ZERO {
                continue;
            }
            let info = BatchInfo::new(batch_id, available, batch.received_date, batch.expiry_date)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            batches.push(info);
        }
        Ok(batches)
    }

    fn allocate_from_batches(
        &mut self,
        item_id: ItemId,
        allocations: &BTreeMap<BatchId, Decimal>,
    ) -> Result<(), StoreError> {
        let store = self.store;
        let state = store.state.read().map_err(|_| StoreError::Poisoned)?;

        // Validate the whole map before staging any of it.
        let mut staged = Vec::with_capacity(allocations.len());
        for (&batch_id, &amount) in allocations {
            ensure_positive(amount, "decrement")?;
            let key = (item_id, batch_id);
            let batch = state.warehouse.get(&key).ok_or_else(|| {
                StoreError::NotFound(format!("batch {batch_id} of item {item_id}"))
            })?;
            let available = self.staged_available(key, batch.available);
            if amount > available {
                return Err(StoreError::Conflict(format!(
                    "batch {batch_id} of item {item_id} has {available}, cannot take {amount}"
                )));
            }
            let already = self.decrements.get(&key).copied().unwrap_or(Decimal::ZERO);
            staged.push((key, batch.available, checked_add(already, amount)?));
        }

        for (key, committed, total) in staged {
            self.observed.entry(key).or_insert(committed);
            self.decrements.insert(key, total);
        }
        Ok(())
    }
}

impl ShelfStock for InMemoryTransaction<'_> {
    fn add_to_shelf(
        &mut self,
        item_id: ItemId,
        batch_id: BatchId,
        shelf_code: &ShelfCode,
        quantity: Decimal,
    ) -> Result<(), StoreError> {
        ensure_positive(quantity, "shelf")?;
        let staged = self
            .shelf_adds
            .entry((item_id, batch_id, shelf_code.clone()))
            .or_insert(Decimal::ZERO);
        *staged = checked_add(*staged, quantity)?;
        Ok(())
    }
}

impl WebInventory for InMemoryTransaction<'_> {
    fn add_to_web(
        &mut self,
        item_id: ItemId,
        batch_id: BatchId,
        quantity: Decimal,
    ) -> Result<(), StoreError> {
        ensure_positive(quantity, "web")?;
        let staged = self
            .web_adds
            .entry((item_id, batch_id))
            .or_insert(Decimal::ZERO);
        *staged = checked_add(*staged, quantity)?;
        Ok(())
    }
}

impl TransferLedger for InMemoryTransaction<'_> {
    fn record_transfer(&mut self, record: TransferRecord) -> Result<LedgerEntryId, StoreError> {
        if self.store.fail_ledger_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("transfer ledger unavailable".to_string()));
        }
        let entry_id = LedgerEntryId::new();
        self.ledger
            .push(LedgerEntry::from_record(record, entry_id, Utc::now()));
        Ok(entry_id)
    }
}

impl StockTransaction for InMemoryTransaction<'_> {
    fn commit(self) -> Result<(), StoreError> {
        let store = self.store;
        let mut state = store.state.write().map_err(|_| StoreError::Poisoned)?;

        // Compare-and-decrement: every touched batch must still hold what we read.
        for (key, amount) in &self.decrements {
            let (item_id, batch_id) = *key;
            let batch = state.warehouse.get(key).ok_or_else(|| {
                StoreError::NotFound(format!("batch {batch_id} of item {item_id}"))
            })?;
            let observed = self.observed.get(key).copied().unwrap_or(batch.available);
            if batch.available != observed {
                return Err(StoreError::Conflict(format!(
                    "batch {batch_id} of item {item_id} changed from {observed} to {}",
                    batch.available
                )));
            }
            if batch.available < *amount {
                return Err(StoreError::Conflict(format!(
                    "batch {batch_id} of item {item_id} would go negative"
                )));
            }
        }

        // Compute every destination total before touching shared state.
        let mut shelves = Vec::with_capacity(self.shelf_adds.len());
        for (key, amount) in self.shelf_adds {
            let current = state.shelves.get(&key).copied().unwrap_or(Decimal::ZERO);
            shelves.push((key, checked_add(current, amount)?));
        }
        let mut web = Vec::with_capacity(self.web_adds.len());
        for (key, amount) in self.web_adds {
            let current = state.web.get(&key).copied().unwrap_or(Decimal::ZERO);
            web.push((key, checked_add(current, amount)?));
        }

        for (key, amount) in self.decrements {
            if let Some(batch) = state.warehouse.get_mut(&key) {
                batch.available -= amount;
            }
        }
        state.shelves.extend(shelves);
        state.web.extend(web);
        state.ledger.extend(self.ledger);
        Ok(())
    }
}
