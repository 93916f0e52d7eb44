//! Per-item mutual exclusion.
//!
//! Transfers for the same item run one at a time; transfers for different
//! items never wait on each other.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};

use stockflow_core::ItemId;

use crate::ports::StoreError;

/// Table of items currently held by a transfer.
#[derive(Debug, Default)]
pub struct ItemLocks {
    held: Mutex<HashSet<ItemId>>,
    released: Condvar,
}

impl ItemLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `item_id` is free, then hold it until the guard drops.
    pub fn lock(&self, item_id: ItemId) -> Result<ItemLockGuard<'_>, StoreError> {
        let mut held = self.held.lock().map_err(|_| StoreError::Poisoned)?;
        while held.contains(&item_id) {
            held = self.released.wait(held).map_err(|_| StoreError::Poisoned)?;
        }
        held.insert(item_id);
        Ok(ItemLockGuard {
            locks: self,
            item_id,
        })
    }

    pub fn is_locked(&self, item_id: ItemId) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(&item_id))
            .unwrap_or(false)
    }
}

/// Releases its item on drop.
#[derive(Debug)]
pub struct ItemLockGuard<'a> {
    locks: &'a ItemLocks,
    item_id: ItemId,
}

impl Drop for ItemLockGuard<'_> {
    fn drop(&mut self) {
        // Always release, even if another holder panicked.
        let mut held = self.locks.held.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.item_id);
        drop(held);
        self.locks.released.notify_all();
    }
}
