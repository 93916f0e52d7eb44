//! Infrastructure layer: collaborator ports, in-memory adapters, transfer
//! orchestration, config.

pub mod config;
pub mod in_memory;
pub mod locks;
pub mod ports;
pub mod transfer;


pub use config::{ConfigError, TransferConfig};
pub use in_memory::{InMemoryStockStore, InMemoryTransaction};
pub use locks::{ItemLockGuard, ItemLocks};
pub use ports::{
    LedgerEntry, ShelfStock, StockStore, StockTransaction, StoreError, TransferLedger,
    TransferRecord, WarehouseStock, WebInventory,
};
pub use transfer::{Destination, TransferError, TransferReceipt, TransferService};
