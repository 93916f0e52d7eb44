use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use stockflow_core::{BatchId, DomainError, DomainResult, ValueObject};

/// Read-only snapshot of one warehouse batch's dispatchable state.
///
/// Produced by the warehouse collaborator for a single item; not a stored
/// entity. A batch without an expiry date is non-perishable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BatchInfo {
    batch_id: BatchId,
    available_quantity: Decimal,
    received_date: NaiveDate,
    expiry_date: Option<NaiveDate>,
}

impl BatchInfo {
    /// Build a snapshot. Zero availability is allowed, negative is not.
    pub fn new(
        batch_id: BatchId,
        available_quantity: Decimal,
        received_date: NaiveDate,
        expiry_date: Option<NaiveDate>,
    ) -> DomainResult<Self> {
        if available_quantity < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "available quantity cannot be negative (batch {batch_id}: {available_quantity})"
            )));
        }
        Ok(Self {
            batch_id,
            available_quantity,
            received_date,
            expiry_date,
        })
    }

    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    pub fn available_quantity(&self) -> Decimal {
        self.available_quantity
    }

    pub fn received_date(&self) -> NaiveDate {
        self.received_date
    }

    pub fn expiry_date(&self) -> Option<NaiveDate> {
        self.expiry_date
    }

    pub fn is_perishable(&self) -> bool {
        self.expiry_date.is_some()
    }
}

impl ValueObject for BatchInfo {}

/// One line of an allocation plan: take `allocated_quantity` from `batch_id`.
///
/// Transient; it drives writes but is never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BatchAllocation {
    batch_id: BatchId,
    allocated_quantity: Decimal,
}

impl BatchAllocation {
    pub fn new(batch_id: BatchId, allocated_quantity: Decimal) -> DomainResult<Self> {
        if allocated_quantity <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "allocated quantity must be positive (batch {batch_id}: {allocated_quantity})"
            )));
        }
        Ok(Self {
            batch_id,
            allocated_quantity,
        })
    }

    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    pub fn allocated_quantity(&self) -> Decimal {
        self.allocated_quantity
    }
}

impl ValueObject for BatchAllocation {}
