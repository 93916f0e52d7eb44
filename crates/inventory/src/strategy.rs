//! Batch selection policies.
//!
//! A policy turns a snapshot of candidate batches and a requested quantity into
//! an ordered allocation plan. Policies are pure: same input, same plan.

use core::cmp::Ordering;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult};

use crate::batch::{BatchAllocation, BatchInfo};

/// Chooses which batches satisfy a dispatch request.
///
/// Implementations must be deterministic and must not depend on anything but
/// their input (no clock, no randomness). Under-capacity is not an error: the
/// plan then sums to less than `requested` and the caller decides what to do.
pub trait StockSelectionStrategy {
    fn select_batches_for_dispatch(
        &self,
        candidates: &[BatchInfo],
        requested: Decimal,
    ) -> DomainResult<Vec<BatchAllocation>>;
}

/// Expiry-aware FIFO.
///
/// Dispatch order:
/// 1. perishable batches before non-perishable ones
/// 2. soonest expiry first (overrides receipt order)
/// 3. oldest receipt first
///
/// Batch id breaks any remaining tie so the order is total.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FifoWithExpiryStrategy;

impl FifoWithExpiryStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Dispatch ordering between two batches.
    pub fn dispatch_order(a: &BatchInfo, b: &BatchInfo) -> Ordering {
        let expiry_rank = |batch: &BatchInfo| (!batch.is_perishable(), batch.expiry_date());
        expiry_rank(a)
            .cmp(&expiry_rank(b))
            .then_with(|| a.received_date().cmp(&b.received_date()))
            .then_with(|| a.batch_id().cmp(&b.batch_id()))
    }
}

impl StockSelectionStrategy for FifoWithExpiryStrategy {
    fn select_batches_for_dispatch(
        &self,
        candidates: &[BatchInfo],
        requested: Decimal,
    ) -> DomainResult<Vec<BatchAllocation>> {
        if requested < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "requested quantity cannot be negative: {requested}"
            )));
        }
        if requested.is_zero() || candidates.is_empty() {
            return Ok(vec![]);
        }

        let mut ordered: Vec<&BatchInfo> = candidates.iter().collect();
        ordered.sort_by(|a, b| Self::dispatch_order(a, b));

        let mut remaining = requested;
        let mut plan = Vec::new();
        for batch in ordered {
            if remaining.is_zero() {
                break;
            }
            let take = remaining.min(batch.available_quantity());
            if take > Decimal::ZERO {
                plan.push(BatchAllocation::new(batch.batch_id(), take)?);
                remaining -= take;
            }
        }

        Ok(plan)
    }
}

/// Closed set of selectable policies.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    #[default]
    FifoWithExpiry,
}

impl SelectionPolicy {
    pub fn name(self) -> &'static str {
        match self {
            SelectionPolicy::FifoWithExpiry => "fifo-with-expiry",
        }
    }
}

impl StockSelectionStrategy for SelectionPolicy {
    fn select_batches_for_dispatch(
        &self,
        candidates: &[BatchInfo],
        requested: Decimal,
    ) -> DomainResult<Vec<BatchAllocation>> {
        match self {
            SelectionPolicy::FifoWithExpiry => {
                FifoWithExpiryStrategy.select_batches_for_dispatch(candidates, requested)
            }
        }
    }
}

impl core::fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SelectionPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "fifo-with-expiry" | "fefo" => Ok(SelectionPolicy::FifoWithExpiry),
            other => Err(DomainError::validation(format!(
                "unknown selection policy: {other}"
            ))),
        }
    }
}

/// Sum of every line in a plan.
pub fn total_allocated(plan: &[BatchAllocation]) -> Decimal {
    plan.iter().map(BatchAllocation::allocated_quantity).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDate};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use stockflow_core::BatchId;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn batch(
        id: i64,
        available: Decimal,
        received: NaiveDate,
        expiry: Option<NaiveDate>,
    ) -> BatchInfo {
        BatchInfo::new(BatchId::new(id).unwrap(), available, received, expiry).unwrap()
    }

    fn alloc(id: i64, qty: Decimal) -> BatchAllocation {
        BatchAllocation::new(BatchId::new(id).unwrap(), qty).unwrap()
    }

    fn select(candidates: &[BatchInfo], requested: Decimal) -> Vec<BatchAllocation> {
        FifoWithExpiryStrategy
            .select_batches_for_dispatch(candidates, requested)
            .unwrap()
    }

    #[test]
    fn same_expiry_falls_back_to_receipt_order() {
        let x = batch(1, dec!(5), date(2025, 1, 1), Some(date(2025, 12, 31)));
        let y = batch(2, dec!(10), date(2025, 2, 1), Some(date(2025, 12, 31)));

        let plan = select(&[y, x], dec!(8));
        assert_eq!(plan, vec![alloc(1, dec!(5)), alloc(2, dec!(3))]);
    }

    #[test]
    fn earlier_expiry_wins_over_earlier_receipt() {
        let x = batch(1, dec!(10), date(2025, 1, 1), Some(date(2025, 3, 31)));
        let y = batch(2, dec!(10), date(2025, 2, 1), Some(date(2025, 2, 28)));

        let plan = select(&[x, y], dec!(6));
        assert_eq!(plan, vec![alloc(2, dec!(6))]);
    }

    #[test]
    fn perishable_goes_before_non_perishable() {
        let x = batch(1, dec!(5), date(2025, 1, 1), None);
        let y = batch(2, dec!(10), date(2025, 2, 1), Some(date(2025, 2, 15)));

        let plan = select(&[x, y], dec!(7));
        assert_eq!(plan, vec![alloc(2, dec!(7))]);
    }

    #[test]
    fn non_perishables_are_plain_fifo() {
        let newer = batch(1, dec!(4), date(2025, 3, 1), None);
        let older = batch(2, dec!(4), date(2025, 1, 1), None);

        let plan = select(&[newer, older], dec!(6));
        assert_eq!(plan, vec![alloc(2, dec!(4)), alloc(1, dec!(2))]);
    }

    #[test]
    fn under_capacity_returns_short_plan() {
        let x = batch(1, dec!(2), date(2025, 1, 1), None);
        let y = batch(2, dec!(3), date(2025, 1, 2), None);

        let plan = select(&[x, y], dec!(100));
        assert_eq!(total_allocated(&plan), dec!(5));
    }

    #[test]
    fn zero_request_and_empty_candidates_yield_empty_plan() {
        let x = batch(1, dec!(2), date(2025, 1, 1), None);
        assert!(select(&[x], dec!(0)).is_empty());
        assert!(select(&[], dec!(10)).is_empty());
    }

    #[test]
    fn negative_request_is_rejected() {
        let err = FifoWithExpiryStrategy
            .select_batches_for_dispatch(&[], dec!(-1))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn empty_batches_are_skipped() {
        let empty = batch(1, dec!(0), date(2024, 1, 1), Some(date(2024, 2, 1)));
        let full = batch(2, dec!(3), date(2025, 1, 1), Some(date(2025, 2, 1)));

        let plan = select(&[empty, full], dec!(2));
        assert_eq!(plan, vec![alloc(2, dec!(2))]);
    }

    #[test]
    fn fractional_quantities_are_exact() {
        let x = batch(1, dec!(0.3), date(2025, 1, 1), None);
        let y = batch(2, dec!(0.3), date(2025, 1, 2), None);

        let plan = select(&[x, y], dec!(0.45));
        assert_eq!(plan, vec![alloc(1, dec!(0.3)), alloc(2, dec!(0.15))]);
    }

    #[test]
    fn policy_delegates_and_parses() {
        let x = batch(1, dec!(5), date(2025, 1, 1), None);
        let policy: SelectionPolicy = "FIFO_WITH_EXPIRY".parse().unwrap();
        assert_eq!(policy, SelectionPolicy::FifoWithExpiry);
        assert_eq!(
            policy.select_batches_for_dispatch(&[x.clone()], dec!(1)).unwrap(),
            select(&[x], dec!(1))
        );
        assert!("lifo".parse::<SelectionPolicy>().is_err());
        assert_eq!(SelectionPolicy::default().to_string(), "fifo-with-expiry");
    }

    fn arb_batches() -> impl Strategy<Value = Vec<BatchInfo>> {
        prop::collection::vec(
            (0i64..5_000, 0u64..60, prop::option::of(0u64..60)),
            0..12,
        )
        .prop_map(|rows| {
            let base = date(2025, 1, 1);
            rows.into_iter()
                .enumerate()
                .map(|(idx, (cents, received, expiry))| {
                    batch(
                        idx as i64 + 1,
                        Decimal::new(cents, 2),
                        base + Days::new(received),
                        expiry.map(|d| base + Days::new(d)),
                    )
                })
                .collect()
        })
    }

    fn position(plan: &[BatchAllocation], b: &BatchInfo) -> Option<usize> {
        plan.iter().position(|a| a.batch_id() == b.batch_id())
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the plan covers min(requested, capacity) exactly.
        #[test]
        fn plan_total_is_min_of_request_and_capacity(
            batches in arb_batches(),
            requested_cents in 1i64..80_000,
        ) {
            let requested = Decimal::new(requested_cents, 2);
            let capacity: Decimal = batches.iter().map(BatchInfo::available_quantity).sum();

            let plan = select(&batches, requested);

            prop_assert_eq!(total_allocated(&plan), requested.min(capacity));
        }

        /// Property: no line exceeds its batch's availability, and each batch appears once.
        #[test]
        fn lines_never_exceed_availability(
            batches in arb_batches(),
            requested_cents in 1i64..80_000,
        ) {
            let plan = select(&batches, Decimal::new(requested_cents, 2));

            for line in &plan {
                let source = batches.iter().find(|b| b.batch_id() == line.batch_id()).unwrap();
                prop_assert!(line.allocated_quantity() <= source.available_quantity());
                prop_assert!(line.allocated_quantity() > Decimal::ZERO);
                prop_assert_eq!(plan.iter().filter(|a| a.batch_id() == line.batch_id()).count(), 1);
            }
        }

        /// Property: dispatched batches respect expiry, then receipt order.
        #[test]
        fn plan_follows_dispatch_order(
            batches in arb_batches(),
            requested_cents in 1i64..80_000,
        ) {
            let plan = select(&batches, Decimal::new(requested_cents, 2));

            for a in &batches {
                for b in &batches {
                    let (Some(pa), Some(pb)) = (position(&plan, a), position(&plan, b)) else {
                        continue;
                    };
                    match (a.expiry_date(), b.expiry_date()) {
                        (Some(ea), Some(eb)) if ea < eb => prop_assert!(pa < pb),
                        (Some(_), None) => prop_assert!(pa < pb),
                        (ea, eb) if ea == eb && a.received_date() < b.received_date() => {
                            prop_assert!(pa < pb)
                        }
                        _ => {}
                    }
                }
            }
        }

        /// Property: a batch is only left untouched if everything ordered before it
        /// already covered the request.
        #[test]
        fn later_batches_only_used_when_earlier_exhausted(
            batches in arb_batches(),
            requested_cents in 1i64..80_000,
        ) {
            let plan = select(&batches, Decimal::new(requested_cents, 2));

            for window in plan.windows(2) {
                let earlier = batches
                    .iter()
                    .find(|b| b.batch_id() == window[0].batch_id())
                    .unwrap();
                prop_assert_eq!(window[0].allocated_quantity(), earlier.available_quantity());
            }
        }

        /// Property: identical input produces identical ordered output.
        #[test]
        fn selection_is_deterministic(
            batches in arb_batches(),
            requested_cents in 0i64..80_000,
        ) {
            let requested = Decimal::new(requested_cents, 2);
            let mut reversed = batches.clone();
            reversed.reverse();

            let first = select(&batches, requested);
            prop_assert_eq!(&first, &select(&batches, requested));
            prop_assert_eq!(&first, &select(&reversed, requested));
        }
    }
}
