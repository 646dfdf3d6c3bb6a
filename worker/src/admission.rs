//! Per-zone admission control.
//!
//! Each zone may admit at most `zone_capacity` orders, ever. The ledger
//! tracks a per-zone accepted count, seeded from the broker offset of the
//! first message observed for the zone after partition assignment: the
//! offset equals the number of orders already delivered on that partition,
//! so the seed can overcount prior acceptances (rejected orders consume
//! offsets too) but never undercount them. Overcounting only makes the
//! ceiling tighter, which keeps the invariant `admitted <= zone_capacity`
//! across crashes and restarts.
//!
//! The ledger must be cleared whenever partition ownership changes: a
//! counter carried across a rebalance could miss acceptances made by the
//! interim owner.

use encore_core::types::ZoneId;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Tracks how many orders have been admitted per zone on this replica.
#[derive(Default)]
pub struct AdmissionLedger {
    counters: Mutex<HashMap<ZoneId, u64>>,
}

impl AdmissionLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to admit one order for `zone_id`.
    ///
    /// `offset` is the broker offset of the message being judged; it seeds
    /// the counter the first time the zone is seen after assignment.
    /// Returns `false` once the zone's capacity is exhausted.
    #[must_use]
    pub fn admit(&self, zone_id: &ZoneId, offset: i64, zone_capacity: i32) -> bool {
        let capacity = u64::try_from(zone_capacity).unwrap_or(0);
        let seed = u64::try_from(offset).unwrap_or(0);

        let mut counters = self.lock();
        let accepted = counters.entry(zone_id.clone()).or_insert(seed);

        if *accepted >= capacity {
            return false;
        }
        *accepted += 1;
        true
    }

    /// Forget all counters. Called when partition ownership changes.
    pub fn reset(&self) {
        self.lock().clear();
    }

    /// Number of zones currently tracked.
    #[must_use]
    pub fn tracked_zones(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ZoneId, u64>> {
        match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_exactly_capacity_from_a_fresh_partition() {
        let ledger = AdmissionLedger::new();
        let zone = ZoneId::new("zon_c1_1");

        for offset in 0..3 {
            assert!(ledger.admit(&zone, offset, 3), "offset {offset} should pass");
        }
        assert!(!ledger.admit(&zone, 3, 3));
        assert!(!ledger.admit(&zone, 4, 3));
    }

    #[test]
    fn seed_from_offset_counts_prior_deliveries() {
        let ledger = AdmissionLedger::new();
        let zone = ZoneId::new("zon_c1_1");

        // First message seen at offset 2: two orders were already delivered
        // before this replica took over.
        assert!(ledger.admit(&zone, 2, 3));
        assert!(!ledger.admit(&zone, 3, 3));
    }

    #[test]
    fn reset_reseeds_from_the_next_offset() {
        let ledger = AdmissionLedger::new();
        let zone = ZoneId::new("zon_c1_1");

        assert!(ledger.admit(&zone, 0, 5));
        ledger.reset();
        assert_eq!(ledger.tracked_zones(), 0);

        // After a rebalance the same message range may be redelivered; the
        // counter picks the offset back up instead of double-counting.
        assert!(ledger.admit(&zone, 1, 5));
    }

    #[test]
    fn zones_are_independent() {
        let ledger = AdmissionLedger::new();
        let full = ZoneId::new("zon_c1_1");
        let open = ZoneId::new("zon_c1_2");

        assert!(ledger.admit(&full, 0, 1));
        assert!(!ledger.admit(&full, 1, 1));
        assert!(ledger.admit(&open, 0, 1));
    }
}
