//! Drift analysis: pure comparison of a current allocation against a target.

use std::collections::BTreeMap;

use crate::types::{Allocation, DriftResult, Urgency};

/// Urgency buckets over total drift, in percentage points. Shared across
/// every wallet; per-wallet tuning happens through thresholds, not here.
pub const URGENCY_MEDIUM_AT: f64 = 10.0;
pub const URGENCY_HIGH_AT: f64 = 15.0;
pub const URGENCY_CRITICAL_AT: f64 = 20.0;

/// Stateless drift computation. No I/O, no clocks: identical inputs always
/// produce identical output.
pub struct DriftAnalyzer;

impl DriftAnalyzer {
    /// Computes per-asset and aggregate drift of `current` against `target`.
    ///
    /// Every symbol present in either allocation is compared; a symbol
    /// missing on one side contributes its full weight on the other as
    /// drift. Per-asset drift is signed (current - target); the total is
    /// the sum of absolute values.
    #[must_use]
    pub fn compute(current: &Allocation, target: &Allocation) -> DriftResult {
        let mut per_asset_drift = BTreeMap::new();
        let mut total_drift = 0.0;

        for symbol in current.symbols_with(target) {
            let drift = current.weight(&symbol) - target.weight(&symbol);
            total_drift += drift.abs();
            per_asset_drift.insert(symbol, drift);
        }

        DriftResult {
            per_asset_drift,
            total_drift,
            urgency: Self::urgency_for(total_drift),
        }
    }

    /// Maps total drift onto its urgency bucket.
    #[must_use]
    pub fn urgency_for(total_drift: f64) -> Urgency {
        if total_drift >= URGENCY_CRITICAL_AT {
            Urgency::Critical
        } else if total_drift >= URGENCY_HIGH_AT {
            Urgency::High
        } else if total_drift >= URGENCY_MEDIUM_AT {
            Urgency::Medium
        } else {
            Urgency::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_drift_for_identical_allocations() {
        let alloc = Allocation::from([("ETH", 60.0), ("USDC", 25.0), ("LINK", 15.0)]);
        let result = DriftAnalyzer::compute(&alloc, &alloc.clone());
        assert!((result.total_drift - 0.0).abs() < 1e-12);
        assert_eq!(result.urgency, Urgency::Low);
        assert!(result.per_asset_drift.values().all(|d| d.abs() < 1e-12));
    }

    #[test]
    fn computes_signed_per_asset_and_absolute_total() {
        let target = Allocation::from([("ETH", 60.0), ("USDC", 25.0), ("LINK", 15.0)]);
        let current = Allocation::from([("ETH", 68.0), ("USDC", 20.0), ("LINK", 12.0)]);

        let result = DriftAnalyzer::compute(&current, &target);

        assert!((result.per_asset_drift["ETH"] - 8.0).abs() < 1e-9);
        assert!((result.per_asset_drift["USDC"] - (-5.0)).abs() < 1e-9);
        assert!((result.per_asset_drift["LINK"] - (-3.0)).abs() < 1e-9);
        assert!((result.total_drift - 16.0).abs() < 1e-9);
        assert_eq!(result.urgency, Urgency::High);
    }

    #[test]
    fn missing_symbol_counts_as_zero_on_that_side() {
        let target = Allocation::from([("ETH", 50.0), ("USDC", 50.0)]);
        let current = Allocation::from([("ETH", 50.0), ("LINK", 50.0)]);

        let result = DriftAnalyzer::compute(&current, &target);

        assert!((result.per_asset_drift["USDC"] - (-50.0)).abs() < 1e-9);
        assert!((result.per_asset_drift["LINK"] - 50.0).abs() < 1e-9);
        assert!((result.total_drift - 100.0).abs() < 1e-9);
        assert_eq!(result.urgency, Urgency::Critical);
    }

    #[test]
    fn total_drift_is_never_negative() {
        let cases = [
            (Allocation::new(), Allocation::new()),
            (
                Allocation::from([("ETH", 100.0)]),
                Allocation::from([("USDC", 100.0)]),
            ),
            (
                Allocation::from([("ETH", 33.0), ("USDC", 67.0)]),
                Allocation::from([("ETH", 67.0), ("USDC", 33.0)]),
            ),
        ];
        for (current, target) in cases {
            assert!(DriftAnalyzer::compute(&current, &target).total_drift >= 0.0);
        }
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let target = Allocation::from([("ETH", 40.0), ("USDC", 30.0), ("LINK", 30.0)]);
        let current = Allocation::from([("ETH", 55.0), ("USDC", 25.0), ("LINK", 20.0)]);
        let first = DriftAnalyzer::compute(&current, &target);
        for _ in 0..10 {
            assert_eq!(DriftAnalyzer::compute(&current, &target), first);
        }
    }

    #[test]
    fn urgency_buckets_on_fixed_breakpoints() {
        assert_eq!(DriftAnalyzer::urgency_for(0.0), Urgency::Low);
        assert_eq!(DriftAnalyzer::urgency_for(9.99), Urgency::Low);
        assert_eq!(DriftAnalyzer::urgency_for(10.0), Urgency::Medium);
        assert_eq!(DriftAnalyzer::urgency_for(14.99), Urgency::Medium);
        assert_eq!(DriftAnalyzer::urgency_for(15.0), Urgency::High);
        assert_eq!(DriftAnalyzer::urgency_for(19.99), Urgency::High);
        assert_eq!(DriftAnalyzer::urgency_for(20.0), Urgency::Critical);
        assert_eq!(DriftAnalyzer::urgency_for(185.0), Urgency::Critical);
    }

    #[test]
    fn urgency_is_monotonic_in_total_drift() {
        let mut previous = DriftAnalyzer::urgency_for(0.0);
        let mut drift = 0.0;
        while drift < 40.0 {
            let urgency = DriftAnalyzer::urgency_for(drift);
            assert!(urgency >= previous);
            previous = urgency;
            drift += 0.25;
        }
    }
}
