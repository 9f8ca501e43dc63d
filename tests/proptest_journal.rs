//! Property-Based Tests — Journal and Normalization Invariants
//!
//! Uses `proptest` to verify that the journal and the price
//! normalization helpers hold their invariants across random inputs.

use proptest::prelude::*;

use oracle_monitor::domain::dashboard::DashboardMetrics;
use oracle_monitor::domain::reading::{round_to_scale, scale_answer};
use oracle_monitor::domain::{Category, EntryDraft, LogStats, Severity};
use oracle_monitor::usecases::journal::Journal;

fn severity() -> impl Strategy<Value = Severity> {
    prop::sample::select(Severity::ALL.to_vec())
}

fn category() -> impl Strategy<Value = Category> {
    prop::sample::select(Category::ALL.to_vec())
}

// ── Journal Properties ──────────────────────────────────────

proptest! {
    /// The journal never holds more than its capacity.
    #[test]
    fn journal_bounded_by_capacity(capacity in 1usize..50, appends in 0usize..200) {
        let journal = Journal::new(capacity);
        for i in 0..appends {
            journal.append(EntryDraft::new(format!("entry {i}")));
        }
        prop_assert_eq!(journal.len(), appends.min(capacity));
    }

    /// Snapshots are newest-first and keep exactly the latest entries.
    #[test]
    fn journal_newest_first(capacity in 1usize..30, appends in 1usize..80) {
        let journal = Journal::new(capacity);
        for i in 0..appends {
            journal.append(EntryDraft::new(i.to_string()));
        }
        let messages: Vec<usize> = journal
            .snapshot()
            .iter()
            .map(|e| e.message.parse().unwrap())
            .collect();
        let expected: Vec<usize> = (0..appends).rev().take(capacity).collect();
        prop_assert_eq!(messages, expected);
    }

    /// Stats tallies always add up to the total.
    #[test]
    fn stats_consistent(
        drafts in prop::collection::vec((severity(), category()), 0..120),
    ) {
        let journal = Journal::new(100);
        for (sev, cat) in &drafts {
            journal.append(EntryDraft::new("x").severity(*sev).category(*cat));
        }
        let stats: LogStats = journal.stats();
        let s = stats.by_severity;
        let c = stats.by_category;

        prop_assert_eq!(stats.total, drafts.len().min(100));
        prop_assert_eq!(s.success + s.warning + s.error + s.info, stats.total);
        prop_assert_eq!(
            c.oracle + c.security + c.performance + c.blockchain + c.system,
            stats.total
        );
        prop_assert!((0.0..=100.0).contains(&stats.error_rate));
        prop_assert!((0.0..=100.0).contains(&stats.success_rate));
    }
}

// ── Normalization Properties ────────────────────────────────

proptest! {
    /// Scaled answers are finite and non-negative; negatives are refused.
    #[test]
    fn scale_answer_non_negative(raw in any::<i64>(), decimals in 0u8..=18) {
        match scale_answer(i128::from(raw), decimals) {
            Some(price) => {
                prop_assert!(raw >= 0);
                prop_assert!(price.is_finite() && price >= 0.0);
            }
            None => prop_assert!(raw < 0),
        }
    }

    /// Rounding never moves a price by more than half a unit in the last place.
    #[test]
    fn round_to_scale_close(price in 0.01f64..1_000_000.0, decimals in 0u8..=8) {
        let rounded = round_to_scale(price, decimals).unwrap();
        let half_ulp = 0.5 * 10f64.powi(-i32::from(decimals));
        prop_assert!((rounded - price).abs() <= half_ulp + 1e-9);
    }

    /// Dashboard figures stay inside their bounds under any move.
    #[test]
    fn dashboard_moves_stay_bounded(
        moves in prop::collection::vec((-0.5f64..0.5, any::<bool>()), 0..50),
    ) {
        let mut metrics = DashboardMetrics::seeded();
        for (change, btc) in moves {
            metrics.apply_move(if btc { "BTC" } else { "ETH" }, change);
        }
        prop_assert!((35.0..=50.0).contains(&metrics.btc_dominance));
        prop_assert!(metrics.volume_24h >= 50.0);
        prop_assert!(metrics.total_value_locked >= 100.0);
        prop_assert!(metrics.market_cap >= 1.5);
    }
}
