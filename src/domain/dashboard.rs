//! Headline dashboard figures.
//!
//! Seeded with fixed starting values when an oracle starts, then drifted
//! by each delivered reading's relative move against the previous reading
//! of the same feed. Zeroed when every feed stops.

use serde::{Deserialize, Serialize};

/// Market overview shown on the dashboard cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    /// Total market cap (trillions USD).
    pub market_cap: f64,
    /// 24h traded volume (billions USD).
    pub volume_24h: f64,
    /// BTC dominance (percent).
    pub btc_dominance: f64,
    /// Total value locked (billions USD).
    pub total_value_locked: f64,
}

impl DashboardMetrics {
    const MIN_MARKET_CAP: f64 = 1.5;
    const MIN_VOLUME: f64 = 50.0;
    const MIN_TVL: f64 = 100.0;
    const DOMINANCE_RANGE: (f64, f64) = (35.0, 50.0);

    /// Starting values installed by `start_oracle`.
    pub const fn seeded() -> Self {
        Self {
            market_cap: 2.1,
            volume_24h: 84.2,
            btc_dominance: 42.1,
            total_value_locked: 156.8,
        }
    }

    /// Apply a relative price move (`0.01` = +1%) observed on `base`.
    pub fn apply_move(&mut self, base: &str, change: f64) {
        if !change.is_finite() {
            return;
        }

        if base.eq_ignore_ascii_case("BTC") {
            let (lo, hi) = Self::DOMINANCE_RANGE;
            self.btc_dominance = (self.btc_dominance + change * 10.0).clamp(lo, hi);
        }

        self.volume_24h = (self.volume_24h * (1.0 + change)).max(Self::MIN_VOLUME);
        self.total_value_locked =
            (self.total_value_locked * (1.0 + change * 0.5)).max(Self::MIN_TVL);
        self.market_cap = (self.market_cap * (1.0 + change * 0.3)).max(Self::MIN_MARKET_CAP);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_zeroed() {
        let m = DashboardMetrics::default();
        assert!(m.market_cap.abs() < f64::EPSILON);
        assert!(m.btc_dominance.abs() < f64::EPSILON);
    }

    #[test]
    fn test_btc_move_clamps_dominance() {
        let mut m = DashboardMetrics::seeded();
        m.apply_move("BTC", 5.0);
        assert!((m.btc_dominance - 50.0).abs() < f64::EPSILON);
        m.apply_move("BTC", -0.99);
        assert!(m.btc_dominance >= 35.0);
    }

    #[test]
    fn test_floors_hold() {
        let mut m = DashboardMetrics::seeded();
        m.apply_move("ETH", -0.9);
        assert!(m.volume_24h >= 50.0);
        assert!(m.total_value_locked >= 100.0);
        assert!(m.market_cap >= 1.5);
        assert!((m.btc_dominance - 42.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_non_finite_move_ignored() {
        let mut m = DashboardMetrics::seeded();
        m.apply_move("BTC", f64::NAN);
        assert_eq!(m, DashboardMetrics::seeded());
    }
}
