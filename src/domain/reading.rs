//! Price reading domain types.
//!
//! Defines the normalized reading every provider produces, the
//! `(chain, pair)` key feeds and subscriptions are indexed by, and the
//! closed set of provider kinds the scheduler selects between.
//!
//! Raw oracle answers arrive as scaled integers; [`scale_answer`] turns
//! them into decimal-adjusted prices without going through floats first.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────
// Trading pairs and feed keys
// ────────────────────────────────────────────

/// Pairs every feed configuration polls when none are configured.
pub const BASELINE_PAIRS: [&str; 2] = ["BTC/USD", "ETH/USD"];

/// A `BASE/QUOTE` trading pair, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TradingPair {
    base: String,
    quote: String,
}

impl TradingPair {
    /// Build a pair from its two symbols.
    pub fn new(base: &str, quote: &str) -> Self {
        Self {
            base: base.trim().to_ascii_uppercase(),
            quote: quote.trim().to_ascii_uppercase(),
        }
    }

    /// Base asset symbol (e.g. `BTC`).
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Quote asset symbol (e.g. `USD`).
    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Pair without the separator, as REST aggregators expect (`BTCUSD`).
    pub fn compact(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }

    /// The default working set of pairs.
    pub fn baseline() -> Vec<Self> {
        BASELINE_PAIRS
            .iter()
            .filter_map(|p| p.parse().ok())
            .collect()
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Error returned when a pair string is not `BASE/QUOTE`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid trading pair '{0}', expected BASE/QUOTE")]
pub struct InvalidPair(pub String);

impl FromStr for TradingPair {
    type Err = InvalidPair;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((base, quote))
                if !base.trim().is_empty()
                    && !quote.trim().is_empty()
                    && !quote.contains('/') =>
            {
                Ok(Self::new(base, quote))
            }
            _ => Err(InvalidPair(s.to_string())),
        }
    }
}

impl TryFrom<String> for TradingPair {
    type Error = InvalidPair;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TradingPair> for String {
    fn from(pair: TradingPair) -> Self {
        pair.to_string()
    }
}

/// Normalize a chain name to the lower-case form used as a key.
pub fn chain_key(chain: &str) -> String {
    chain.trim().to_ascii_lowercase()
}

/// Topic key shared by feed tasks and reading subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeedKey {
    /// Lower-case chain name.
    pub chain: String,
    /// Trading pair.
    pub pair: TradingPair,
}

impl FeedKey {
    /// Build a key, normalizing the chain name.
    pub fn new(chain: &str, pair: TradingPair) -> Self {
        Self {
            chain: chain_key(chain),
            pair,
        }
    }
}

impl fmt::Display for FeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.chain, self.pair)
    }
}

// ────────────────────────────────────────────
// Providers
// ────────────────────────────────────────────

/// The three external price source strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// On-chain aggregator contract read (Chainlink-style round data).
    OnChainAggregator,
    /// Aggregated-oracle REST endpoint with a response quorum.
    RestAggregator,
    /// Public spot-price REST endpoint.
    RestFallback,
}

impl ProviderKind {
    /// All kinds, in selection order.
    pub const ALL: [Self; 3] = [
        Self::OnChainAggregator,
        Self::RestAggregator,
        Self::RestFallback,
    ];

    /// Stable label for logs and metric labels.
    pub const fn label(self) -> &'static str {
        match self {
            Self::OnChainAggregator => "on_chain_aggregator",
            Self::RestAggregator => "rest_aggregator",
            Self::RestFallback => "rest_fallback",
        }
    }

    /// Human-facing name shown on the dashboard.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::OnChainAggregator => "Chainlink",
            Self::RestAggregator => "Band Protocol",
            Self::RestFallback => "Tellor",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "onchainaggregator" | "chainlink" => Ok(Self::OnChainAggregator),
            "restaggregator" | "bandprotocol" | "band" => Ok(Self::RestAggregator),
            "restfallback" | "tellor" => Ok(Self::RestFallback),
            _ => Err(s.to_string()),
        }
    }
}

// ────────────────────────────────────────────
// Readings
// ────────────────────────────────────────────

/// Normalized result of one successful fetch. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceReading {
    /// Decimal-adjusted price, always `>= 0`.
    pub price: f64,
    /// Time the source observed the price (Unix ms).
    pub observed_at_ms: i64,
    /// Scale the raw answer was divided by.
    pub decimals: u8,
    /// Source round / request identifier.
    pub round_id: String,
    /// Lower-case chain the reading was requested for.
    pub chain: String,
    /// Trading pair.
    pub pair: TradingPair,
    /// Provider that produced the reading.
    pub provider: ProviderKind,
    /// End-to-end fetch latency (ms).
    pub latency_ms: i64,
}

impl PriceReading {
    /// Topic key the reading is routed under.
    pub fn key(&self) -> FeedKey {
        FeedKey::new(&self.chain, self.pair.clone())
    }
}

/// Divide a raw integer answer by `10^decimals`.
///
/// Returns `None` for negative answers, scales above 28 or values that
/// do not fit a 96-bit mantissa.
pub fn scale_answer(raw: i128, decimals: u8) -> Option<f64> {
    if raw < 0 {
        return None;
    }
    Decimal::try_from_i128_with_scale(raw, u32::from(decimals))
        .ok()
        .and_then(|d| d.to_f64())
        .filter(|p| p.is_finite() && *p >= 0.0)
}

/// Round an already-decimal price to `decimals` places.
pub fn round_to_scale(price: f64, decimals: u8) -> Option<f64> {
    if !price.is_finite() || price < 0.0 {
        return None;
    }
    Decimal::from_f64_retain(price)
        .map(|d| d.round_dp(u32::from(decimals)))
        .and_then(|d| d.to_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_parse_and_display() {
        let pair: TradingPair = "eth/usd".parse().unwrap();
        assert_eq!(pair.base(), "ETH");
        assert_eq!(pair.quote(), "USD");
        assert_eq!(pair.to_string(), "ETH/USD");
        assert_eq!(pair.compact(), "ETHUSD");
    }

    #[test]
    fn test_pair_rejects_malformed() {
        assert!("ETHUSD".parse::<TradingPair>().is_err());
        assert!("/USD".parse::<TradingPair>().is_err());
        assert!("A/B/C".parse::<TradingPair>().is_err());
    }

    #[test]
    fn test_feed_key_lowercases_chain() {
        let key = FeedKey::new("Ethereum", TradingPair::new("btc", "usd"));
        assert_eq!(key.chain, "ethereum");
        assert_eq!(key.to_string(), "ethereum-BTC/USD");
    }

    #[test]
    fn test_provider_kind_accepts_dashboard_labels() {
        assert_eq!("Chainlink".parse(), Ok(ProviderKind::OnChainAggregator));
        assert_eq!("Band Protocol".parse(), Ok(ProviderKind::RestAggregator));
        assert_eq!("RestFallback".parse(), Ok(ProviderKind::RestFallback));
        assert!("Pyth".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_scale_answer() {
        let price = scale_answer(350_012_345_678, 8).unwrap();
        assert!((price - 3500.123_456_78).abs() < 1e-9);
        assert_eq!(scale_answer(-1, 8), None);
        assert_eq!(scale_answer(1, 29), None);
    }

    #[test]
    fn test_round_to_scale_matches_decimal() {
        use rust_decimal_macros::dec;

        let rounded = round_to_scale(64_250.123_456_789, 8).unwrap();
        assert_eq!(rounded, dec!(64250.12345679).to_f64().unwrap());
        assert_eq!(round_to_scale(-1.0, 8), None);
        assert_eq!(round_to_scale(f64::NAN, 8), None);
    }

    #[test]
    fn test_baseline_pairs() {
        let pairs = TradingPair::baseline();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].to_string(), "BTC/USD");
    }
}
