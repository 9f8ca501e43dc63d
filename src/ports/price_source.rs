//! Price Source Port - Provider Adapter Interface
//!
//! Every external price strategy (on-chain aggregator read, aggregated
//! oracle REST call, spot-price REST fallback) implements this one trait.
//! The scheduler only ever sees `dyn PriceSource`; which implementation
//! runs is decided once, from the feed's [`ProviderKind`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{FetchError, PriceReading, ProviderKind, TradingPair};

/// Obtains one normalized reading from an external source.
#[async_trait]
pub trait PriceSource: Send + Sync + 'static {
    /// Which provider kind this source implements.
    fn kind(&self) -> ProviderKind;

    /// Fetch the current price of `pair` as seen on `chain`.
    ///
    /// On success the reading's `chain` equals the requested (lower-case)
    /// chain so it routes to the requesting feed's topic.
    async fn fetch(&self, chain: &str, pair: &TradingPair) -> Result<PriceReading, FetchError>;
}

/// The three adapters, indexed by provider kind.
#[derive(Clone)]
pub struct ProviderSet {
    on_chain: Arc<dyn PriceSource>,
    rest_aggregator: Arc<dyn PriceSource>,
    rest_fallback: Arc<dyn PriceSource>,
}

impl ProviderSet {
    pub fn new(
        on_chain: Arc<dyn PriceSource>,
        rest_aggregator: Arc<dyn PriceSource>,
        rest_fallback: Arc<dyn PriceSource>,
    ) -> Self {
        Self {
            on_chain,
            rest_aggregator,
            rest_fallback,
        }
    }

    /// The adapter for `kind`.
    pub fn select(&self, kind: ProviderKind) -> Arc<dyn PriceSource> {
        match kind {
            ProviderKind::OnChainAggregator => Arc::clone(&self.on_chain),
            ProviderKind::RestAggregator => Arc::clone(&self.rest_aggregator),
            ProviderKind::RestFallback => Arc::clone(&self.rest_fallback),
        }
    }
}
