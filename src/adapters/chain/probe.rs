//! Chain Probe - Block Height, Gas Price and RPC Latency
//!
//! Samples a connected chain's head block and gas price, timing the
//! round trip. Used by the cross-chain benchmark; the last sample per
//! chain is cached for cheap reads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use alloy::providers::Provider;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::domain::reading::chain_key;
use crate::domain::{FetchError, ProviderKind};

use super::registry::ConnectionRegistry;

/// One probe sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainMetrics {
    pub chain: String,
    pub block_number: u64,
    /// Gas price in gwei.
    pub gas_price_gwei: f64,
    /// Wall time of both RPC calls (ms).
    pub latency_ms: i64,
}

/// Convert wei to gwei (1 gwei = 1e9 wei).
#[allow(clippy::cast_precision_loss)]
pub fn wei_to_gwei(wei: u128) -> f64 {
    wei as f64 / 1_000_000_000.0
}

fn rpc_error(e: impl std::fmt::Display) -> FetchError {
    FetchError::upstream(ProviderKind::OnChainAggregator.label(), e.to_string())
}

/// Samples chain health through the registry's providers.
pub struct ChainProbe {
    registry: Arc<ConnectionRegistry>,
    last: Mutex<HashMap<String, ChainMetrics>>,
}

impl ChainProbe {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            last: Mutex::new(HashMap::new()),
        }
    }

    /// Query the head block and gas price of `chain`.
    #[instrument(skip(self))]
    pub async fn sample(&self, chain: &str) -> Result<ChainMetrics, FetchError> {
        let chain = chain_key(chain);
        let provider = self.registry.provider(&chain)?;

        let started = Instant::now();
        let block_number = provider
            .get_block_number()
            .await
            .map_err(rpc_error)?;
        let gas_price = provider.get_gas_price().await.map_err(rpc_error)?;
        let latency_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

        let metrics = ChainMetrics {
            chain: chain.clone(),
            block_number,
            gas_price_gwei: wei_to_gwei(gas_price),
            latency_ms,
        };
        debug!(block_number, gas_gwei = metrics.gas_price_gwei, latency_ms, "Chain sampled");

        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(chain, metrics.clone());
        Ok(metrics)
    }

    /// Last successful sample for `chain`, without an RPC call.
    pub fn cached(&self, chain: &str) -> Option<ChainMetrics> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&chain_key(chain))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::adapters::metrics::OracleMetrics;
    use crate::usecases::journal::Journal;

    #[test]
    fn test_wei_to_gwei() {
        assert!((wei_to_gwei(30_000_000_000) - 30.0).abs() < f64::EPSILON);
        assert!(wei_to_gwei(0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_disconnected_chain_is_unavailable() {
        let registry = Arc::new(ConnectionRegistry::new(
            Arc::new(Journal::new(10)),
            Arc::new(OracleMetrics::new().unwrap()),
            Duration::from_millis(100),
        ));
        let probe = ChainProbe::new(registry);

        let err = probe.sample("Polygon").await.unwrap_err();
        assert_eq!(err, FetchError::ConnectionUnavailable { chain: "polygon".to_string() });
        assert!(probe.cached("polygon").is_none());
    }
}
