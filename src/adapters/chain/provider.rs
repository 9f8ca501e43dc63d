//! EVM RPC Provider - alloy-rs 0.9 Connection Handles
//!
//! Builds the per-chain RPC provider and validates connectivity with a
//! lightweight `eth_chainId` probe. Providers are stored type-erased as
//! `dyn Provider` so every adapter shares one handle per chain without
//! leaking alloy's transport generics.

use std::sync::Arc;
use std::time::Duration;

use alloy::providers::{Provider, ProviderBuilder};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Shared, type-erased RPC provider.
pub type SharedProvider = Arc<dyn Provider + Send + Sync>;

/// Where to reach one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEndpoint {
    /// Chain name, e.g. `ethereum`.
    pub name: String,
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,
    /// Chain ID the endpoint must report, when known.
    #[serde(default)]
    pub expected_chain_id: Option<u64>,
}

impl ChainEndpoint {
    pub fn new(name: &str, rpc_url: &str, expected_chain_id: Option<u64>) -> Self {
        Self {
            name: name.to_string(),
            rpc_url: rpc_url.to_string(),
            expected_chain_id,
        }
    }

    /// Public endpoints for the four dashboard chains.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("ethereum", "https://eth.llamarpc.com", Some(1)),
            Self::new("bsc", "https://bsc-dataseed.binance.org", Some(56)),
            Self::new("polygon", "https://polygon-rpc.com", Some(137)),
            Self::new("avalanche", "https://api.avax.network/ext/bc/C/rpc", Some(43_114)),
        ]
    }
}

/// Public view of one chain's connection state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConnection {
    /// Lower-case chain name.
    pub chain_id: String,
    /// RPC endpoint in use.
    pub endpoint: String,
    /// Whether the last probe succeeded.
    pub connected: bool,
}

/// Build the HTTP provider for `rpc_url`. No network I/O happens here.
pub async fn build_provider(rpc_url: &str) -> Result<SharedProvider> {
    let provider = ProviderBuilder::new()
        .on_builtin(rpc_url)
        .await
        .with_context(|| format!("Invalid RPC URL: {rpc_url}"))?;
    Ok(Arc::new(provider))
}

/// Confirm the endpoint answers, and reports the expected chain ID if one is set.
#[instrument(skip(provider))]
pub async fn probe(
    provider: &SharedProvider,
    expected_chain_id: Option<u64>,
    timeout: Duration,
) -> Result<u64> {
    let chain_id = tokio::time::timeout(timeout, provider.get_chain_id())
        .await
        .context("Chain ID probe timed out")?
        .context("Failed to query chain ID")?;

    if let Some(expected) = expected_chain_id {
        if chain_id != expected {
            bail!("Expected chain_id={expected}, got {chain_id}");
        }
    }

    debug!(chain_id, "RPC probe succeeded");
    Ok(chain_id)
}
