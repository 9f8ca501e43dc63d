//! Connection Registry - One Handle per Chain
//!
//! Holds one logical connection per supported chain. Connecting never
//! fails the caller: a chain that cannot be reached is recorded as
//! disconnected and the remaining chains carry on. Every attempt is
//! journaled as a `blockchain` entry. Liveness is re-evaluated only when
//! asked, through [`ConnectionRegistry::refresh`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::adapters::metrics::OracleMetrics;
use crate::domain::FetchError;
use crate::domain::reading::chain_key;
use crate::usecases::journal::Journal;

use super::provider::{self, ChainConnection, ChainEndpoint, SharedProvider};

/// Default limit for a single connectivity probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

struct ChainHandle {
    connection: ChainConnection,
    expected_chain_id: Option<u64>,
    /// Present whenever the endpoint URL was valid, live or not.
    provider: Option<SharedProvider>,
}

/// Per-chain connection handles, established once at startup.
pub struct ConnectionRegistry {
    chains: RwLock<HashMap<String, ChainHandle>>,
    journal: Arc<Journal>,
    metrics: Arc<OracleMetrics>,
    probe_timeout: Duration,
}

impl ConnectionRegistry {
    pub fn new(journal: Arc<Journal>, metrics: Arc<OracleMetrics>, probe_timeout: Duration) -> Self {
        Self {
            chains: RwLock::new(HashMap::new()),
            journal,
            metrics,
            probe_timeout,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ChainHandle>> {
        self.chains.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ChainHandle>> {
        self.chains.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Establish (or reuse) the connection for `endpoint`.
    #[instrument(skip(self), fields(chain = %endpoint.name))]
    pub async fn connect(&self, endpoint: &ChainEndpoint) -> ChainConnection {
        let chain = chain_key(&endpoint.name);

        if let Some(existing) = self.read().get(&chain) {
            if existing.connection.connected {
                return existing.connection.clone();
            }
        }

        let (provider, result) = match provider::build_provider(&endpoint.rpc_url).await {
            Ok(p) => {
                let probed =
                    provider::probe(&p, endpoint.expected_chain_id, self.probe_timeout).await;
                (Some(p), probed)
            }
            Err(e) => (None, Err(e)),
        };

        let connected = result.is_ok();
        let details = match &result {
            Ok(chain_id) => json!({ "endpoint": endpoint.rpc_url, "chainId": chain_id }),
            Err(e) => json!({ "endpoint": endpoint.rpc_url, "error": format!("{e:#}") }),
        };

        if let Err(e) = &result {
            warn!(chain = %chain, error = %format!("{e:#}"), "Chain connection failed");
        } else {
            info!(chain = %chain, "Connected to chain RPC");
        }

        let connection = self.register(
            &chain,
            &endpoint.rpc_url,
            endpoint.expected_chain_id,
            provider,
            connected,
        );
        self.journal
            .connection_status(&chain, connected, Some(details));
        connection
    }

    /// Connect every endpoint concurrently; failures stay isolated per chain.
    pub async fn connect_all(&self, endpoints: &[ChainEndpoint]) -> Vec<ChainConnection> {
        join_all(endpoints.iter().map(|e| self.connect(e))).await
    }

    /// Install a handle directly, replacing any previous one for the chain.
    pub fn register(
        &self,
        chain: &str,
        endpoint: &str,
        expected_chain_id: Option<u64>,
        provider: Option<SharedProvider>,
        connected: bool,
    ) -> ChainConnection {
        let chain = chain_key(chain);
        let connection = ChainConnection {
            chain_id: chain.clone(),
            endpoint: endpoint.to_string(),
            connected: connected && provider.is_some(),
        };

        self.metrics
            .set_chain_connected(&chain, connection.connected);
        self.write().insert(
            chain,
            ChainHandle {
                connection: connection.clone(),
                expected_chain_id,
                provider,
            },
        );
        connection
    }

    /// Re-probe a known chain and record the result. `None` for unknown chains.
    #[instrument(skip(self))]
    pub async fn refresh(&self, chain: &str) -> Option<ChainConnection> {
        let chain = chain_key(chain);
        let (provider, expected, was_connected) = {
            let chains = self.read();
            let handle = chains.get(&chain)?;
            (
                handle.provider.clone(),
                handle.expected_chain_id,
                handle.connection.connected,
            )
        };

        let connected = match &provider {
            Some(p) => provider::probe(p, expected, self.probe_timeout).await.is_ok(),
            None => false,
        };

        let connection = {
            let mut chains = self.write();
            let handle = chains.get_mut(&chain)?;
            handle.connection.connected = connected;
            handle.connection.clone()
        };
        self.metrics.set_chain_connected(&chain, connected);

        if connected != was_connected {
            self.journal.connection_status(&chain, connected, None);
        }
        Some(connection)
    }

    pub fn is_connected(&self, chain: &str) -> bool {
        self.read()
            .get(&chain_key(chain))
            .is_some_and(|h| h.connection.connected)
    }

    /// Names of connected chains, sorted.
    pub fn connected_chains(&self) -> Vec<String> {
        let mut chains: Vec<String> = self
            .read()
            .values()
            .filter(|h| h.connection.connected)
            .map(|h| h.connection.chain_id.clone())
            .collect();
        chains.sort();
        chains
    }

    /// Every known chain and its state, keyed by name.
    pub fn connections(&self) -> BTreeMap<String, ChainConnection> {
        self.read()
            .iter()
            .map(|(k, h)| (k.clone(), h.connection.clone()))
            .collect()
    }

    /// Live provider for `chain`.
    pub fn provider(&self, chain: &str) -> Result<SharedProvider, FetchError> {
        let chain = chain_key(chain);
        self.read()
            .get(&chain)
            .filter(|h| h.connection.connected)
            .and_then(|h| h.provider.clone())
            .ok_or(FetchError::ConnectionUnavailable { chain })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, Severity};

    fn registry() -> (ConnectionRegistry, Arc<Journal>) {
        let journal = Arc::new(Journal::new(100));
        let metrics = Arc::new(OracleMetrics::new().unwrap());
        (
            ConnectionRegistry::new(Arc::clone(&journal), metrics, Duration::from_millis(200)),
            journal,
        )
    }

    #[tokio::test]
    async fn test_invalid_url_is_recorded_disconnected() {
        let (registry, journal) = registry();
        let conn = registry
            .connect(&ChainEndpoint::new("Ethereum", "not a url", Some(1)))
            .await;

        assert!(!conn.connected);
        assert_eq!(conn.chain_id, "ethereum");
        assert!(!registry.is_connected("ethereum"));
        assert!(registry.connected_chains().is_empty());

        let entry = &journal.snapshot()[0];
        assert_eq!(entry.category, Category::Blockchain);
        assert_eq!(entry.severity, Severity::Error);
        assert_eq!(entry.message, "ethereum network disconnected");
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_block_other_chains() {
        let (registry, journal) = registry();
        let good = build_provider_for_test().await;
        registry.register("polygon", "http://127.0.0.1:8545", Some(137), Some(good), true);

        let results = registry
            .connect_all(&[
                ChainEndpoint::new("bsc", "::bad::", None),
                ChainEndpoint::new("avalanche", "also bad", None),
            ])
            .await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|c| !c.connected));
        assert_eq!(registry.connected_chains(), vec!["polygon".to_string()]);
        assert_eq!(registry.connections().len(), 3);
        assert_eq!(journal.len(), 2);
    }

    #[tokio::test]
    async fn test_provider_requires_live_connection() {
        let (registry, _) = registry();
        let p = build_provider_for_test().await;
        registry.register("bsc", "http://127.0.0.1:8545", None, Some(p), false);

        assert_eq!(
            registry.provider("BSC").err(),
            Some(FetchError::ConnectionUnavailable { chain: "bsc".to_string() })
        );
        assert!(registry.provider("solana").is_err());
    }

    #[tokio::test]
    async fn test_refresh_unknown_chain() {
        let (registry, _) = registry();
        assert!(registry.refresh("nowhere").await.is_none());
    }

    async fn build_provider_for_test() -> SharedProvider {
        provider::build_provider("http://127.0.0.1:8545").await.unwrap()
    }
}
