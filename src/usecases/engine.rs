//! Oracle Engine - Aggregation Facade
//!
//! The one surface the presentation layer talks to. Owns the connection
//! registry, scheduler, router and journal as fields of a single context
//! object built at startup, so tests can stand up isolated engines.
//!
//! Start flow:
//! 1. Validate the four-field request (incomplete requests are a no-op)
//! 2. Journal the start, then require a live source-chain connection
//! 3. Seed the dashboard figures and hook the internal reading listeners
//! 4. Hand the validated configuration to the scheduler

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use futures_util::future::join_all;
use tracing::{info, instrument, warn};

use crate::adapters::chain::{
    ChainConnection, ChainEndpoint, ChainMetrics, ChainProbe, ConnectionRegistry,
    OnChainAggregatorSource,
};
use crate::adapters::chain::registry::DEFAULT_PROBE_TIMEOUT;
use crate::adapters::feeds::{BandSource, CoinGeckoSource, RestClient};
use crate::adapters::metrics::OracleMetrics;
use crate::config::AppConfig;
use crate::domain::reading::chain_key;
use crate::domain::{
    Category, DashboardMetrics, EngineError, FeedKey, LogEntry, LogStats, OracleRequest, PriceReading,
    ProviderKind, Severity, TradingPair,
};
use crate::ports::ProviderSet;

use super::journal::{Journal, SnapshotListener};
use super::router::{ReadingListener, SubscriptionRouter};
use super::scheduler::{FeedInfo, PollingScheduler, SchedulerSettings};

fn gauge_len(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}

/// Figures derived from delivered readings.
#[derive(Debug, Default)]
struct MarketState {
    dashboard: DashboardMetrics,
    latest: HashMap<FeedKey, PriceReading>,
}

impl MarketState {
    fn observe(&mut self, reading: &PriceReading) {
        let key = reading.key();
        if let Some(previous) = self.latest.get(&key) {
            if previous.price > 0.0 {
                let change = (reading.price - previous.price) / previous.price;
                self.dashboard.apply_move(reading.pair.base(), change);
            }
        }
        self.latest.insert(key, reading.clone());
    }
}

/// Aggregation facade over registry, scheduler, router and journal.
pub struct OracleEngine {
    registry: Arc<ConnectionRegistry>,
    scheduler: PollingScheduler,
    router: Arc<SubscriptionRouter>,
    journal: Arc<Journal>,
    metrics: Arc<OracleMetrics>,
    probe: ChainProbe,
    market: Arc<Mutex<MarketState>>,
    /// Internal per-key listeners currently hooked into the router.
    taps: Mutex<HashMap<FeedKey, ReadingListener>>,
}

impl OracleEngine {
    /// Compose an engine from already-built parts.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        providers: ProviderSet,
        journal: Arc<Journal>,
        metrics: Arc<OracleMetrics>,
        settings: SchedulerSettings,
    ) -> Self {
        let router = Arc::new(SubscriptionRouter::new());
        let scheduler = PollingScheduler::new(
            providers,
            Arc::clone(&router),
            Arc::clone(&journal),
            Arc::clone(&metrics),
            settings,
        );

        let gauge = metrics.journal_entries.clone();
        let size_listener: SnapshotListener =
            Arc::new(move |entries: &[LogEntry]| gauge.set(gauge_len(entries.len())));
        journal.subscribe(size_listener);

        Self {
            probe: ChainProbe::new(Arc::clone(&registry)),
            registry,
            scheduler,
            router,
            journal,
            metrics,
            market: Arc::new(Mutex::new(MarketState::default())),
            taps: Mutex::new(HashMap::new()),
        }
    }

    /// Build the full adapter stack described by `config`.
    ///
    /// No chain is contacted here; call [`Self::connect_chains`] next.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let metrics = Arc::new(OracleMetrics::new()?);
        let journal = Arc::new(Journal::new(config.journal.capacity));
        let registry = Arc::new(ConnectionRegistry::new(
            Arc::clone(&journal),
            Arc::clone(&metrics),
            DEFAULT_PROBE_TIMEOUT,
        ));

        let on_chain = OnChainAggregatorSource::new(Arc::clone(&registry), config.feed_directory()?);
        let band = BandSource::new(
            RestClient::new(ProviderKind::RestAggregator, config.providers.aggregator_client())?,
            config.providers.min_count,
            config.providers.ask_count,
        );
        let spot = CoinGeckoSource::new(RestClient::new(
            ProviderKind::RestFallback,
            config.providers.fallback_client(),
        )?);

        let providers = ProviderSet::new(Arc::new(on_chain), Arc::new(band), Arc::new(spot));
        Ok(Self::new(
            registry,
            providers,
            journal,
            metrics,
            config.scheduler_settings()?,
        ))
    }

    fn market(&self) -> MutexGuard<'_, MarketState> {
        self.market.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn taps(&self) -> MutexGuard<'_, HashMap<FeedKey, ReadingListener>> {
        self.taps.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Connections ─────────────────────────────────────────

    /// Connect every endpoint concurrently. Failures are journaled, never fatal.
    pub async fn connect_chains(&self, endpoints: &[ChainEndpoint]) -> Vec<ChainConnection> {
        let connections = self.registry.connect_all(endpoints).await;
        let live = connections.iter().filter(|c| c.connected).count();
        info!(live, total = connections.len(), "Chain connections established");
        connections
    }

    /// Re-probe one chain.
    pub async fn refresh_chain(&self, chain: &str) -> Option<ChainConnection> {
        self.registry.refresh(chain).await
    }

    pub fn is_chain_connected(&self, chain: &str) -> bool {
        self.registry.is_connected(chain)
    }

    /// Connected chain names, sorted.
    pub fn connected_chains(&self) -> Vec<String> {
        self.registry.connected_chains()
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    // ── Feed control ────────────────────────────────────────

    /// Start polling for `request`. Returns the keys now being polled.
    ///
    /// # Errors
    /// - `IncompleteConfig` when any field is blank; nothing happens.
    /// - `UnknownProvider` when the provider name matches no kind.
    /// - `ChainNotConnected` when the source chain has no live handle;
    ///   an error entry is journaled and no feed is installed.
    #[instrument(skip(self), fields(source = %request.source_chain, provider = %request.provider_kind))]
    pub fn start_oracle(&self, request: &OracleRequest) -> Result<Vec<FeedKey>, EngineError> {
        let config = match request.validate() {
            Ok(config) => config,
            Err(e @ EngineError::UnknownProvider(_)) => {
                self.journal.error("Invalid oracle configuration", Some(&e), Category::Oracle);
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        self.journal.oracle_start(&config);

        if !self.registry.is_connected(&config.source_chain) {
            let err = EngineError::ChainNotConnected(config.source_chain.clone());
            warn!(chain = %config.source_chain, "Source chain not connected");
            self.journal.error(
                format!("Cannot start oracle: {} is not connected", config.source_chain),
                Some(&err),
                Category::Blockchain,
            );
            return Err(err);
        }

        self.market().dashboard = DashboardMetrics::seeded();

        let keys = self.scheduler.start(&config);
        for key in &keys {
            self.tap(key);
        }

        self.journal.oracle_event(
            format!(
                "Oracle feeds active: {} pairs on {}",
                keys.len(),
                config.source_chain
            ),
            Severity::Success,
            config.provider.display_name(),
        );
        Ok(keys)
    }

    /// Hook the latest-price and dashboard listener onto `key` once.
    fn tap(&self, key: &FeedKey) {
        let mut taps = self.taps();
        if taps.contains_key(key) {
            return;
        }
        let market = Arc::clone(&self.market);
        let listener: ReadingListener = Arc::new(move |reading: &PriceReading| {
            market
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .observe(reading);
        });
        self.router.subscribe(key.clone(), Arc::clone(&listener));
        taps.insert(key.clone(), listener);
    }

    /// Cancel every feed, drop every subscription and zero the dashboard.
    /// Returns how many feeds were running.
    pub fn stop_all(&self) -> usize {
        self.journal.oracle_stop(None);
        let stopped = self.scheduler.stop();
        self.router.clear();
        self.taps().clear();
        self.market().dashboard = DashboardMetrics::default();
        stopped
    }

    /// Stop everything and wipe the journal and latest prices.
    pub fn reset(&self) {
        self.stop_all();
        self.market().latest.clear();
        self.journal.clear();
        self.journal
            .system_event("Oracle engine reset", Severity::Info, "system");
    }

    /// Installed feeds, sorted by key.
    pub fn active_feeds(&self) -> Vec<FeedInfo> {
        self.scheduler.active_feeds()
    }

    // ── Subscriptions ───────────────────────────────────────

    /// Register `listener` for readings of `(chain, pair)`.
    pub fn subscribe(&self, chain: &str, pair: TradingPair, listener: ReadingListener) -> FeedKey {
        let key = FeedKey::new(chain, pair);
        self.router.subscribe(key.clone(), listener);
        key
    }

    pub fn unsubscribe(&self, chain: &str, pair: TradingPair, listener: &ReadingListener) {
        self.router.unsubscribe(&FeedKey::new(chain, pair), listener);
    }

    /// Register for journal snapshots; the current one is replayed first.
    pub fn subscribe_journal(&self, listener: SnapshotListener) {
        self.journal.subscribe(listener);
    }

    pub fn unsubscribe_journal(&self, listener: &SnapshotListener) {
        self.journal.unsubscribe(listener);
    }

    // ── Queries ─────────────────────────────────────────────

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn log_stats(&self) -> LogStats {
        self.journal.stats()
    }

    pub fn metrics(&self) -> &Arc<OracleMetrics> {
        &self.metrics
    }

    pub fn dashboard_metrics(&self) -> DashboardMetrics {
        self.market().dashboard
    }

    /// Last reading delivered for `(chain, pair)`.
    pub fn latest_price(&self, chain: &str, pair: &TradingPair) -> Option<PriceReading> {
        self.market()
            .latest
            .get(&FeedKey::new(chain, pair.clone()))
            .cloned()
    }

    /// Last reading per key, sorted by key.
    pub fn latest_prices(&self) -> Vec<PriceReading> {
        let mut readings: Vec<PriceReading> = self.market().latest.values().cloned().collect();
        readings.sort_by_key(PriceReading::key);
        readings
    }

    // ── Benchmark ───────────────────────────────────────────

    /// Sample head block, gas price and latency on each chain.
    #[instrument(skip(self))]
    pub async fn run_benchmark(&self, chains: &[String]) -> Vec<ChainMetrics> {
        self.journal.benchmark_start();

        let samples = join_all(chains.iter().map(|c| self.probe.sample(c))).await;

        let mut results = Vec::with_capacity(samples.len());
        for (chain, sample) in chains.iter().zip(samples) {
            match sample {
                Ok(m) => {
                    self.journal
                        .benchmark_result(&m.chain, m.latency_ms, m.block_number, m.gas_price_gwei);
                    results.push(m);
                }
                Err(e) => {
                    self.journal.error(
                        format!("Benchmark failed for {}", chain_key(chain)),
                        Some(&e),
                        Category::Performance,
                    );
                }
            }
        }

        self.journal.performance_event(
            format!("Benchmark completed: {}/{} chains sampled", results.len(), chains.len()),
            Severity::Success,
            "benchmark",
        );
        results
    }

    /// Most recent successful benchmark sample for `chain`, without an RPC call.
    pub fn last_benchmark(&self, chain: &str) -> Option<ChainMetrics> {
        self.probe.cached(chain)
    }
}

impl Drop for OracleEngine {
    fn drop(&mut self) {
        self.scheduler.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn engine() -> OracleEngine {
        let metrics = Arc::new(OracleMetrics::new().unwrap());
        let journal = Arc::new(Journal::new(100));
        let registry = Arc::new(ConnectionRegistry::new(
            Arc::clone(&journal),
            Arc::clone(&metrics),
            Duration::from_millis(100),
        ));
        let config = AppConfig::default();
        let on_chain = Arc::new(OnChainAggregatorSource::new(
            Arc::clone(&registry),
            config.feed_directory().unwrap(),
        ));
        let band = Arc::new(BandSource::new(
            RestClient::new(ProviderKind::RestAggregator, config.providers.aggregator_client()).unwrap(),
            3,
            4,
        ));
        let spot = Arc::new(CoinGeckoSource::new(
            RestClient::new(ProviderKind::RestFallback, config.providers.fallback_client()).unwrap(),
        ));
        OracleEngine::new(
            registry,
            ProviderSet::new(on_chain, band, spot),
            journal,
            metrics,
            SchedulerSettings::default(),
        )
    }

    fn reading(pair: &str, price: f64) -> PriceReading {
        PriceReading {
            price,
            observed_at_ms: 0,
            decimals: 8,
            round_id: "1".to_string(),
            chain: "ethereum".to_string(),
            pair: pair.parse().unwrap(),
            provider: ProviderKind::OnChainAggregator,
            latency_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_incomplete_request_is_noop() {
        let engine = engine();
        let before = engine.journal().len();
        let err = engine
            .start_oracle(&OracleRequest::new("ethereum", "", "Chainlink", "Price Feed"))
            .unwrap_err();
        assert_eq!(err, EngineError::IncompleteConfig { missing: "targetChain" });
        assert_eq!(engine.journal().len(), before);
        assert!(engine.active_feeds().is_empty());
    }

    #[tokio::test]
    async fn test_disconnected_chain_logs_and_aborts() {
        let engine = engine();
        let err = engine
            .start_oracle(&OracleRequest::new("Solana", "Polygon", "Chainlink", "Price Feed"))
            .unwrap_err();
        assert_eq!(err, EngineError::ChainNotConnected("solana".to_string()));
        assert!(engine.active_feeds().is_empty());

        let head = &engine.journal().snapshot()[0];
        assert_eq!(head.severity, Severity::Error);
        assert_eq!(head.category, Category::Blockchain);
        assert_eq!(engine.dashboard_metrics(), DashboardMetrics::default());
    }

    #[tokio::test]
    async fn test_unknown_provider_is_journaled() {
        let engine = engine();
        let err = engine
            .start_oracle(&OracleRequest::new("ethereum", "polygon", "Pyth", "Price Feed"))
            .unwrap_err();
        assert_eq!(err, EngineError::UnknownProvider("Pyth".to_string()));
        assert_eq!(engine.journal().snapshot()[0].severity, Severity::Error);
    }

    #[test]
    fn test_market_state_tracks_moves() {
        let mut state = MarketState {
            dashboard: DashboardMetrics::seeded(),
            ..MarketState::default()
        };
        state.observe(&reading("BTC/USD", 100.0));
        assert_eq!(state.dashboard, DashboardMetrics::seeded());

        state.observe(&reading("BTC/USD", 101.0));
        assert!(state.dashboard.btc_dominance > DashboardMetrics::seeded().btc_dominance);
        assert_eq!(state.latest.len(), 1);
        assert!((state.latest[&reading("BTC/USD", 0.0).key()].price - 101.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_journal_gauge_tracks_size() {
        let engine = engine();
        engine.journal().system_event("hello", Severity::Info, "test");
        assert_eq!(engine.metrics().journal_entries.get(), 1);
        engine.reset();
        assert_eq!(engine.metrics().journal_entries.get(), 1);
        assert_eq!(engine.journal().snapshot()[0].category, Category::System);
    }

    #[tokio::test]
    async fn test_benchmark_on_disconnected_chains() {
        let engine = engine();
        let results = engine
            .run_benchmark(&["ethereum".to_string(), "bsc".to_string()])
            .await;
        assert!(results.is_empty());

        let perf = engine.journal().by_category(Category::Performance);
        let errors = perf.iter().filter(|e| e.severity == Severity::Error).count();
        assert_eq!(perf.len(), 4);
        assert_eq!(errors, 2);
        assert!(engine.last_benchmark("Ethereum").is_none());
    }
}
