//! Prometheus Metrics Registry - Oracle Observability
//!
//! Registers the oracle engine's metrics: fetch latency and outcomes per
//! provider, active feed count, per-chain connectivity and journal size.
//! Exposed as text on `/metrics` by the health server.

use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::domain::{FeedKey, ProviderKind};

/// Centralized Prometheus metrics for the oracle engine.
///
/// All metrics follow the naming convention `oracle_monitor_*`.
pub struct OracleMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// End-to-end fetch latency histogram (milliseconds).
    pub fetch_latency_ms: HistogramVec,
    /// Fetch outcomes (success or failure kind).
    pub fetches: IntCounterVec,
    /// Currently installed feed tasks.
    pub active_feeds: IntGauge,
    /// Chain connection status (1 = connected, 0 = disconnected).
    pub chain_connected: GaugeVec,
    /// Entries currently held by the journal.
    pub journal_entries: IntGauge,
}

impl OracleMetrics {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let fetch_latency_ms = HistogramVec::new(
            HistogramOpts::new(
                "oracle_monitor_fetch_latency_ms",
                "Provider fetch latency in milliseconds",
            )
            .buckets(vec![
                10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0,
            ]),
            &["provider", "chain", "pair"],
        )?;

        let fetches = IntCounterVec::new(
            Opts::new("oracle_monitor_fetches_total", "Provider fetches by outcome"),
            &["provider", "outcome"],
        )?;

        let active_feeds = IntGauge::new(
            "oracle_monitor_active_feeds",
            "Feed tasks currently installed",
        )?;

        let chain_connected = GaugeVec::new(
            Opts::new(
                "oracle_monitor_chain_connected",
                "Chain connection status (1=connected, 0=disconnected)",
            ),
            &["chain"],
        )?;

        let journal_entries = IntGauge::new(
            "oracle_monitor_journal_entries",
            "Entries currently retained by the activity journal",
        )?;

        registry.register(Box::new(fetch_latency_ms.clone()))?;
        registry.register(Box::new(fetches.clone()))?;
        registry.register(Box::new(active_feeds.clone()))?;
        registry.register(Box::new(chain_connected.clone()))?;
        registry.register(Box::new(journal_entries.clone()))?;

        Ok(Self {
            registry,
            fetch_latency_ms,
            fetches,
            active_feeds,
            chain_connected,
            journal_entries,
        })
    }

    /// Record one successful fetch.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_success(&self, provider: ProviderKind, key: &FeedKey, latency_ms: i64) {
        let pair = key.pair.to_string();
        self.fetch_latency_ms
            .with_label_values(&[provider.label(), key.chain.as_str(), pair.as_str()])
            .observe(latency_ms as f64);
        self.fetches
            .with_label_values(&[provider.label(), "success"])
            .inc();
    }

    /// Record one failed fetch under its failure kind.
    pub fn record_failure(&self, provider: ProviderKind, kind: &str) {
        self.fetches.with_label_values(&[provider.label(), kind]).inc();
    }

    pub fn set_chain_connected(&self, chain: &str, connected: bool) {
        self.chain_connected
            .with_label_values(&[chain])
            .set(if connected { 1.0 } else { 0.0 });
    }

    /// Encode every registered metric in the Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_recorded_series() {
        let metrics = OracleMetrics::new().unwrap();
        let key = FeedKey::new("ethereum", "ETH/USD".parse().unwrap());
        metrics.record_success(ProviderKind::OnChainAggregator, &key, 42);
        metrics.record_failure(ProviderKind::RestFallback, "UnknownSymbol");
        metrics.set_chain_connected("ethereum", true);
        metrics.active_feeds.set(2);

        let text = metrics.render().unwrap();
        assert!(text.contains("oracle_monitor_fetches_total"));
        assert!(text.contains("outcome=\"UnknownSymbol\""));
        assert!(text.contains("oracle_monitor_active_feeds 2"));
        assert!(text.contains("chain=\"ethereum\""));
    }
}
