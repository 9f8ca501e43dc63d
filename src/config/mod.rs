//! Configuration Module - TOML-based Engine Configuration
//!
//! Loads and validates configuration from `config.toml`. Every section
//! has defaults, so an empty file yields the four public chains, the
//! baseline pairs and a 3 s tick. Chain endpoints and extra feed
//! addresses live here, not in the domain layer.

pub mod loader;

use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::chain::{ChainEndpoint, FeedDirectory};
use crate::adapters::feeds::RestClientConfig;
use crate::domain::{OracleRequest, TradingPair};
use crate::usecases::scheduler::SchedulerSettings;

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Engine identity and logging.
  #[serde(default)]
  pub engine: EngineConfig,
  /// Chains to connect at startup.
  #[serde(default = "ChainEndpoint::defaults")]
  pub chains: Vec<ChainEndpoint>,
  /// Extra on-chain feeds merged over the built-in directory.
  #[serde(default)]
  pub feeds: Vec<FeedConfig>,
  /// REST provider endpoints and limits.
  #[serde(default)]
  pub providers: ProvidersConfig,
  /// Polling cadence and working set.
  #[serde(default)]
  pub scheduler: SchedulerConfig,
  /// Activity journal.
  #[serde(default)]
  pub journal: JournalConfig,
  /// Metrics and health endpoints.
  #[serde(default)]
  pub metrics: MetricsConfig,
  /// Oracle configuration started right after the chains connect.
  #[serde(default)]
  pub oracle: Option<OracleRequest>,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      engine: EngineConfig::default(),
      chains: ChainEndpoint::defaults(),
      feeds: Vec::new(),
      providers: ProvidersConfig::default(),
      scheduler: SchedulerConfig::default(),
      journal: JournalConfig::default(),
      metrics: MetricsConfig::default(),
      oracle: None,
    }
  }
}

/// Engine identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
  /// Human-readable instance name.
  #[serde(default = "default_name")]
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      name: default_name(),
      log_level: default_log_level(),
    }
  }
}

/// One additional aggregator contract.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
  pub chain: String,
  /// `BASE/QUOTE`.
  pub pair: String,
  /// Hex contract address.
  pub address: String,
}

/// REST provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
  /// REST aggregator (BandChain LCD) base URL.
  #[serde(default = "default_rest_aggregator_url")]
  pub rest_aggregator_url: String,
  /// Spot fallback (CoinGecko) base URL.
  #[serde(default = "default_rest_fallback_url")]
  pub rest_fallback_url: String,
  /// Per-request timeout in milliseconds.
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  /// Minimum validator reports for an aggregated price.
  #[serde(default = "default_min_count")]
  pub min_count: u32,
  /// Validators asked per aggregated price.
  #[serde(default = "default_ask_count")]
  pub ask_count: u32,
  #[serde(default = "default_aggregator_rpm")]
  pub aggregator_requests_per_minute: u32,
  /// CoinGecko's public tier allows roughly 30 calls per minute.
  #[serde(default = "default_fallback_rpm")]
  pub fallback_requests_per_minute: u32,
}

impl Default for ProvidersConfig {
  fn default() -> Self {
    Self {
      rest_aggregator_url: default_rest_aggregator_url(),
      rest_fallback_url: default_rest_fallback_url(),
      timeout_ms: default_timeout_ms(),
      min_count: default_min_count(),
      ask_count: default_ask_count(),
      aggregator_requests_per_minute: default_aggregator_rpm(),
      fallback_requests_per_minute: default_fallback_rpm(),
    }
  }
}

impl ProvidersConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }

  pub fn aggregator_client(&self) -> RestClientConfig {
    RestClientConfig {
      base_url: self.rest_aggregator_url.clone(),
      timeout: self.timeout(),
      requests_per_minute: self.aggregator_requests_per_minute,
      ..RestClientConfig::default()
    }
  }

  pub fn fallback_client(&self) -> RestClientConfig {
    RestClientConfig {
      base_url: self.rest_fallback_url.clone(),
      timeout: self.timeout(),
      requests_per_minute: self.fallback_requests_per_minute,
      ..RestClientConfig::default()
    }
  }
}

/// Polling scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
  /// Time between ticks of one feed (milliseconds).
  #[serde(default = "default_tick_interval_ms")]
  pub tick_interval_ms: u64,
  /// Pairs installed per started configuration.
  #[serde(default = "default_pairs")]
  pub pairs: Vec<String>,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      tick_interval_ms: default_tick_interval_ms(),
      pairs: default_pairs(),
    }
  }
}

/// Journal configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
  /// Retained entries; oldest are evicted first.
  #[serde(default = "default_journal_capacity")]
  pub capacity: usize,
}

impl Default for JournalConfig {
  fn default() -> Self {
    Self {
      capacity: default_journal_capacity(),
    }
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Serve /live, /ready and /metrics.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: default_true(),
      bind_address: default_metrics_addr(),
    }
  }
}

impl AppConfig {
  /// Parsed scheduler working set.
  pub fn pairs(&self) -> Result<Vec<TradingPair>> {
    self
      .scheduler
      .pairs
      .iter()
      .map(|p| p.parse::<TradingPair>().with_context(|| format!("Invalid pair {p:?}")))
      .collect()
  }

  pub fn scheduler_settings(&self) -> Result<SchedulerSettings> {
    Ok(SchedulerSettings {
      tick_interval: Duration::from_millis(self.scheduler.tick_interval_ms),
      pairs: self.pairs()?,
    })
  }

  /// Built-in aggregator feeds plus any configured extras.
  pub fn feed_directory(&self) -> Result<FeedDirectory> {
    let mut directory = FeedDirectory::builtin();
    for feed in &self.feeds {
      let pair: TradingPair = feed
        .pair
        .parse()
        .with_context(|| format!("Invalid feed pair {:?}", feed.pair))?;
      let address: Address = feed
        .address
        .parse()
        .with_context(|| format!("Invalid feed address {:?}", feed.address))?;
      directory.insert(&feed.chain, pair, address);
    }
    Ok(directory)
  }
}

// Default value functions for serde

fn default_name() -> String {
  "oracle-monitor".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_rest_aggregator_url() -> String {
  "https://laozi1.bandchain.org".to_string()
}

fn default_rest_fallback_url() -> String {
  "https://api.coingecko.com".to_string()
}

fn default_timeout_ms() -> u64 {
  5_000
}

fn default_min_count() -> u32 {
  3
}

fn default_ask_count() -> u32 {
  4
}

fn default_aggregator_rpm() -> u32 {
  120
}

fn default_fallback_rpm() -> u32 {
  30
}

fn default_tick_interval_ms() -> u64 {
  3_000
}

fn default_pairs() -> Vec<String> {
  crate::domain::reading::BASELINE_PAIRS
    .iter()
    .map(ToString::to_string)
    .collect()
}

fn default_journal_capacity() -> usize {
  crate::usecases::journal::DEFAULT_CAPACITY
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}
