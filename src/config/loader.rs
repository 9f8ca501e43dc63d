//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Smallest accepted tick interval.
const MIN_TICK_INTERVAL_MS: u64 = 100;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    chains = config.chains.len(),
    pairs = config.scheduler.pairs.len(),
    tick_ms = config.scheduler.tick_interval_ms,
    autostart = config.oracle.is_some(),
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
pub fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.chains.is_empty(),
    "At least one chain must be configured"
  );
  for (i, chain) in config.chains.iter().enumerate() {
    anyhow::ensure!(!chain.name.trim().is_empty(), "Chain {i} has an empty name");
    anyhow::ensure!(
      !chain.rpc_url.trim().is_empty(),
      "Chain {} has an empty rpc_url",
      chain.name
    );
  }

  anyhow::ensure!(
    config.journal.capacity > 0,
    "Journal capacity must be positive"
  );

  anyhow::ensure!(
    config.scheduler.tick_interval_ms >= MIN_TICK_INTERVAL_MS,
    "tick_interval_ms must be at least {MIN_TICK_INTERVAL_MS}, got {}",
    config.scheduler.tick_interval_ms
  );
  anyhow::ensure!(
    !config.scheduler.pairs.is_empty(),
    "At least one pair must be configured"
  );
  config.pairs()?;

  anyhow::ensure!(
    config.providers.timeout_ms > 0,
    "Provider timeout_ms must be positive"
  );
  anyhow::ensure!(
    config.providers.min_count <= config.providers.ask_count,
    "min_count ({}) must not exceed ask_count ({})",
    config.providers.min_count,
    config.providers.ask_count
  );

  config.feed_directory()?;

  Ok(())
}
