//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the `PriceSource` port with concrete external
//! dependencies (EVM RPC, REST price APIs) and hosts the
//! observability surface.
//!
//! Adapter categories:
//! - `chain`: Per-chain RPC connections and aggregator reads via alloy-rs
//! - `feeds`: REST price sources (Band, CoinGecko)
//! - `metrics`: Prometheus metrics export and health checks

pub mod chain;
pub mod feeds;
pub mod metrics;
