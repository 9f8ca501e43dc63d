//! Chain Adapters - EVM Interaction Layer
//!
//! Provides on-chain access via alloy-rs 0.9 for:
//! - One RPC connection per chain, probed at startup
//! - The aggregator feed directory
//! - `latestRoundData()` price reads
//! - Block height / gas price sampling for benchmarks

pub mod aggregator;
pub mod directory;
pub mod probe;
pub mod provider;
pub mod registry;

pub use aggregator::OnChainAggregatorSource;
pub use directory::FeedDirectory;
pub use probe::{ChainMetrics, ChainProbe};
pub use provider::{ChainConnection, ChainEndpoint, SharedProvider};
pub use registry::ConnectionRegistry;
