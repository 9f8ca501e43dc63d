//! Failure taxonomy for fetches and engine control.
//!
//! Every [`FetchError`] is recoverable per tick: it aborts the current
//! fetch for one key, gets journaled, and the feed keeps ticking.

use thiserror::Error;

/// Why a single provider fetch produced no reading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The chain has no live connection handle.
    #[error("Connection unavailable: {chain}")]
    ConnectionUnavailable {
        /// Chain that was requested.
        chain: String,
    },

    /// No known source exists for this chain and pair.
    #[error("No feed configured for {pair} on {chain}")]
    NotConfigured {
        /// Chain that was requested.
        chain: String,
        /// Pair that was requested.
        pair: String,
    },

    /// The external call failed, timed out, or returned unusable data.
    #[error("Upstream error from {provider}: {message}")]
    Upstream {
        /// Provider label.
        provider: String,
        /// Failure description.
        message: String,
    },

    /// The fallback source has no identifier for this base asset.
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
}

impl FetchError {
    /// Stable label for journal details and metric labels.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionUnavailable { .. } => "ConnectionUnavailable",
            Self::NotConfigured { .. } => "NotConfigured",
            Self::Upstream { .. } => "UpstreamError",
            Self::UnknownSymbol(_) => "UnknownSymbol",
        }
    }

    /// Shorthand for an upstream failure.
    pub fn upstream(provider: &str, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

/// Why the facade refused to start an oracle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// One of the four request fields is empty.
    #[error("Oracle request incomplete: {missing} missing")]
    IncompleteConfig {
        /// Name of the first missing field.
        missing: &'static str,
    },

    /// The provider name does not map to a known provider kind.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// The source chain has no live connection.
    #[error("Chain not connected: {0}")]
    ChainNotConnected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        let err = FetchError::NotConfigured {
            chain: "ethereum".to_string(),
            pair: "XRP/USD".to_string(),
        };
        assert_eq!(err.kind(), "NotConfigured");
        assert_eq!(err.to_string(), "No feed configured for XRP/USD on ethereum");
        assert_eq!(FetchError::upstream("band", "timeout").kind(), "UpstreamError");
    }
}
