//! Oracle start requests.
//!
//! The presentation layer hands over four loosely-typed strings; the
//! engine only acts once all four are present and the provider name
//! maps onto a [`ProviderKind`].

use serde::{Deserialize, Serialize};

use super::errors::EngineError;
use super::reading::{ProviderKind, chain_key};

/// Raw request as submitted by a configuration form or `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OracleRequest {
    #[serde(alias = "source_chain")]
    pub source_chain: String,
    #[serde(alias = "target_chain")]
    pub target_chain: String,
    #[serde(alias = "provider_kind")]
    pub provider_kind: String,
    #[serde(alias = "data_kind")]
    pub data_kind: String,
}

impl OracleRequest {
    pub fn new(
        source_chain: impl Into<String>,
        target_chain: impl Into<String>,
        provider_kind: impl Into<String>,
        data_kind: impl Into<String>,
    ) -> Self {
        Self {
            source_chain: source_chain.into(),
            target_chain: target_chain.into(),
            provider_kind: provider_kind.into(),
            data_kind: data_kind.into(),
        }
    }

    /// Check presence of every field and resolve the provider kind.
    pub fn validate(&self) -> Result<OracleConfig, EngineError> {
        for (name, value) in [
            ("sourceChain", &self.source_chain),
            ("targetChain", &self.target_chain),
            ("providerKind", &self.provider_kind),
            ("dataKind", &self.data_kind),
        ] {
            if value.trim().is_empty() {
                return Err(EngineError::IncompleteConfig { missing: name });
            }
        }

        let provider = self
            .provider_kind
            .parse::<ProviderKind>()
            .map_err(EngineError::UnknownProvider)?;

        Ok(OracleConfig {
            source_chain: chain_key(&self.source_chain),
            target_chain: chain_key(&self.target_chain),
            provider,
            data_kind: self.data_kind.trim().to_string(),
        })
    }
}

/// Validated feed configuration handed to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleConfig {
    /// Lower-case chain whose feeds are polled.
    pub source_chain: String,
    /// Lower-case counterparty chain (informational).
    pub target_chain: String,
    pub provider: ProviderKind,
    /// Kind of data being monitored, e.g. `Price Feed`.
    pub data_kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_complete_request() {
        let config = OracleRequest::new("Ethereum", "Polygon", "OnChainAggregator", "Price Feed")
            .validate()
            .unwrap();
        assert_eq!(config.source_chain, "ethereum");
        assert_eq!(config.target_chain, "polygon");
        assert_eq!(config.provider, ProviderKind::OnChainAggregator);
    }

    #[test]
    fn test_validate_reports_missing_field() {
        let err = OracleRequest::new("Ethereum", "", "Chainlink", "Price Feed")
            .validate()
            .unwrap_err();
        assert_eq!(err, EngineError::IncompleteConfig { missing: "targetChain" });
    }

    #[test]
    fn test_validate_unknown_provider() {
        let err = OracleRequest::new("Ethereum", "Polygon", "Pyth", "Price Feed")
            .validate()
            .unwrap_err();
        assert_eq!(err, EngineError::UnknownProvider("Pyth".to_string()));
    }
}
