//! On-Chain Aggregator Source - `latestRoundData()` Reads
//!
//! Reads the latest round from a price-aggregator contract through the
//! chain's shared RPC handle. `latestRoundData()` and `decimals()` are
//! issued concurrently as raw `eth_call`s and decoded by hand:
//!
//! ```text
//! latestRoundData() -> (uint80 roundId, int256 answer, uint256 startedAt,
//!                       uint256 updatedAt, uint80 answeredInRound)
//! ```

use std::sync::Arc;
use std::time::Instant;

use alloy::primitives::{Address, Bytes, U256, keccak256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use futures_util::future::try_join;
use tracing::{debug, instrument};

use crate::domain::reading::{chain_key, scale_answer};
use crate::domain::{FetchError, PriceReading, ProviderKind, TradingPair};
use crate::ports::PriceSource;

use super::directory::FeedDirectory;
use super::provider::SharedProvider;
use super::registry::ConnectionRegistry;

const WORD: usize = 32;
const PROVIDER: ProviderKind = ProviderKind::OnChainAggregator;

/// Decoded `latestRoundData()` return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundData {
    pub round_id: String,
    pub answer: i128,
    pub updated_at: u64,
}

fn upstream(message: impl Into<String>) -> FetchError {
    FetchError::upstream(PROVIDER.label(), message)
}

/// Decode the five-word `latestRoundData()` return data.
pub fn decode_round_data(out: &[u8]) -> Result<RoundData, FetchError> {
    if out.len() < 5 * WORD {
        return Err(upstream(format!(
            "latestRoundData returned {} bytes",
            out.len()
        )));
    }

    let round_id = U256::from_be_slice(&out[0..WORD]).to_string();

    let answer_word = &out[WORD..2 * WORD];
    if answer_word[0] & 0x80 != 0 {
        return Err(upstream("negative answer"));
    }
    if answer_word[..16].iter().any(|b| *b != 0) {
        return Err(upstream("answer out of range"));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&answer_word[16..]);
    let answer = i128::try_from(u128::from_be_bytes(low))
        .map_err(|_| upstream("answer out of range"))?;

    let updated_word = &out[3 * WORD..4 * WORD];
    if updated_word[..24].iter().any(|b| *b != 0) {
        return Err(upstream("updatedAt out of range"));
    }
    let mut ts = [0u8; 8];
    ts.copy_from_slice(&updated_word[24..]);

    Ok(RoundData {
        round_id,
        answer,
        updated_at: u64::from_be_bytes(ts),
    })
}

/// Decode the single-word `decimals()` return data.
pub fn decode_decimals(out: &[u8]) -> Result<u8, FetchError> {
    if out.len() < WORD {
        return Err(upstream(format!("decimals returned {} bytes", out.len())));
    }
    if out[..WORD - 1].iter().any(|b| *b != 0) {
        return Err(upstream("decimals out of range"));
    }
    Ok(out[WORD - 1])
}

fn selector(signature: &[u8]) -> Bytes {
    Bytes::copy_from_slice(&keccak256(signature)[..4])
}

/// Reads from on-chain price aggregators via the connection registry.
pub struct OnChainAggregatorSource {
    registry: Arc<ConnectionRegistry>,
    directory: FeedDirectory,
}

impl OnChainAggregatorSource {
    pub fn new(registry: Arc<ConnectionRegistry>, directory: FeedDirectory) -> Self {
        Self {
            registry,
            directory,
        }
    }

    async fn call(provider: &SharedProvider, to: Address, calldata: Bytes) -> Result<Bytes, FetchError> {
        provider
            .call(&TransactionRequest::default().to(to).input(calldata.into()))
            .await
            .map_err(|e| upstream(e.to_string()))
    }
}

#[async_trait]
impl PriceSource for OnChainAggregatorSource {
    fn kind(&self) -> ProviderKind {
        PROVIDER
    }

    #[instrument(skip(self), fields(pair = %pair))]
    async fn fetch(&self, chain: &str, pair: &TradingPair) -> Result<PriceReading, FetchError> {
        let chain = chain_key(chain);
        let address = self
            .directory
            .lookup(&chain, pair)
            .ok_or_else(|| FetchError::NotConfigured {
                chain: chain.clone(),
                pair: pair.to_string(),
            })?;
        let provider = self.registry.provider(&chain)?;

        let started = Instant::now();
        let (round_out, decimals_out) = try_join(
            Self::call(&provider, address, selector(b"latestRoundData()")),
            Self::call(&provider, address, selector(b"decimals()")),
        )
        .await?;
        let latency_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

        let round = decode_round_data(&round_out)?;
        let decimals = decode_decimals(&decimals_out)?;
        let price = scale_answer(round.answer, decimals)
            .ok_or_else(|| upstream(format!("cannot scale answer by {decimals} decimals")))?;

        debug!(chain = %chain, price, round_id = %round.round_id, latency_ms, "Aggregator round read");

        Ok(PriceReading {
            price,
            observed_at_ms: i64::try_from(round.updated_at.saturating_mul(1000)).unwrap_or(i64::MAX),
            decimals,
            round_id: round.round_id,
            chain,
            pair: pair.clone(),
            provider: PROVIDER,
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(value: u128) -> [u8; 32] {
        let mut w = [0u8; 32];
        w[16..].copy_from_slice(&value.to_be_bytes());
        w
    }

    fn round_output(round_id: u128, answer: [u8; 32], updated_at: u128) -> Vec<u8> {
        [word(round_id), answer, word(updated_at - 5), word(updated_at), word(round_id)].concat()
    }

    #[test]
    fn test_selectors() {
        assert_eq!(&selector(b"latestRoundData()")[..], &[0xfe, 0xaf, 0x96, 0x8c]);
        assert_eq!(&selector(b"decimals()")[..], &[0x31, 0x3c, 0xe5, 0x67]);
    }

    #[test]
    fn test_decode_round_data() {
        let out = round_output(110_680_464_442_257_320_000, word(350_012_345_678), 1_700_000_000);
        let round = decode_round_data(&out).unwrap();
        assert_eq!(round.round_id, "110680464442257320000");
        assert_eq!(round.answer, 350_012_345_678);
        assert_eq!(round.updated_at, 1_700_000_000);

        let price = scale_answer(round.answer, 8).unwrap();
        assert!((price - 3500.123_456_78).abs() < 1e-9);
    }

    #[test]
    fn test_negative_answer_rejected() {
        let out = round_output(1, [0xff; 32], 1_700_000_000);
        assert_eq!(
            decode_round_data(&out).unwrap_err().kind(),
            "UpstreamError"
        );
    }

    #[test]
    fn test_short_output_rejected() {
        assert!(decode_round_data(&[0u8; 64]).is_err());
        assert!(decode_decimals(&[]).is_err());
    }

    #[test]
    fn test_decode_decimals() {
        assert_eq!(decode_decimals(&word(8)).unwrap(), 8);
        assert!(decode_decimals(&word(256)).is_err());
    }
}
