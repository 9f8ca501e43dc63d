//! Band Protocol REST Aggregator Source
//!
//! Queries the BandChain LCD `request_prices` endpoint for the pair's
//! compact symbol (`BTCUSD`). Prices arrive as integers scaled by 1e9.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::domain::reading::{chain_key, scale_answer};
use crate::domain::{FetchError, PriceReading, ProviderKind, TradingPair};
use crate::ports::PriceSource;

use super::http::RestClient;

const PROVIDER: ProviderKind = ProviderKind::RestAggregator;
const PATH: &str = "/api/oracle/v1/request_prices";
/// Band quotes every price with nine implied decimals.
pub const BAND_DECIMALS: u8 = 9;

#[derive(Debug, Deserialize)]
struct RequestPricesResponse {
    #[serde(default)]
    price_results: Vec<PriceResult>,
}

#[derive(Debug, Deserialize)]
struct PriceResult {
    px: Value,
    #[serde(default)]
    request_id: Option<Value>,
}

/// JSON integers may arrive as strings or numbers.
fn integer_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn upstream(message: impl Into<String>) -> FetchError {
    FetchError::upstream(PROVIDER.label(), message)
}

/// Turn a `request_prices` body into `(price, round_id)`.
fn decode(body: RequestPricesResponse) -> Result<(f64, String), FetchError> {
    let first = body
        .price_results
        .into_iter()
        .next()
        .ok_or_else(|| upstream("no price results"))?;

    let raw: i128 = integer_text(&first.px)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| upstream(format!("unparseable px: {}", first.px)))?;
    let price = scale_answer(raw, BAND_DECIMALS).ok_or_else(|| upstream("negative px"))?;
    let round_id = first
        .request_id
        .as_ref()
        .and_then(integer_text)
        .unwrap_or_default();

    Ok((price, round_id))
}

/// REST aggregator adapter backed by BandChain.
pub struct BandSource {
    client: RestClient,
    min_count: u32,
    ask_count: u32,
}

impl BandSource {
    pub fn new(client: RestClient, min_count: u32, ask_count: u32) -> Self {
        Self {
            client,
            min_count,
            ask_count,
        }
    }
}

#[async_trait]
impl PriceSource for BandSource {
    fn kind(&self) -> ProviderKind {
        PROVIDER
    }

    #[instrument(skip(self), fields(pair = %pair))]
    async fn fetch(&self, chain: &str, pair: &TradingPair) -> Result<PriceReading, FetchError> {
        let started = Instant::now();
        let body: RequestPricesResponse = self
            .client
            .get_json(
                PATH,
                &[
                    ("symbols", pair.compact()),
                    ("min_count", self.min_count.to_string()),
                    ("ask_count", self.ask_count.to_string()),
                ],
            )
            .await?;
        let latency_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

        let (price, round_id) = decode(body)?;
        debug!(price, round_id = %round_id, latency_ms, "Band price received");

        Ok(PriceReading {
            price,
            observed_at_ms: Utc::now().timestamp_millis(),
            decimals: BAND_DECIMALS,
            round_id,
            chain: chain_key(chain),
            pair: pair.clone(),
            provider: PROVIDER,
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> RequestPricesResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_decode_string_px() {
        let (price, round) = decode(parse(
            r#"{"price_results":[{"symbol":"BTCUSD","multiplier":"1000000000","px":"67000123456789","request_id":"123456","resolve_time":"1700000000"}]}"#,
        ))
        .unwrap();
        assert!((price - 67_000.123_456_789).abs() < 1e-6);
        assert_eq!(round, "123456");
    }

    #[test]
    fn test_decode_numeric_px_without_request_id() {
        let (price, round) = decode(parse(r#"{"price_results":[{"px":3500000000000}]}"#)).unwrap();
        assert!((price - 3500.0).abs() < 1e-9);
        assert_eq!(round, "");
    }

    #[test]
    fn test_empty_results_is_upstream_error() {
        let err = decode(parse(r#"{"price_results":[]}"#)).unwrap_err();
        assert_eq!(err.kind(), "UpstreamError");
        assert!(decode(parse("{}")).is_err());
    }

    #[test]
    fn test_garbage_px_is_upstream_error() {
        let err = decode(parse(r#"{"price_results":[{"px":"abc"}]}"#)).unwrap_err();
        assert_eq!(err.kind(), "UpstreamError");
    }
}
