//! CoinGecko Spot Fallback Source
//!
//! Public spot-price API used as the third provider. Base symbols are
//! mapped to CoinGecko coin ids; unmapped symbols fail with
//! `UnknownSymbol` before any request is made.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::domain::reading::{chain_key, round_to_scale};
use crate::domain::{FetchError, PriceReading, ProviderKind, TradingPair};
use crate::ports::PriceSource;

use super::http::RestClient;

const PROVIDER: ProviderKind = ProviderKind::RestFallback;
const PATH: &str = "/api/v3/simple/price";
const DECIMALS: u8 = 8;

const COIN_IDS: [(&str, &str); 6] = [
    ("btc", "bitcoin"),
    ("eth", "ethereum"),
    ("link", "chainlink"),
    ("bnb", "binancecoin"),
    ("matic", "matic-network"),
    ("avax", "avalanche-2"),
];

/// CoinGecko id for a base symbol, case-insensitive.
pub fn coin_id(base: &str) -> Option<&'static str> {
    let base = base.to_ascii_lowercase();
    COIN_IDS
        .iter()
        .find(|(symbol, _)| *symbol == base)
        .map(|(_, id)| *id)
}

/// `{ "<id>": { "<currency>": price, "last_updated_at": secs } }`
type SimplePriceResponse = HashMap<String, HashMap<String, f64>>;

fn upstream(message: impl Into<String>) -> FetchError {
    FetchError::upstream(PROVIDER.label(), message)
}

/// Extract `(price, observed_at_ms)` for `id` quoted in `currency`.
#[allow(clippy::cast_possible_truncation)]
fn decode(
    body: &SimplePriceResponse,
    id: &str,
    currency: &str,
    now_ms: i64,
) -> Result<(f64, i64), FetchError> {
    let coin = body
        .get(id)
        .ok_or_else(|| upstream(format!("no data for {id}")))?;
    let raw = coin
        .get(currency)
        .copied()
        .ok_or_else(|| upstream(format!("no {currency} quote for {id}")))?;
    let price = round_to_scale(raw, DECIMALS).ok_or_else(|| upstream("invalid price"))?;
    let observed_at_ms = coin
        .get("last_updated_at")
        .filter(|t| t.is_finite() && **t > 0.0)
        .map_or(now_ms, |t| (*t as i64).saturating_mul(1000));
    Ok((price, observed_at_ms))
}

/// Spot fallback adapter backed by CoinGecko.
pub struct CoinGeckoSource {
    client: RestClient,
}

impl CoinGeckoSource {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    fn kind(&self) -> ProviderKind {
        PROVIDER
    }

    #[instrument(skip(self), fields(pair = %pair))]
    async fn fetch(&self, chain: &str, pair: &TradingPair) -> Result<PriceReading, FetchError> {
        let id = coin_id(pair.base()).ok_or_else(|| FetchError::UnknownSymbol(pair.base().to_string()))?;
        let currency = pair.quote().to_ascii_lowercase();

        let started = Instant::now();
        let body: SimplePriceResponse = self
            .client
            .get_json(
                PATH,
                &[
                    ("ids", id.to_string()),
                    ("vs_currencies", currency.clone()),
                    ("include_last_updated_at", "true".to_string()),
                ],
            )
            .await?;
        let latency_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

        let now_ms = Utc::now().timestamp_millis();
        let (price, observed_at_ms) = decode(&body, id, &currency, now_ms)?;
        debug!(id, price, latency_ms, "Spot price received");

        Ok(PriceReading {
            price,
            observed_at_ms,
            decimals: DECIMALS,
            round_id: now_ms.to_string(),
            chain: chain_key(chain),
            pair: pair.clone(),
            provider: PROVIDER,
            latency_ms,
        })
    }
}
