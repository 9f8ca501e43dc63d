//! REST Price Feed Adapters
//!
//! HTTP price sources polled by the scheduler:
//! - Band: decentralized REST aggregator (9 implied decimals)
//! - CoinGecko: public spot-price fallback
//! - Http: shared rate-limited JSON client

pub mod band;
pub mod coingecko;
pub mod http;

pub use band::BandSource;
pub use coingecko::CoinGeckoSource;
pub use http::{RestClient, RestClientConfig};
