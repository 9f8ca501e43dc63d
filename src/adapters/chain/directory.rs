//! Aggregator Feed Directory
//!
//! Static `(chain, pair) → contract address` table for the on-chain price
//! aggregator. Pairs absent from the table are `NotConfigured`.

use std::collections::HashMap;

use alloy::primitives::{Address, address};

use crate::domain::TradingPair;
use crate::domain::reading::chain_key;

/// Known aggregator contract addresses.
#[derive(Debug, Clone, Default)]
pub struct FeedDirectory {
    feeds: HashMap<(String, TradingPair), Address>,
}

impl FeedDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Production feeds on the four dashboard chains.
    pub fn builtin() -> Self {
        let mut dir = Self::new();
        let entries = [
            ("ethereum", "ETH", address!("5f4eC3Df9cbd43714FE2740f5E3616155c5b8419")),
            ("ethereum", "BTC", address!("F4030086522a5bEEa4988F8cA5B36dbC97BeE88c")),
            ("ethereum", "LINK", address!("2c1d072e956AFFC0D435Cb7AC38EF18d24d9127c")),
            ("bsc", "BNB", address!("0567F2323251f0Aab15c8dFb1967E4e8A7D42aeE")),
            ("bsc", "ETH", address!("9ef1B8c0E4F7dc8bF5719Ea496883DC6401d5b2e")),
            ("bsc", "BTC", address!("264990fbd0A4796A3E3d8E37C4d5F87a3aCa5Ebf")),
            ("polygon", "MATIC", address!("AB594600376Ec9fD91F8e885dADF0CE036862dE0")),
            ("polygon", "ETH", address!("F9680D99D6C9589e2a93a78A04A279e509205945")),
            ("polygon", "BTC", address!("DE31F8bFBD8c84b5360CFACCa3539B938dd78ae6")),
            ("avalanche", "AVAX", address!("0A77230d17318075983913bC2145DB16C7366156")),
            ("avalanche", "ETH", address!("976B3D034E162d8bD72D6b9C989d545b839003b0")),
            ("avalanche", "BTC", address!("2779D32d5166BAaa2B2b658333bA7e6Ec0C65743")),
        ];
        for (chain, base, addr) in entries {
            dir.insert(chain, TradingPair::new(base, "USD"), addr);
        }
        dir
    }

    /// Add or replace a feed.
    pub fn insert(&mut self, chain: &str, pair: TradingPair, address: Address) {
        self.feeds.insert((chain_key(chain), pair), address);
    }

    pub fn lookup(&self, chain: &str, pair: &TradingPair) -> Option<Address> {
        self.feeds.get(&(chain_key(chain), pair.clone())).copied()
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table() {
        let dir = FeedDirectory::builtin();
        assert_eq!(dir.len(), 12);
        assert_eq!(
            dir.lookup("Ethereum", &"ETH/USD".parse().unwrap()),
            Some(address!("5f4eC3Df9cbd43714FE2740f5E3616155c5b8419"))
        );
        assert!(dir.lookup("ethereum", &"XRP/USD".parse().unwrap()).is_none());
        assert!(dir.lookup("solana", &"ETH/USD".parse().unwrap()).is_none());
    }

    #[test]
    fn test_insert_overrides() {
        let mut dir = FeedDirectory::builtin();
        let pair: TradingPair = "ETH/USD".parse().unwrap();
        dir.insert("ETHEREUM", pair.clone(), Address::ZERO);
        assert_eq!(dir.lookup("ethereum", &pair), Some(Address::ZERO));
        assert_eq!(dir.len(), 12);
    }
}
