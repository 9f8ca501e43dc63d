//! Subscription Router - Per-Topic Reading Fanout
//!
//! Maps each `(chain, pair)` key to an ordered list of listeners and
//! delivers every published reading, synchronously and in registration
//! order, to the listeners of the reading's own key. A panicking listener
//! is contained so the rest of the list still gets the reading.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::domain::{FeedKey, PriceReading};

/// Receives readings for one topic.
pub type ReadingListener = Arc<dyn Fn(&PriceReading) + Send + Sync>;

/// Publish/subscribe fanout keyed by [`FeedKey`].
#[derive(Default)]
pub struct SubscriptionRouter {
    topics: Mutex<HashMap<FeedKey, Vec<ReadingListener>>>,
}

impl SubscriptionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<FeedKey, Vec<ReadingListener>>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `listener` to the topic's list. Callers avoid double registration.
    pub fn subscribe(&self, key: FeedKey, listener: ReadingListener) {
        self.lock().entry(key).or_default().push(listener);
    }

    /// Remove `listener` from the topic by identity; absent listeners are a no-op.
    pub fn unsubscribe(&self, key: &FeedKey, listener: &ReadingListener) {
        let mut topics = self.lock();
        if let Some(listeners) = topics.get_mut(key) {
            listeners.retain(|l| !Arc::ptr_eq(l, listener));
            if listeners.is_empty() {
                topics.remove(key);
            }
        }
    }

    /// Deliver `reading` to every listener of its key. Returns the delivery count.
    pub fn publish(&self, reading: &PriceReading) -> usize {
        let key = reading.key();
        // Clone the list so listeners may (un)subscribe while being called.
        let listeners: Vec<ReadingListener> = match self.lock().get(&key) {
            Some(listeners) => listeners.clone(),
            None => return 0,
        };

        for listener in &listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(reading))).is_err() {
                warn!(topic = %key, "Reading listener panicked; continuing delivery");
            }
        }

        debug!(topic = %key, listeners = listeners.len(), "Reading published");
        listeners.len()
    }

    /// Number of listeners on `key`.
    pub fn listener_count(&self, key: &FeedKey) -> usize {
        self.lock().get(key).map_or(0, Vec::len)
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::domain::{ProviderKind, TradingPair};

    fn reading(chain: &str, pair: &str, price: f64) -> PriceReading {
        PriceReading {
            price,
            observed_at_ms: 1_700_000_000_000,
            decimals: 8,
            round_id: "42".to_string(),
            chain: chain.to_string(),
            pair: pair.parse().unwrap(),
            provider: ProviderKind::OnChainAggregator,
            latency_ms: 5,
        }
    }

    fn key(chain: &str, pair: &str) -> FeedKey {
        FeedKey::new(chain, pair.parse::<TradingPair>().unwrap())
    }

    #[test]
    fn test_delivers_in_registration_order() {
        let router = SubscriptionRouter::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let order = Arc::clone(&order);
            router.subscribe(
                key("ethereum", "ETH/USD"),
                Arc::new(move |_: &PriceReading| order.lock().unwrap().push(id)),
            );
        }

        assert_eq!(router.publish(&reading("ethereum", "ETH/USD", 3500.0)), 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_only_matching_topic_receives() {
        let router = SubscriptionRouter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        router.subscribe(
            key("polygon", "BTC/USD"),
            Arc::new(move |_: &PriceReading| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(router.publish(&reading("ethereum", "BTC/USD", 1.0)), 0);
        assert_eq!(router.publish(&reading("polygon", "ETH/USD", 1.0)), 0);
        assert_eq!(router.publish(&reading("polygon", "BTC/USD", 1.0)), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_by_identity() {
        let router = SubscriptionRouter::new();
        let a: ReadingListener = Arc::new(|_: &PriceReading| {});
        let b: ReadingListener = Arc::new(|_: &PriceReading| {});
        let k = key("bsc", "BTC/USD");

        router.subscribe(k.clone(), Arc::clone(&a));
        router.subscribe(k.clone(), Arc::clone(&b));
        router.unsubscribe(&k, &a);
        assert_eq!(router.listener_count(&k), 1);

        // Absent listener: no-op
        router.unsubscribe(&k, &a);
        router.unsubscribe(&key("bsc", "ETH/USD"), &b);
        assert_eq!(router.listener_count(&k), 1);
    }

    #[test]
    fn test_failing_listener_does_not_stop_delivery() {
        let router = SubscriptionRouter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let k = key("ethereum", "ETH/USD");

        router.subscribe(k.clone(), Arc::new(|r: &PriceReading| assert!(r.price < 0.0, "boom")));
        router.subscribe(
            k,
            Arc::new(move |_: &PriceReading| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(router.publish(&reading("ethereum", "ETH/USD", 10.0)), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_drops_all_topics() {
        let router = SubscriptionRouter::new();
        let k = key("ethereum", "ETH/USD");
        router.subscribe(k.clone(), Arc::new(|_: &PriceReading| {}));
        router.clear();
        assert_eq!(router.listener_count(&k), 0);
    }
}
