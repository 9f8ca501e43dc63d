//! Polling Scheduler - Per-Feed Repeating Fetch Tasks
//!
//! Owns one `FeedTask` per `(chain, pair)` key. Each task ticks on its
//! own tokio interval; every tick runs as a self-contained child task
//! (fetch, then publish + journal), so a slow provider delays only its
//! own results and ticks may overlap without being skipped or queued.
//!
//! Installing a key that is already active cancels the old task first,
//! under the task-table lock, so a key never has two live timers.
//! Cancelling closes the task's gate before aborting it: a result that
//! completes after cancellation finds the gate closed and is dropped.
//! No lock is held while listeners run, so a reading listener may stop,
//! restart or inspect feeds from inside its callback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::json;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::adapters::metrics::OracleMetrics;
use crate::domain::{
    Category, EntryDraft, FeedKey, FetchError, OracleConfig, PriceReading, ProviderKind, Severity,
    TradingPair,
};
use crate::ports::{PriceSource, ProviderSet};

use super::journal::Journal;
use super::router::SubscriptionRouter;

/// Default tick interval.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(3_000);

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Time between ticks of one feed.
    pub tick_interval: Duration,
    /// Working set of pairs installed per started configuration.
    pub pairs: Vec<TradingPair>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            pairs: TradingPair::baseline(),
        }
    }
}

/// Open while the owning task is installed.
#[derive(Debug)]
struct FeedGate {
    open: AtomicBool,
}

impl FeedGate {
    const fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}

/// One installed repeating fetch.
struct FeedTask {
    provider: ProviderKind,
    interval: Duration,
    generation: u64,
    gate: Arc<FeedGate>,
    handle: JoinHandle<()>,
}

impl FeedTask {
    fn cancel(self) {
        self.gate.close();
        self.handle.abort();
    }
}

/// Snapshot of an installed feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedInfo {
    pub key: FeedKey,
    pub provider: ProviderKind,
    pub interval: Duration,
    /// Install counter; grows each time a key is (re)installed.
    pub generation: u64,
}

/// Everything one tick needs, shared by the task and its children.
struct TickContext {
    key: FeedKey,
    source: Arc<dyn PriceSource>,
    router: Arc<SubscriptionRouter>,
    journal: Arc<Journal>,
    metrics: Arc<OracleMetrics>,
    gate: Arc<FeedGate>,
}

impl TickContext {
    /// Fetch once and hand the outcome downstream if the feed is still live.
    async fn tick(&self) {
        let provider = self.source.kind();
        let outcome = self
            .source
            .fetch(&self.key.chain, &self.key.pair)
            .await
            .and_then(|reading| self.check(reading));

        if !self.gate.is_open() {
            debug!(feed = %self.key, "Feed stopped during fetch, discarding result");
            return;
        }

        match outcome {
            Ok(reading) => {
                self.metrics
                    .record_success(provider, &self.key, reading.latency_ms);
                self.router.publish(&reading);
                self.journal.price_feed(&reading);
            }
            Err(err) => {
                self.metrics.record_failure(provider, err.kind());
                self.journal.append(
                    EntryDraft::new(format!(
                        "{provider} fetch failed for {} on {}: {err}",
                        self.key.pair, self.key.chain
                    ))
                    .category(Category::Oracle)
                    .severity(Severity::Error)
                    .source(format!("{provider}-{}", self.key.chain))
                    .details(json!({
                        "kind": err.kind(),
                        "chain": self.key.chain,
                        "pair": self.key.pair.to_string(),
                        "provider": provider.label(),
                        "error": err.to_string(),
                    })),
                );
            }
        }
    }

    /// Reject readings that would break downstream invariants.
    fn check(&self, reading: PriceReading) -> Result<PriceReading, FetchError> {
        let label = reading.provider.label();
        if !reading.price.is_finite() || reading.price < 0.0 {
            return Err(FetchError::upstream(
                label,
                format!("invalid price {}", reading.price),
            ));
        }
        if reading.latency_ms < 0 {
            return Err(FetchError::upstream(label, "negative latency"));
        }
        if reading.key() != self.key {
            return Err(FetchError::upstream(
                label,
                format!("reading for {} delivered to {}", reading.key(), self.key),
            ));
        }
        Ok(reading)
    }
}

/// Owns the active feed tasks.
pub struct PollingScheduler {
    providers: ProviderSet,
    router: Arc<SubscriptionRouter>,
    journal: Arc<Journal>,
    metrics: Arc<OracleMetrics>,
    settings: SchedulerSettings,
    tasks: Mutex<HashMap<FeedKey, FeedTask>>,
    generations: AtomicU64,
}

impl PollingScheduler {
    pub fn new(
        providers: ProviderSet,
        router: Arc<SubscriptionRouter>,
        journal: Arc<Journal>,
        metrics: Arc<OracleMetrics>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            providers,
            router,
            journal,
            metrics,
            settings,
            tasks: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<FeedKey, FeedTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub const fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Install one feed per working-set pair on the config's source chain.
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(skip(self), fields(chain = %config.source_chain, provider = %config.provider))]
    pub fn start(&self, config: &OracleConfig) -> Vec<FeedKey> {
        let keys: Vec<FeedKey> = self
            .settings
            .pairs
            .iter()
            .map(|pair| FeedKey::new(&config.source_chain, pair.clone()))
            .collect();

        for key in &keys {
            self.install(key.clone(), config.provider);
        }

        info!(feeds = keys.len(), "Feeds started");
        keys
    }

    /// Install (or replace) the feed for `key`.
    pub fn install(&self, key: FeedKey, provider: ProviderKind) -> u64 {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let interval = self.settings.tick_interval;
        let gate = Arc::new(FeedGate::new());

        let ctx = Arc::new(TickContext {
            key: key.clone(),
            source: self.providers.select(provider),
            router: Arc::clone(&self.router),
            journal: Arc::clone(&self.journal),
            metrics: Arc::clone(&self.metrics),
            gate: Arc::clone(&gate),
        });

        let mut tasks = self.lock();
        if let Some(previous) = tasks.remove(&key) {
            debug!(feed = %key, generation = previous.generation, "Replacing active feed");
            previous.cancel();
        }

        let handle = tokio::spawn(run_feed(ctx, interval));
        tasks.insert(
            key,
            FeedTask {
                provider,
                interval,
                generation,
                gate,
                handle,
            },
        );
        self.metrics.active_feeds.set(gauge_value(tasks.len()));

        generation
    }

    /// Cancel one feed. Returns whether it was active.
    pub fn stop_feed(&self, key: &FeedKey) -> bool {
        let mut tasks = self.lock();
        let removed = tasks.remove(key);
        self.metrics.active_feeds.set(gauge_value(tasks.len()));
        drop(tasks);

        removed.map(FeedTask::cancel).is_some()
    }

    /// Cancel every feed. Safe to call repeatedly.
    pub fn stop(&self) -> usize {
        let drained: Vec<(FeedKey, FeedTask)> = self.lock().drain().collect();
        self.metrics.active_feeds.set(0);

        let count = drained.len();
        for (key, task) in drained {
            debug!(feed = %key, "Cancelling feed");
            task.cancel();
        }

        if count > 0 {
            info!(feeds = count, "All feeds stopped");
        }
        count
    }

    pub fn is_active(&self, key: &FeedKey) -> bool {
        self.lock().contains_key(key)
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    /// Installed feeds, sorted by key.
    pub fn active_feeds(&self) -> Vec<FeedInfo> {
        let mut feeds: Vec<FeedInfo> = self
            .lock()
            .iter()
            .map(|(key, task)| FeedInfo {
                key: key.clone(),
                provider: task.provider,
                interval: task.interval,
                generation: task.generation,
            })
            .collect();
        feeds.sort_by(|a, b| a.key.cmp(&b.key));
        feeds
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        for (_, task) in self.lock().drain() {
            task.cancel();
        }
    }
}

/// Tick loop of one feed. Aborting it drops the join set, which aborts
/// every in-flight tick too.
async fn run_feed(ctx: Arc<TickContext>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let ctx = Arc::clone(&ctx);
                in_flight.spawn(async move { ctx.tick().await });
            }
            Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = done {
                    if e.is_panic() {
                        warn!(feed = %ctx.key, "Feed tick panicked");
                    }
                }
            }
        }
    }
}

fn gauge_value(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}
