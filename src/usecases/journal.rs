//! Journal - Bounded Activity Log
//!
//! Append-only, newest-first store of structured activity entries with a
//! hard capacity. Every change pushes the full ordered snapshot to all
//! subscribers; a new subscriber is replayed the current snapshot before
//! it sees any live update.
//!
//! Snapshots are queued under the state lock and delivered after it is
//! released, by whichever caller finds the queue idle. Every subscriber
//! sees snapshots in append order, and listeners may call back into the
//! journal: an append made from inside a listener is queued and delivered
//! once the current round finishes.

use std::collections::VecDeque;
use std::fmt::Display;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Local;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{
    Category, EntryDraft, LogEntry, LogStats, OracleConfig, PriceReading, ScanOutcome, Severity,
};

/// Default number of entries retained.
pub const DEFAULT_CAPACITY: usize = 100;

/// Receives the full newest-first snapshot on every change.
pub type SnapshotListener = Arc<dyn Fn(&[LogEntry]) + Send + Sync>;

/// One queued notification: a snapshot and the listeners registered when
/// it was taken.
struct Delivery {
    targets: Vec<SnapshotListener>,
    snapshot: Arc<[LogEntry]>,
}

struct JournalState {
    /// Newest entry at the front.
    entries: VecDeque<LogEntry>,
    listeners: Vec<SnapshotListener>,
    pending: VecDeque<Delivery>,
    draining: bool,
}

impl JournalState {
    fn snapshot(&self) -> Arc<[LogEntry]> {
        self.entries.iter().cloned().collect()
    }

    fn queue_all(&mut self) {
        let delivery = Delivery {
            targets: self.listeners.clone(),
            snapshot: self.snapshot(),
        };
        self.pending.push_back(delivery);
    }
}

/// Capacity-bounded activity journal.
pub struct Journal {
    capacity: usize,
    state: Mutex<JournalState>,
}

impl Journal {
    /// Create an empty journal holding at most `capacity` entries (min 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(JournalState {
                entries: VecDeque::with_capacity(capacity),
                listeners: Vec::new(),
                pending: VecDeque::new(),
                draining: false,
            }),
        }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, JournalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stamp, insert at the front, evict from the tail, notify.
    pub fn append(&self, draft: EntryDraft) -> LogEntry {
        let entry = LogEntry {
            id: Uuid::new_v4().to_string(),
            message: draft.message,
            severity: draft.severity,
            category: draft.category,
            source: draft.source,
            details: draft.details,
            created_at: Local::now().format("%H:%M:%S").to_string(),
        };

        mirror(&entry);

        let mut state = self.lock();
        state.entries.push_front(entry.clone());
        state.entries.truncate(self.capacity);
        state.queue_all();
        self.drain(state);

        entry
    }

    /// Register `listener`, replaying the current snapshot to it first.
    pub fn subscribe(&self, listener: SnapshotListener) {
        let mut state = self.lock();
        let replay = Delivery {
            targets: vec![Arc::clone(&listener)],
            snapshot: state.snapshot(),
        };
        state.listeners.push(listener);
        state.pending.push_back(replay);
        self.drain(state);
    }

    /// Remove `listener` by identity. Unknown listeners are ignored.
    pub fn unsubscribe(&self, listener: &SnapshotListener) {
        self.lock()
            .listeners
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Drop every entry and push the empty snapshot.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.queue_all();
        self.drain(state);
    }

    /// Deliver queued snapshots with the lock released. A caller that finds
    /// another drain in progress leaves its delivery to that drain.
    fn drain<'a>(&'a self, mut state: MutexGuard<'a, JournalState>) {
        if state.draining {
            return;
        }
        state.draining = true;
        while let Some(delivery) = state.pending.pop_front() {
            drop(state);
            for listener in &delivery.targets {
                deliver(listener, &delivery.snapshot);
            }
            state = self.lock();
        }
        state.draining = false;
    }

    // ── Queries ─────────────────────────────────────────────

    /// All entries, newest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn by_category(&self, category: Category) -> Vec<LogEntry> {
        self.filtered(|e| e.category == category)
    }

    pub fn by_severity(&self, severity: Severity) -> Vec<LogEntry> {
        self.filtered(|e| e.severity == severity)
    }

    /// The `count` newest entries.
    pub fn recent(&self, count: usize) -> Vec<LogEntry> {
        self.lock().entries.iter().take(count).cloned().collect()
    }

    pub fn stats(&self) -> LogStats {
        LogStats::from_entries(self.lock().entries.iter())
    }

    fn filtered(&self, pred: impl Fn(&LogEntry) -> bool) -> Vec<LogEntry> {
        self.lock()
            .entries
            .iter()
            .filter(|e| pred(e))
            .cloned()
            .collect()
    }

    // ── Category helpers ────────────────────────────────────

    /// Append a plain entry.
    pub fn event(
        &self,
        category: Category,
        severity: Severity,
        message: impl Into<String>,
        source: Option<&str>,
    ) -> LogEntry {
        let mut draft = EntryDraft::new(message).category(category).severity(severity);
        if let Some(source) = source {
            draft = draft.source(source);
        }
        self.append(draft)
    }

    pub fn oracle_event(&self, message: impl Into<String>, severity: Severity, source: &str) -> LogEntry {
        self.event(Category::Oracle, severity, message, Some(source))
    }

    pub fn security_event(&self, message: impl Into<String>, severity: Severity, source: &str) -> LogEntry {
        self.event(Category::Security, severity, message, Some(source))
    }

    pub fn performance_event(&self, message: impl Into<String>, severity: Severity, source: &str) -> LogEntry {
        self.event(Category::Performance, severity, message, Some(source))
    }

    pub fn blockchain_event(&self, message: impl Into<String>, severity: Severity, source: &str) -> LogEntry {
        self.event(Category::Blockchain, severity, message, Some(source))
    }

    pub fn system_event(&self, message: impl Into<String>, severity: Severity, source: &str) -> LogEntry {
        self.event(Category::System, severity, message, Some(source))
    }

    // ── Domain helpers ──────────────────────────────────────

    /// Successful price update.
    pub fn price_feed(&self, reading: &PriceReading) -> LogEntry {
        let provider = reading.provider.display_name();
        self.append(
            EntryDraft::new(format!(
                "Price updated: {} = ${:.2} ({provider} via {})",
                reading.pair, reading.price, reading.chain
            ))
            .category(Category::Oracle)
            .severity(Severity::Success)
            .source(format!("{provider}-{}", reading.chain))
            .details(json!({
                "chain": reading.chain,
                "pair": reading.pair.to_string(),
                "price": reading.price,
                "provider": reading.provider.label(),
                "latency": format!("{}ms", reading.latency_ms),
                "roundId": reading.round_id,
            })),
        )
    }

    /// Chain connect / disconnect.
    pub fn connection_status(
        &self,
        chain: &str,
        connected: bool,
        details: Option<serde_json::Value>,
    ) -> LogEntry {
        let (status, severity) = if connected {
            ("connected", Severity::Success)
        } else {
            ("disconnected", Severity::Error)
        };
        let mut draft = EntryDraft::new(format!("{chain} network {status}"))
            .category(Category::Blockchain)
            .severity(severity)
            .source(chain);
        if let Some(details) = details {
            draft = draft.details(details);
        }
        self.append(draft)
    }

    pub fn oracle_start(&self, config: &OracleConfig) -> LogEntry {
        self.append(
            EntryDraft::new(format!(
                "Oracle started: {} monitoring {} ({} -> {})",
                config.provider, config.data_kind, config.source_chain, config.target_chain
            ))
            .category(Category::Oracle)
            .severity(Severity::Success)
            .source(config.provider.display_name())
            .details(json!(config)),
        )
    }

    pub fn oracle_stop(&self, reason: Option<&str>) -> LogEntry {
        let message = reason.map_or_else(
            || "Oracle stopped by user".to_string(),
            |r| format!("Oracle stopped: {r}"),
        );
        self.oracle_event(message, Severity::Warning, "system")
    }

    /// Error entry carrying the underlying cause, if any.
    pub fn error(&self, message: impl Into<String>, cause: Option<&dyn Display>, category: Category) -> LogEntry {
        let mut draft = EntryDraft::new(message)
            .category(category)
            .severity(Severity::Error)
            .source("error-handler");
        if let Some(cause) = cause {
            draft = draft.details(json!({ "error": cause.to_string() }));
        }
        self.append(draft)
    }

    pub fn benchmark_start(&self) -> LogEntry {
        self.performance_event(
            "Starting cross-chain benchmark tests...",
            Severity::Info,
            "benchmark",
        )
    }

    pub fn benchmark_result(&self, chain: &str, latency_ms: i64, block_number: u64, gas_price_gwei: f64) -> LogEntry {
        self.append(
            EntryDraft::new(format!(
                "Benchmark result for {chain}: {latency_ms}ms latency, block {block_number}, {gas_price_gwei:.2} gwei"
            ))
            .category(Category::Performance)
            .severity(Severity::Success)
            .source("benchmark")
            .details(json!({
                "chain": chain,
                "latency": latency_ms,
                "blockNumber": block_number,
                "gasPrice": gas_price_gwei,
            })),
        )
    }

    pub fn security_scan(&self, check: &str, outcome: ScanOutcome, details: Option<serde_json::Value>) -> LogEntry {
        let mut draft = EntryDraft::new(format!("Security scan: {check} - {}", outcome.as_str()))
            .category(Category::Security)
            .severity(outcome.severity())
            .source("security-scanner");
        if let Some(details) = details {
            draft = draft.details(details);
        }
        self.append(draft)
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Call one listener, containing any panic so later listeners still run.
fn deliver(listener: &SnapshotListener, snapshot: &[LogEntry]) {
    if catch_unwind(AssertUnwindSafe(|| listener(snapshot))).is_err() {
        warn!("Journal listener panicked; continuing delivery");
    }
}

/// Mirror an entry into the tracing pipeline.
fn mirror(entry: &LogEntry) {
    let source = entry.source.as_deref().unwrap_or("-");
    match entry.severity {
        Severity::Error => error!(category = %entry.category, source, "{}", entry.message),
        Severity::Warning => warn!(category = %entry.category, source, "{}", entry.message),
        Severity::Success | Severity::Info => {
            info!(category = %entry.category, source, severity = %entry.severity, "{}", entry.message);
        }
    }
}
