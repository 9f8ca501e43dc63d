//! Domain layer - Core oracle data model.
//!
//! Pure types shared by every other layer: normalized price readings,
//! feed keys, journal entries, the failure taxonomy and dashboard
//! figures. Nothing here performs I/O.

pub mod dashboard;
pub mod errors;
pub mod log_entry;
pub mod oracle;
pub mod reading;

// Re-export core types for convenience
pub use dashboard::DashboardMetrics;
pub use errors::{EngineError, FetchError};
pub use log_entry::{Category, EntryDraft, LogEntry, LogStats, ScanOutcome, Severity};
pub use oracle::{OracleConfig, OracleRequest};
pub use reading::{FeedKey, PriceReading, ProviderKind, TradingPair};
