//! Use Cases Layer - Application Logic
//!
//! Orchestrates domain types with the price-source port to implement
//! the engine's workflows.
//!
//! Use cases:
//! - `Journal`: Bounded, observable activity log
//! - `SubscriptionRouter`: Per-topic reading fanout
//! - `PollingScheduler`: One periodic fetch task per feed key
//! - `OracleEngine`: Facade composing the above with the registry

pub mod engine;
pub mod journal;
pub mod router;
pub mod scheduler;

pub use engine::OracleEngine;
pub use journal::Journal;
pub use router::SubscriptionRouter;
pub use scheduler::PollingScheduler;
