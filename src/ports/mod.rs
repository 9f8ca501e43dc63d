//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `PriceSource`: One normalized price reading per call

pub mod price_source;

pub use price_source::{PriceSource, ProviderSet};
