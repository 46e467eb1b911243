//! Pure condition-matching logic for the alert condition cache.
//!
//! Nothing in this crate performs I/O or takes locks beyond per-element
//! state. The cache crate owns the index and the concurrency guard.
//!
//! - [`operator`] — comparison operators and the legacy comparator mapping.
//! - [`element`] — condition elements and their matching state machine.
//! - [`baseline`] — baseline statistics and out-of-bounds range arithmetic.
//! - [`definitions`] — records supplied by the definitions store.
//! - [`facts`] — incoming monitoring facts.
//! - [`stats`] — per-call bookkeeping counters.

pub mod baseline;
pub mod definitions;
pub mod element;
pub mod error;
pub mod facts;
pub mod operator;
pub mod stats;
pub mod status;
pub mod types;

pub use element::ConditionElement;
pub use error::CoreError;
pub use operator::{Operator, OperatorKind};
pub use stats::CacheStats;
