//! Condition notifications.
//!
//! This crate is the outbound side of the condition cache:
//!
//! - [`ConditionMessage`] — activate, deactivate and out-of-bounds envelopes.
//! - [`ConditionBus`] — in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`ConditionSink`] — the trait the cache sends notifications through.
//! - [`BusSink`] — a sink that publishes onto a [`ConditionBus`].

pub mod bus;
pub mod sink;

pub use bus::{ConditionBus, ConditionMessage};
pub use sink::{BusSink, ConditionSink, SinkError};
