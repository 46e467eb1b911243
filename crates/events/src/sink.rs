//! The notification sink the condition cache reports matches through.
//!
//! [`ConditionSink`] is the boundary to whatever fires and clears alerts.
//! [`BusSink`] is the in-process implementation: it turns each call into a
//! [`ConditionMessage`] on a [`ConditionBus`].

use std::sync::Arc;

use async_trait::async_trait;
use watchtower_core::facts::FactValue;
use watchtower_core::types::{DbId, Timestamp};

use crate::bus::{ConditionBus, ConditionMessage};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Nobody is subscribed to receive the notification.
    #[error("No subscribers for condition notifications")]
    NoSubscribers,

    /// The downstream consumer refused the notification.
    #[error("Notification rejected: {0}")]
    Rejected(String),
}

// ---------------------------------------------------------------------------
// ConditionSink
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ConditionSink: Send + Sync {
    /// A condition matched.
    async fn send_activate(
        &self,
        condition_id: DbId,
        timestamp: Timestamp,
        value: &FactValue,
    ) -> Result<(), SinkError>;

    /// A stateful condition that was active stopped matching.
    async fn send_deactivate(&self, condition_id: DbId, timestamp: Timestamp) -> Result<(), SinkError>;

    /// A measurement crossed its out-of-bounds range by `delta`.
    async fn send_out_of_bounds(
        &self,
        schedule_id: DbId,
        delta: f64,
        timestamp: Timestamp,
    ) -> Result<(), SinkError>;
}

// ---------------------------------------------------------------------------
// BusSink
// ---------------------------------------------------------------------------

/// Publishes notifications onto a shared [`ConditionBus`].
#[derive(Clone)]
pub struct BusSink {
    bus: Arc<ConditionBus>,
}

impl BusSink {
    pub fn new(bus: Arc<ConditionBus>) -> Self {
        Self { bus }
    }

    fn deliver(&self, message: ConditionMessage) -> Result<(), SinkError> {
        match self.bus.publish(message) {
            0 => Err(SinkError::NoSubscribers),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ConditionSink for BusSink {
    async fn send_activate(
        &self,
        condition_id: DbId,
        timestamp: Timestamp,
        value: &FactValue,
    ) -> Result<(), SinkError> {
        tracing::trace!(condition_id, "Condition activated");
        self.deliver(ConditionMessage::Activate {
            condition_id,
            timestamp,
            value: value.clone(),
        })
    }

    async fn send_deactivate(&self, condition_id: DbId, timestamp: Timestamp) -> Result<(), SinkError> {
        tracing::trace!(condition_id, "Condition deactivated");
        self.deliver(ConditionMessage::Deactivate {
            condition_id,
            timestamp,
        })
    }

    async fn send_out_of_bounds(
        &self,
        schedule_id: DbId,
        delta: f64,
        timestamp: Timestamp,
    ) -> Result<(), SinkError> {
        tracing::trace!(schedule_id, delta, "Measurement out of bounds");
        self.deliver(ConditionMessage::OutOfBounds {
            schedule_id,
            delta,
            timestamp,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    #[tokio::test]
    async fn bus_sink_publishes_activate() {
        let bus = Arc::new(ConditionBus::default());
        let mut rx = bus.subscribe();
        let sink = BusSink::new(Arc::clone(&bus));

        sink.send_activate(7, Utc::now(), &FactValue::Trait("v2".into()))
            .await
            .expect("send should succeed with a subscriber");

        let msg = rx.recv().await.unwrap();
        assert_matches!(
            msg,
            ConditionMessage::Activate { condition_id: 7, value: FactValue::Trait(ref v), .. } if v == "v2"
        );
    }

    #[tokio::test]
    async fn bus_sink_without_subscribers_errors() {
        let sink = BusSink::new(Arc::new(ConditionBus::default()));
        let result = sink.send_deactivate(1, Utc::now()).await;
        assert_matches!(result, Err(SinkError::NoSubscribers));
    }

    #[test]
    fn sink_error_display() {
        assert_eq!(
            SinkError::Rejected("queue full".into()).to_string(),
            "Notification rejected: queue full"
        );
        assert_eq!(
            SinkError::NoSubscribers.to_string(),
            "No subscribers for condition notifications"
        );
    }
}
