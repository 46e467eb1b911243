//! In-process condition bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`ConditionBus`] fans every [`ConditionMessage`] out to all subscribers.
//! It is designed to be shared via `Arc<ConditionBus>`.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use watchtower_core::facts::FactValue;
use watchtower_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// ConditionMessage
// ---------------------------------------------------------------------------

/// A notification produced by matching a fact against a condition element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionMessage {
    /// A condition matched.
    Activate {
        condition_id: DbId,
        timestamp: Timestamp,
        value: FactValue,
    },

    /// A stateful condition that was active stopped matching.
    Deactivate {
        condition_id: DbId,
        timestamp: Timestamp,
    },

    /// A measurement fell outside its baseline range. `delta` is the
    /// provided value minus the violated bound.
    OutOfBounds {
        schedule_id: DbId,
        delta: f64,
        timestamp: Timestamp,
    },
}

impl ConditionMessage {
    /// Condition id for activate/deactivate, schedule id for out-of-bounds.
    pub fn subject_id(&self) -> DbId {
        match self {
            Self::Activate { condition_id, .. } | Self::Deactivate { condition_id, .. } => {
                *condition_id
            }
            Self::OutOfBounds { schedule_id, .. } => *schedule_id,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::Activate { timestamp, .. }
            | Self::Deactivate { timestamp, .. }
            | Self::OutOfBounds { timestamp, .. } => *timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// ConditionBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus for condition notifications.
///
/// # Usage
///
/// ```rust
/// use watchtower_events::bus::{ConditionBus, ConditionMessage};
///
/// let bus = ConditionBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(ConditionMessage::Deactivate {
///     condition_id: 1,
///     timestamp: chrono::Utc::now(),
/// });
/// ```
pub struct ConditionBus {
    sender: broadcast::Sender<ConditionMessage>,
}

impl ConditionBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a message to all current subscribers.
    ///
    /// Returns the number of subscribers reached; zero when nobody listens.
    pub fn publish(&self, message: ConditionMessage) -> usize {
        self.sender.send(message).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConditionMessage> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ConditionBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
