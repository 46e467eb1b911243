//! Incoming monitoring facts and the value shape elements match against.

use serde::{Deserialize, Serialize};

use crate::status::{AvailabilityType, EventSeverity, OperationRequestStatus};
use crate::types::{DbId, Timestamp};

/// The value carried by a fact, as seen by a condition element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FactValue {
    Numeric(f64),
    Trait(String),
    Availability(AvailabilityType),
    Operation(OperationRequestStatus),
    Event {
        severity: EventSeverity,
        detail: String,
    },
}

impl FactValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Numeric(_) => "numeric",
            Self::Trait(_) => "trait",
            Self::Availability(_) => "availability",
            Self::Operation(_) => "operation",
            Self::Event { .. } => "event",
        }
    }
}

/// A numeric measurement for one schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericFact {
    pub schedule_id: DbId,
    pub timestamp: Timestamp,
    pub value: f64,
}

/// A string-valued trait measurement for one schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitFact {
    pub schedule_id: DbId,
    pub timestamp: Timestamp,
    pub value: String,
}

/// A resource availability change. `Unknown` stands in for a suspect agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityFact {
    pub resource_id: DbId,
    pub timestamp: Timestamp,
    pub availability: AvailabilityType,
}

/// An operation-history update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationFact {
    pub resource_id: DbId,
    pub operation_definition_id: DbId,
    pub timestamp: Timestamp,
    pub status: OperationRequestStatus,
}

/// A resource event. The resource id comes from the event source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFact {
    pub timestamp: Timestamp,
    pub severity: EventSeverity,
    pub detail: String,
}

impl NumericFact {
    pub fn fact_value(&self) -> FactValue {
        FactValue::Numeric(self.value)
    }
}

impl TraitFact {
    pub fn fact_value(&self) -> FactValue {
        FactValue::Trait(self.value.clone())
    }
}

impl AvailabilityFact {
    pub fn fact_value(&self) -> FactValue {
        FactValue::Availability(self.availability)
    }
}

impl OperationFact {
    pub fn fact_value(&self) -> FactValue {
        FactValue::Operation(self.status)
    }
}

impl EventFact {
    pub fn fact_value(&self) -> FactValue {
        FactValue::Event {
            severity: self.severity,
            detail: self.detail.clone(),
        }
    }
}
