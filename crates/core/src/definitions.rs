//! Records supplied by the definitions store.
//!
//! A [`ConditionComposite`] is one persisted alert condition joined with the
//! lookup keys and current values the cache needs to compile it. These are
//! plain data; compilation into elements happens in the cache crate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::AvailabilityType;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// ConditionCategory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConditionCategory {
    Baseline,
    Change,
    Trait,
    Availability,
    Control,
    Threshold,
    Event,
}

impl ConditionCategory {
    /// Categories the cache loads, in load order.
    pub const SUPPORTED: [ConditionCategory; 7] = [
        Self::Baseline,
        Self::Change,
        Self::Trait,
        Self::Availability,
        Self::Control,
        Self::Threshold,
        Self::Event,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "BASELINE",
            Self::Change => "CHANGE",
            Self::Trait => "TRAIT",
            Self::Availability => "AVAILABILITY",
            Self::Control => "CONTROL",
            Self::Threshold => "THRESHOLD",
            Self::Event => "EVENT",
        }
    }
}

impl fmt::Display for ConditionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::SUPPORTED
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::InvalidElement(format!("unknown condition category '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// The persisted fields of an alert condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionRecord {
    pub id: DbId,
    pub category: ConditionCategory,
    /// `"<"`, `">"` or `"="`; only meaningful for threshold and baseline.
    pub comparator: Option<String>,
    /// Category-specific option: baseline statistic, availability direction,
    /// operation status, or event detail pattern.
    pub option: Option<String>,
    /// Event conditions store the minimum severity here.
    pub name: Option<String>,
    /// Threshold value, or the percentage for baseline conditions.
    pub threshold: Option<f64>,
}

/// Where a condition attaches and the state it starts from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompositeTarget {
    Threshold {
        schedule_id: DbId,
    },
    Baseline {
        schedule_id: DbId,
        baseline_id: DbId,
        min: Option<f64>,
        mean: Option<f64>,
        max: Option<f64>,
    },
    Change {
        schedule_id: DbId,
        current_value: Option<f64>,
    },
    Trait {
        schedule_id: DbId,
        current_value: Option<String>,
    },
    Availability {
        resource_id: DbId,
        current: Option<AvailabilityType>,
    },
    Control {
        resource_id: DbId,
        operation_definition_id: DbId,
    },
    Event {
        resource_id: DbId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionComposite {
    pub condition: ConditionRecord,
    pub target: CompositeTarget,
}

/// An alert definition with the composites of every condition it owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertDefinitionRecord {
    pub id: DbId,
    pub agent_id: DbId,
    pub conditions: Vec<ConditionComposite>,
}

/// Lifecycle change of an alert definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionEvent {
    Created,
    Enabled,
    Deleted,
    Disabled,
}

// ---------------------------------------------------------------------------
// Baselines
// ---------------------------------------------------------------------------

/// A computed measurement baseline for one schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineRecord {
    pub baseline_id: DbId,
    /// Agent monitoring the schedule's resource.
    pub agent_id: DbId,
    pub schedule_id: DbId,
    pub min: Option<f64>,
    pub mean: Option<f64>,
    pub max: Option<f64>,
}

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based page number.
    pub number: usize,
    pub size: usize,
}

impl PageRequest {
    pub fn first(size: usize) -> Self {
        Self { number: 0, size }
    }

    pub fn next(self) -> Self {
        Self {
            number: self.number + 1,
            size: self.size,
        }
    }
}

/// One page of results plus the total row count across all pages.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
