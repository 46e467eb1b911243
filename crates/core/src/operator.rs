//! Comparison operators bound to condition elements.
//!
//! Persisted conditions carry a free-form comparator string (`"<"`, `">"`,
//! `"="`) plus category-specific overrides. [`resolve_operator`] turns that
//! pair into an [`Operator`]; the mapping is kept exactly as the definitions
//! store expects and is not meant to grow.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::definitions::ConditionCategory;
use crate::error::CoreError;
use crate::status::AvailabilityType;

/// Whether an operator remembers prior observations.
///
/// Stateful operators track the element's `active` flag and can emit
/// deactivate notifications. Stateless operators only ever activate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Stateless,
    Stateful,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Equals,
    LessThan,
    GreaterThan,
    GreaterThanOrEqualTo,
    Changes,
    ChangesFrom,
    ChangesTo,
}

impl Operator {
    pub fn kind(self) -> OperatorKind {
        match self {
            Self::Equals | Self::LessThan | Self::GreaterThan | Self::GreaterThanOrEqualTo => {
                OperatorKind::Stateless
            }
            Self::Changes | Self::ChangesFrom | Self::ChangesTo => OperatorKind::Stateful,
        }
    }

    pub fn is_stateful(self) -> bool {
        self.kind() == OperatorKind::Stateful
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "EQUALS",
            Self::LessThan => "LESS_THAN",
            Self::GreaterThan => "GREATER_THAN",
            Self::GreaterThanOrEqualTo => "GREATER_THAN_OR_EQUAL_TO",
            Self::Changes => "CHANGES",
            Self::ChangesFrom => "CHANGES_FROM",
            Self::ChangesTo => "CHANGES_TO",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a persisted (category, comparator, option) triple to an operator.
///
/// | Category       | Result                                             |
/// |----------------|----------------------------------------------------|
/// | `CONTROL`      | `EQUALS`                                           |
/// | `EVENT`        | `GREATER_THAN_OR_EQUAL_TO`                         |
/// | `CHANGE`       | `CHANGES`                                          |
/// | `TRAIT`        | `CHANGES`                                          |
/// | `AVAILABILITY` | option `DOWN` → `CHANGES_FROM`, `UP` → `CHANGES_TO` |
/// | otherwise      | comparator `<`, `>`, `=`                           |
///
/// Availability conditions are stored relative to `UP` in both directions so
/// that a resource coming back from an unknown state still matches.
pub fn resolve_operator(
    category: ConditionCategory,
    comparator: Option<&str>,
    option: Option<&str>,
) -> Result<Operator, CoreError> {
    match category {
        ConditionCategory::Control => return Ok(Operator::Equals),
        ConditionCategory::Event => return Ok(Operator::GreaterThanOrEqualTo),
        ConditionCategory::Change | ConditionCategory::Trait => return Ok(Operator::Changes),
        ConditionCategory::Availability => {
            let option = option.unwrap_or_default();
            return match option.parse::<AvailabilityType>() {
                Ok(AvailabilityType::Down) => Ok(Operator::ChangesFrom),
                Ok(AvailabilityType::Up) => Ok(Operator::ChangesTo),
                _ => Err(CoreError::UnsupportedOperator(format!(
                    "invalid availability option '{option}'"
                ))),
            };
        }
        ConditionCategory::Threshold | ConditionCategory::Baseline => {}
    }

    match comparator.map(str::trim) {
        Some("<") => Ok(Operator::LessThan),
        Some(">") => Ok(Operator::GreaterThan),
        Some("=") => Ok(Operator::Equals),
        other => Err(CoreError::UnsupportedOperator(format!(
            "comparator '{}' is not supported for {category}",
            other.unwrap_or_default()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
