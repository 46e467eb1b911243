//! Condition elements: the compiled, in-memory form of an alert condition.
//!
//! Each element binds one operator to one reference value and answers
//! `process(value) -> matched`. What the caller does with a match (activate,
//! deactivate, out-of-bounds notification) lives in the cache crate.
//!
//! Elements are shared by concurrent readers. The `active` flag is atomic and
//! the last-seen value of a stateful element sits behind its own mutex, so
//! `process` only needs `&self`. Reference values that change on baseline
//! refresh are updated through `&mut self` while the cache holds its write
//! lock.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use regex::Regex;
use serde::Serialize;

use crate::baseline::BaselineStat;
use crate::error::CoreError;
use crate::facts::FactValue;
use crate::operator::Operator;
use crate::status::{AvailabilityType, EventSeverity, OperationRequestStatus};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// ElementKind
// ---------------------------------------------------------------------------

/// Which shaped-index family an element belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Measurement,
    Baseline,
    Trait,
    OutOfBounds,
    Availability,
    Operation,
    Event,
}

impl ElementKind {
    fn expected_value(self) -> &'static str {
        match self {
            Self::Measurement | Self::Baseline | Self::OutOfBounds => "numeric",
            Self::Trait => "trait",
            Self::Availability => "availability",
            Self::Operation => "operation",
            Self::Event => "event",
        }
    }
}

// ---------------------------------------------------------------------------
// ConditionElement
// ---------------------------------------------------------------------------

enum ElementBody {
    Numeric {
        reference: f64,
    },
    NumericChange {
        last: Mutex<Option<f64>>,
    },
    Baseline {
        baseline_id: DbId,
        stat: BaselineStat,
        percent: f64,
        reference: Option<f64>,
    },
    Trait {
        reference: Mutex<Option<String>>,
    },
    OutOfBounds {
        reference: f64,
    },
    Availability {
        last: Mutex<Option<AvailabilityType>>,
    },
    Operation {
        reference: OperationRequestStatus,
    },
    Event {
        severity: EventSeverity,
        detail: Option<Regex>,
    },
}

pub struct ConditionElement {
    /// Origin condition id, or the schedule id for out-of-bounds elements.
    id: DbId,
    operator: Operator,
    active: AtomicBool,
    body: ElementBody,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn require(allowed: &[Operator], operator: Operator, what: &str) -> Result<(), CoreError> {
    if allowed.contains(&operator) {
        Ok(())
    } else {
        Err(CoreError::InvalidElement(format!(
            "operator {operator} is not valid for {what} elements"
        )))
    }
}

fn require_finite(value: Option<f64>, what: &str) -> Result<f64, CoreError> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(CoreError::InvalidElement(format!(
            "{what} reference must be finite, got {v}"
        ))),
        None => Err(CoreError::InvalidElement(format!("{what} reference is missing"))),
    }
}

fn compare(operator: Operator, provided: f64, reference: f64) -> bool {
    match operator {
        Operator::LessThan => provided < reference,
        Operator::GreaterThan => provided > reference,
        Operator::Equals => provided == reference,
        Operator::GreaterThanOrEqualTo => provided >= reference,
        Operator::Changes | Operator::ChangesFrom | Operator::ChangesTo => false,
    }
}

impl ConditionElement {
    fn with_body(id: DbId, operator: Operator, body: ElementBody) -> Self {
        Self {
            id,
            operator,
            active: AtomicBool::new(false),
            body,
        }
    }

    /// A measurement threshold (`<`, `>`, `=`) or change-detection element.
    ///
    /// For `CHANGES`, `reference` is the current value of the schedule and may
    /// be absent; the first observation is then recorded without matching.
    pub fn measurement(id: DbId, operator: Operator, reference: Option<f64>) -> Result<Self, CoreError> {
        require(
            &[Operator::LessThan, Operator::GreaterThan, Operator::Equals, Operator::Changes],
            operator,
            "measurement",
        )?;
        let body = if operator == Operator::Changes {
            ElementBody::NumericChange {
                last: Mutex::new(reference.filter(|v| v.is_finite())),
            }
        } else {
            ElementBody::Numeric {
                reference: require_finite(reference, "measurement")?,
            }
        };
        Ok(Self::with_body(id, operator, body))
    }

    /// A baseline-relative measurement element.
    ///
    /// The reference is `percent / 100` of the chosen statistic. A missing
    /// statistic yields an element that never matches until the baseline is
    /// refreshed.
    pub fn baseline(
        id: DbId,
        operator: Operator,
        baseline_id: DbId,
        stat: BaselineStat,
        percent: f64,
        reference: Option<f64>,
    ) -> Result<Self, CoreError> {
        require(
            &[Operator::LessThan, Operator::GreaterThan, Operator::Equals],
            operator,
            "baseline",
        )?;
        if !percent.is_finite() {
            return Err(CoreError::InvalidElement(format!(
                "baseline percentage must be finite, got {percent}"
            )));
        }
        Ok(Self::with_body(
            id,
            operator,
            ElementBody::Baseline {
                baseline_id,
                stat,
                percent,
                reference: reference.filter(|v| v.is_finite()),
            },
        ))
    }

    pub fn trait_value(id: DbId, operator: Operator, reference: Option<String>) -> Result<Self, CoreError> {
        require(&[Operator::Equals, Operator::Changes], operator, "trait")?;
        if operator == Operator::Equals && reference.is_none() {
            return Err(CoreError::InvalidElement("trait reference is missing".into()));
        }
        Ok(Self::with_body(
            id,
            operator,
            ElementBody::Trait {
                reference: Mutex::new(reference),
            },
        ))
    }

    /// One half of an out-of-bounds pair. `id` is the schedule id.
    pub fn out_of_bounds(schedule_id: DbId, operator: Operator, reference: f64) -> Result<Self, CoreError> {
        require(&[Operator::LessThan, Operator::GreaterThan], operator, "out-of-bounds")?;
        let reference = require_finite(Some(reference), "out-of-bounds")?;
        Ok(Self::with_body(
            schedule_id,
            operator,
            ElementBody::OutOfBounds { reference },
        ))
    }

    /// An availability transition relative to `UP`.
    pub fn availability(
        id: DbId,
        operator: Operator,
        current: Option<AvailabilityType>,
    ) -> Result<Self, CoreError> {
        require(&[Operator::ChangesTo, Operator::ChangesFrom], operator, "availability")?;
        Ok(Self::with_body(
            id,
            operator,
            ElementBody::Availability {
                last: Mutex::new(current),
            },
        ))
    }

    pub fn operation(id: DbId, operator: Operator, reference: OperationRequestStatus) -> Result<Self, CoreError> {
        require(&[Operator::Equals], operator, "operation")?;
        Ok(Self::with_body(id, operator, ElementBody::Operation { reference }))
    }

    /// An event element matching at least `severity`, optionally filtered by
    /// a regular expression searched for in the event detail.
    pub fn event(
        id: DbId,
        operator: Operator,
        severity: EventSeverity,
        detail: Option<&str>,
    ) -> Result<Self, CoreError> {
        require(&[Operator::GreaterThanOrEqualTo], operator, "event")?;
        let detail = match detail.map(str::trim).filter(|d| !d.is_empty()) {
            Some(pattern) => Some(Regex::new(pattern).map_err(|e| {
                CoreError::InvalidElement(format!("invalid event detail pattern '{pattern}': {e}"))
            })?),
            None => None,
        };
        Ok(Self::with_body(id, operator, ElementBody::Event { severity, detail }))
    }

    // -- accessors -----------------------------------------------------------

    pub fn id(&self) -> DbId {
        self.id
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn kind(&self) -> ElementKind {
        match &self.body {
            ElementBody::Numeric { .. } | ElementBody::NumericChange { .. } => ElementKind::Measurement,
            ElementBody::Baseline { .. } => ElementKind::Baseline,
            ElementBody::Trait { .. } => ElementKind::Trait,
            ElementBody::OutOfBounds { .. } => ElementKind::OutOfBounds,
            ElementBody::Availability { .. } => ElementKind::Availability,
            ElementBody::Operation { .. } => ElementKind::Operation,
            ElementBody::Event { .. } => ElementKind::Event,
        }
    }

    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self.body, ElementBody::OutOfBounds { .. })
    }

    /// The numeric reference of an out-of-bounds element.
    pub fn out_of_bounds_reference(&self) -> Option<f64> {
        match self.body {
            ElementBody::OutOfBounds { reference } => Some(reference),
            _ => None,
        }
    }

    /// The baseline a baseline element was derived from.
    pub fn baseline_id(&self) -> Option<DbId> {
        match self.body {
            ElementBody::Baseline { baseline_id, .. } => Some(baseline_id),
            _ => None,
        }
    }

    // -- active flag ---------------------------------------------------------

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn activate(&self) {
        self.active.store(true, Ordering::Release);
    }

    /// Clear the active flag, returning whether it was set.
    ///
    /// Concurrent callers race on the swap so exactly one of them observes
    /// `true` and sends the deactivate notification.
    pub fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }

    // -- matching ------------------------------------------------------------

    /// Match a provided value against this element.
    ///
    /// Stateful elements record the value as their new last-seen value.
    /// Non-finite numeric values never match and are not recorded.
    pub fn process(&self, value: &FactValue) -> Result<bool, CoreError> {
        let matched = match (&self.body, value) {
            (ElementBody::Numeric { reference }, FactValue::Numeric(v))
            | (ElementBody::OutOfBounds { reference }, FactValue::Numeric(v)) => {
                v.is_finite() && compare(self.operator, *v, *reference)
            }
            (ElementBody::Baseline { reference, .. }, FactValue::Numeric(v)) => match reference {
                Some(reference) => v.is_finite() && compare(self.operator, *v, *reference),
                None => false,
            },
            (ElementBody::NumericChange { last }, FactValue::Numeric(v)) => {
                if !v.is_finite() {
                    return Ok(false);
                }
                let mut last = lock(last);
                let changed = matches!(*last, Some(prev) if prev != *v);
                *last = Some(*v);
                changed
            }
            (ElementBody::Trait { reference }, FactValue::Trait(v)) => {
                let mut reference = lock(reference);
                match self.operator {
                    Operator::Changes => {
                        let changed = matches!(reference.as_deref(), Some(prev) if prev != v.as_str());
                        if reference.as_deref() != Some(v.as_str()) {
                            *reference = Some(v.clone());
                        }
                        changed
                    }
                    _ => reference.as_deref() == Some(v.as_str()),
                }
            }
            (ElementBody::Availability { last }, FactValue::Availability(new)) => {
                let mut last = lock(last);
                let was_up = *last == Some(AvailabilityType::Up);
                let is_up = *new == AvailabilityType::Up;
                *last = Some(*new);
                match self.operator {
                    Operator::ChangesTo => is_up && !was_up,
                    Operator::ChangesFrom => was_up && !is_up,
                    _ => false,
                }
            }
            (ElementBody::Operation { reference }, FactValue::Operation(status)) => status == reference,
            (ElementBody::Event { severity, detail }, FactValue::Event { severity: provided, detail: text }) => {
                provided >= severity && detail.as_ref().map_or(true, |re| re.is_match(text))
            }
            (_, other) => {
                return Err(CoreError::ValueMismatch {
                    expected: self.kind().expected_value(),
                    found: other.kind_name(),
                })
            }
        };
        Ok(matched)
    }

    // -- reference refresh (caller holds exclusive access) --------------------

    /// Recompute a baseline element's reference from fresh statistics.
    ///
    /// Returns `false` if this is not a baseline element.
    pub fn refresh_baseline(&mut self, min: Option<f64>, mean: Option<f64>, max: Option<f64>) -> bool {
        match &mut self.body {
            ElementBody::Baseline {
                stat,
                percent,
                reference,
                ..
            } => {
                *reference = stat.calculated_value(*percent, min, mean, max);
                true
            }
            _ => false,
        }
    }

    /// Replace an out-of-bounds element's reference.
    ///
    /// Returns `false` if this is not an out-of-bounds element or the value
    /// is non-finite.
    pub fn set_out_of_bounds_reference(&mut self, value: f64) -> bool {
        match &mut self.body {
            ElementBody::OutOfBounds { reference } if value.is_finite() => {
                *reference = value;
                true
            }
            _ => false,
        }
    }

    // -- introspection -------------------------------------------------------

    fn reference_text(&self) -> Option<String> {
        match &self.body {
            ElementBody::Numeric { reference } | ElementBody::OutOfBounds { reference } => {
                Some(reference.to_string())
            }
            ElementBody::NumericChange { last } => (*lock(last)).map(|v| v.to_string()),
            ElementBody::Baseline {
                stat,
                percent,
                reference,
                ..
            } => Some(match reference {
                Some(v) => format!("{v} ({percent}% of {stat})"),
                None => format!("unset ({percent}% of {stat})"),
            }),
            ElementBody::Trait { reference } => lock(reference).clone(),
            ElementBody::Availability { .. } => Some(AvailabilityType::Up.to_string()),
            ElementBody::Operation { reference } => Some(reference.to_string()),
            ElementBody::Event { severity, detail } => Some(match detail {
                Some(re) => format!("{severity} /{}/", re.as_str()),
                None => severity.to_string(),
            }),
        }
    }

    pub fn snapshot(&self) -> ElementSnapshot {
        ElementSnapshot {
            id: self.id,
            kind: self.kind(),
            operator: self.operator,
            reference: self.reference_text(),
            active: self.is_active(),
        }
    }
}

impl fmt::Debug for ConditionElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionElement")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("operator", &self.operator)
            .field("reference", &self.reference_text())
            .field("active", &self.is_active())
            .finish()
    }
}

impl fmt::Display for ConditionElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}[id={}, operator={}, reference={}, active={}]",
            self.kind(),
            self.id,
            self.operator,
            self.reference_text().as_deref().unwrap_or("none"),
            self.is_active()
        )
    }
}

/// Point-in-time, owned view of an element for introspection and tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementSnapshot {
    pub id: DbId,
    pub kind: ElementKind,
    pub operator: Operator,
    pub reference: Option<String>,
    pub active: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
