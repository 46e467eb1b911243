//! Baseline arithmetic: user-authored baseline conditions and the
//! out-of-bounds (OOB) range derived from a baseline's min/max.
//!
//! Pure logic. Factors are passed in by the caller, which reads them from
//! configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default multiplier applied to a baseline minimum to get the low OOB bound.
pub const DEFAULT_LOW_OOB_FACTOR: f64 = 0.8;

/// Default multiplier applied to a baseline maximum to get the high OOB bound.
pub const DEFAULT_HIGH_OOB_FACTOR: f64 = 1.25;

/// `true` if the value is present and finite.
pub fn is_valid_double(value: Option<f64>) -> bool {
    matches!(value, Some(v) if v.is_finite())
}

// ---------------------------------------------------------------------------
// BaselineStat
// ---------------------------------------------------------------------------

/// Which baseline statistic a baseline condition is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineStat {
    Min,
    Mean,
    Max,
}

impl BaselineStat {
    pub fn select(self, min: Option<f64>, mean: Option<f64>, max: Option<f64>) -> Option<f64> {
        match self {
            Self::Min => min,
            Self::Mean => mean,
            Self::Max => max,
        }
    }

    /// Reference value for a baseline condition: `percent / 100 * statistic`.
    ///
    /// Returns `None` when the statistic is missing or non-finite; an
    /// element built from `None` never matches.
    pub fn calculated_value(
        self,
        percent: f64,
        min: Option<f64>,
        mean: Option<f64>,
        max: Option<f64>,
    ) -> Option<f64> {
        let stat = self.select(min, mean, max).filter(|v| v.is_finite())?;
        let value = percent / 100.0 * stat;
        value.is_finite().then_some(value)
    }
}

impl FromStr for BaselineStat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "min" => Ok(Self::Min),
            "mean" => Ok(Self::Mean),
            "max" => Ok(Self::Max),
            other => Err(CoreError::InvalidElement(format!(
                "unrecognized baseline statistic '{other}'"
            ))),
        }
    }
}

impl fmt::Display for BaselineStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Min => "min",
            Self::Mean => "mean",
            Self::Max => "max",
        })
    }
}

// ---------------------------------------------------------------------------
// OutOfBoundsRange
// ---------------------------------------------------------------------------

/// The `(low, high)` pair an OOB element pair is built from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutOfBoundsRange {
    pub low: f64,
    pub high: f64,
}

impl OutOfBoundsRange {
    /// Derive the range from a baseline.
    ///
    /// For negative baselines the low factor can produce a larger bound than
    /// the high factor, so the pair is swapped to keep `low <= high`.
    /// Returns `None` if either bound input is missing or non-finite.
    pub fn from_baseline(
        min: Option<f64>,
        max: Option<f64>,
        low_factor: f64,
        high_factor: f64,
    ) -> Option<Self> {
        if !is_valid_double(min) || !is_valid_double(max) {
            return None;
        }
        let (min, max) = (min?, max?);

        let mut low = min * low_factor;
        let mut high = max * high_factor;
        if low > high {
            std::mem::swap(&mut low, &mut high);
        }
        Some(Self { low, high })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
