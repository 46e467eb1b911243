use watchtower_core::baseline::{DEFAULT_HIGH_OOB_FACTOR, DEFAULT_LOW_OOB_FACTOR};

use crate::error::CacheError;

/// Default number of rows requested per page from the definitions source.
pub const DEFAULT_PAGE_SIZE: usize = 250;

/// Condition cache configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Rows per page when loading an agent (default: `250`).
    pub page_size: usize,
    /// Multiplier for a baseline minimum to get the low OOB bound (default: `0.8`).
    pub low_oob_factor: f64,
    /// Multiplier for a baseline maximum to get the high OOB bound (default: `1.25`).
    pub high_oob_factor: f64,
}

impl CacheConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                           | Default |
    /// |-----------------------------------|---------|
    /// | `CONDITION_CACHE_PAGE_SIZE`       | `250`   |
    /// | `CONDITION_CACHE_LOW_OOB_FACTOR`  | `0.8`   |
    /// | `CONDITION_CACHE_HIGH_OOB_FACTOR` | `1.25`  |
    pub fn from_env() -> Result<Self, CacheError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CacheError> {
        let page_size: usize = parse(&lookup, "CONDITION_CACHE_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(CacheError::Config {
                key: "CONDITION_CACHE_PAGE_SIZE",
                value: page_size.to_string(),
            });
        }

        let low_oob_factor = parse_factor(&lookup, "CONDITION_CACHE_LOW_OOB_FACTOR", DEFAULT_LOW_OOB_FACTOR)?;
        let high_oob_factor =
            parse_factor(&lookup, "CONDITION_CACHE_HIGH_OOB_FACTOR", DEFAULT_HIGH_OOB_FACTOR)?;

        Ok(Self {
            page_size,
            low_oob_factor,
            high_oob_factor,
        })
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            low_oob_factor: DEFAULT_LOW_OOB_FACTOR,
            high_oob_factor: DEFAULT_HIGH_OOB_FACTOR,
        }
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, CacheError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CacheError::Config { key, value: raw }),
        None => Ok(default),
    }
}

fn parse_factor(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: f64,
) -> Result<f64, CacheError> {
    let value: f64 = parse(lookup, key, default)?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(CacheError::Config {
            key,
            value: value.to_string(),
        })
    }
}
