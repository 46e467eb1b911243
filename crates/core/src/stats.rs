//! Per-call bookkeeping counters.

use std::fmt;
use std::time::{Duration, Instant};

/// Counters for a single load, unload, update or check call.
///
/// A fresh value is created per call and returned to the caller; the cache
/// never shares one across calls.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub matched: usize,
    pub skipped: usize,
    pub errors: usize,
    started: Instant,
}

impl CacheStats {
    pub fn new() -> Self {
        Self {
            created: 0,
            updated: 0,
            deleted: 0,
            matched: 0,
            skipped: 0,
            errors: 0,
            started: Instant::now(),
        }
    }

    /// Time since the stats were created.
    pub fn age(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} updated={} deleted={} matched={} skipped={} errors={} age={}ms",
            self.created,
            self.updated,
            self.deleted,
            self.matched,
            self.skipped,
            self.errors,
            self.age().as_millis()
        )
    }
}
