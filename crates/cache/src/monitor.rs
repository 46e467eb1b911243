//! Process-wide counters for the condition cache.
//!
//! Counts are cumulative since the cache was built or last cleared. Element
//! counts are not tracked here; [`MonitorSnapshot`] takes them from the store
//! when the snapshot is built.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::index::CacheName;

/// Which `check_*` entry point a fact came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FactFamily {
    Measurement,
    Trait,
    Availability,
    Operation,
    Event,
}

impl FactFamily {
    const ALL: [FactFamily; 5] = [
        Self::Measurement,
        Self::Trait,
        Self::Availability,
        Self::Operation,
        Self::Event,
    ];

    fn slot(self) -> usize {
        match self {
            Self::Measurement => 0,
            Self::Trait => 1,
            Self::Availability => 2,
            Self::Operation => 3,
            Self::Event => 4,
        }
    }
}

#[derive(Debug, Default)]
struct FamilyCounters {
    batches: AtomicU64,
    matches: AtomicU64,
    errors: AtomicU64,
    processing_micros: AtomicU64,
}

#[derive(Debug, Default)]
pub struct CacheMonitor {
    families: [FamilyCounters; 5],
    reloads: AtomicU64,
}

impl CacheMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one processed batch.
    pub fn record(&self, family: FactFamily, matched: usize, errors: usize, elapsed: Duration) {
        let counters = &self.families[family.slot()];
        counters.batches.fetch_add(1, Ordering::Relaxed);
        counters.matches.fetch_add(matched as u64, Ordering::Relaxed);
        counters.errors.fetch_add(errors as u64, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        counters.processing_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn record_reload(&self) {
        self.reloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn matches(&self, family: FactFamily) -> u64 {
        self.families[family.slot()].matches.load(Ordering::Relaxed)
    }

    pub fn total_matches(&self) -> u64 {
        FactFamily::ALL.into_iter().map(|f| self.matches(f)).sum()
    }

    pub fn reset(&self) {
        for counters in &self.families {
            counters.batches.store(0, Ordering::Relaxed);
            counters.matches.store(0, Ordering::Relaxed);
            counters.errors.store(0, Ordering::Relaxed);
            counters.processing_micros.store(0, Ordering::Relaxed);
        }
        self.reloads.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self, element_counts: HashMap<CacheName, usize>) -> MonitorSnapshot {
        let families = FactFamily::ALL
            .into_iter()
            .map(|family| {
                let c = &self.families[family.slot()];
                (
                    family,
                    FamilySnapshot {
                        batches: c.batches.load(Ordering::Relaxed),
                        matches: c.matches.load(Ordering::Relaxed),
                        errors: c.errors.load(Ordering::Relaxed),
                        processing_micros: c.processing_micros.load(Ordering::Relaxed),
                    },
                )
            })
            .collect();

        MonitorSnapshot {
            total_elements: element_counts.values().sum(),
            element_counts,
            families,
            total_matches: self.total_matches(),
            reloads: self.reloads.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FamilySnapshot {
    pub batches: u64,
    pub matches: u64,
    pub errors: u64,
    pub processing_micros: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub element_counts: HashMap<CacheName, usize>,
    pub total_elements: usize,
    pub families: HashMap<FactFamily, FamilySnapshot>,
    pub total_matches: u64,
    pub reloads: u64,
}
