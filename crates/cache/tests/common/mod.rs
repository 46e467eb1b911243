//! Shared fixtures for the condition cache integration tests.
//!
//! [`InMemorySource`] serves composites and baselines from vectors with real
//! paging. [`Harness`] wires a cache to a [`ConditionBus`] so tests can read
//! back the notifications a check produced.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use watchtower_cache::{CacheConfig, ConditionCache, DefinitionsSource, SourceError};
use watchtower_core::definitions::{
    BaselineRecord, CompositeTarget, ConditionCategory, ConditionComposite, ConditionRecord, Page,
    PageRequest,
};
use watchtower_core::facts::{AvailabilityFact, NumericFact};
use watchtower_core::status::AvailabilityType;
use watchtower_core::types::DbId;
use watchtower_events::{BusSink, ConditionBus, ConditionMessage};

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Route `tracing` output to the test harness. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// InMemorySource
// ---------------------------------------------------------------------------

fn page_of<T: Clone>(items: &[T], page: PageRequest) -> Page<T> {
    let start = (page.number * page.size).min(items.len());
    let end = (start + page.size).min(items.len());
    Page {
        items: items[start..end].to_vec(),
        total: items.len(),
    }
}

#[derive(Default)]
pub struct InMemorySource {
    composites: Mutex<HashMap<(DbId, ConditionCategory), Vec<ConditionComposite>>>,
    baselines: Mutex<HashMap<DbId, Vec<BaselineRecord>>>,
    requests: AtomicUsize,
    /// Fail every request once this many have been served.
    fail_after: Mutex<Option<usize>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, agent_id: DbId, composite: ConditionComposite) {
        self.composites
            .lock()
            .unwrap()
            .entry((agent_id, composite.condition.category))
            .or_default()
            .push(composite);
    }

    pub fn add_baseline(&self, agent_id: DbId, mut baseline: BaselineRecord) {
        baseline.agent_id = agent_id;
        self.baselines
            .lock()
            .unwrap()
            .entry(agent_id)
            .or_default()
            .push(baseline);
    }

    pub fn fail_after(&self, requests: usize) {
        *self.fail_after.lock().unwrap() = Some(requests);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn serve(&self) -> Result<(), SourceError> {
        let served = self.requests.fetch_add(1, Ordering::SeqCst);
        match *self.fail_after.lock().unwrap() {
            Some(limit) if served >= limit => Err(SourceError::Unavailable("connection refused".into())),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl DefinitionsSource for InMemorySource {
    async fn condition_composites(
        &self,
        agent_id: DbId,
        category: ConditionCategory,
        page: PageRequest,
    ) -> Result<Page<ConditionComposite>, SourceError> {
        self.serve()?;
        let composites = self.composites.lock().unwrap();
        Ok(composites
            .get(&(agent_id, category))
            .map(|items| page_of(items, page))
            .unwrap_or_else(Page::empty))
    }

    async fn dynamic_baselines(
        &self,
        agent_id: DbId,
        page: PageRequest,
    ) -> Result<Page<BaselineRecord>, SourceError> {
        self.serve()?;
        let baselines = self.baselines.lock().unwrap();
        Ok(baselines
            .get(&agent_id)
            .map(|items| page_of(items, page))
            .unwrap_or_else(Page::empty))
    }
}

// ---------------------------------------------------------------------------
// Composite builders
// ---------------------------------------------------------------------------

fn record(id: DbId, category: ConditionCategory) -> ConditionRecord {
    ConditionRecord {
        id,
        category,
        comparator: None,
        option: None,
        name: None,
        threshold: None,
    }
}

pub fn threshold(id: DbId, schedule_id: DbId, comparator: &str, value: f64) -> ConditionComposite {
    ConditionComposite {
        condition: ConditionRecord {
            comparator: Some(comparator.into()),
            threshold: Some(value),
            ..record(id, ConditionCategory::Threshold)
        },
        target: CompositeTarget::Threshold { schedule_id },
    }
}

pub fn change(id: DbId, schedule_id: DbId, current_value: Option<f64>) -> ConditionComposite {
    ConditionComposite {
        condition: record(id, ConditionCategory::Change),
        target: CompositeTarget::Change {
            schedule_id,
            current_value,
        },
    }
}

pub fn trait_change(id: DbId, schedule_id: DbId, current_value: Option<&str>) -> ConditionComposite {
    ConditionComposite {
        condition: record(id, ConditionCategory::Trait),
        target: CompositeTarget::Trait {
            schedule_id,
            current_value: current_value.map(str::to_string),
        },
    }
}

pub fn baseline_condition(
    id: DbId,
    schedule_id: DbId,
    baseline_id: DbId,
    comparator: &str,
    stat: &str,
    percent: f64,
    (min, mean, max): (f64, f64, f64),
) -> ConditionComposite {
    ConditionComposite {
        condition: ConditionRecord {
            comparator: Some(comparator.into()),
            option: Some(stat.into()),
            threshold: Some(percent),
            ..record(id, ConditionCategory::Baseline)
        },
        target: CompositeTarget::Baseline {
            schedule_id,
            baseline_id,
            min: Some(min),
            mean: Some(mean),
            max: Some(max),
        },
    }
}

pub fn availability(id: DbId, resource_id: DbId, option: &str) -> ConditionComposite {
    ConditionComposite {
        condition: ConditionRecord {
            option: Some(option.into()),
            ..record(id, ConditionCategory::Availability)
        },
        target: CompositeTarget::Availability {
            resource_id,
            current: None,
        },
    }
}

pub fn control(id: DbId, resource_id: DbId, operation_definition_id: DbId, status: &str) -> ConditionComposite {
    ConditionComposite {
        condition: ConditionRecord {
            option: Some(status.into()),
            ..record(id, ConditionCategory::Control)
        },
        target: CompositeTarget::Control {
            resource_id,
            operation_definition_id,
        },
    }
}

pub fn event(id: DbId, resource_id: DbId, severity: &str, detail: Option<&str>) -> ConditionComposite {
    ConditionComposite {
        condition: ConditionRecord {
            name: Some(severity.into()),
            option: detail.map(str::to_string),
            ..record(id, ConditionCategory::Event)
        },
        target: CompositeTarget::Event { resource_id },
    }
}

pub fn baseline(baseline_id: DbId, schedule_id: DbId, min: f64, max: f64) -> BaselineRecord {
    BaselineRecord {
        baseline_id,
        agent_id: 1,
        schedule_id,
        min: Some(min),
        mean: Some((min + max) / 2.0),
        max: Some(max),
    }
}

// ---------------------------------------------------------------------------
// Facts
// ---------------------------------------------------------------------------

pub fn numeric(schedule_id: DbId, value: f64) -> NumericFact {
    NumericFact {
        schedule_id,
        timestamp: Utc::now(),
        value,
    }
}

pub fn avail(resource_id: DbId, availability: AvailabilityType) -> AvailabilityFact {
    AvailabilityFact {
        resource_id,
        timestamp: Utc::now(),
        availability,
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub source: Arc<InMemorySource>,
    pub bus: Arc<ConditionBus>,
    pub rx: broadcast::Receiver<ConditionMessage>,
    pub cache: Arc<ConditionCache>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        init_tracing();
        let source = Arc::new(InMemorySource::new());
        let bus = Arc::new(ConditionBus::default());
        let rx = bus.subscribe();
        let sink = Arc::new(BusSink::new(Arc::clone(&bus)));
        let cache = Arc::new(ConditionCache::new(source.clone(), sink, config));
        Self {
            source,
            bus,
            rx,
            cache,
        }
    }

    /// Every message published since the last drain.
    pub fn drain(&mut self) -> Vec<ConditionMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }
}
