//! [`ConditionCache`]: the shared, lock-guarded condition-matching cache.
//!
//! Fact checks take the read side of one `RwLock` and run concurrently with
//! each other. Loads, unloads, reloads, clears and incremental edits take the
//! write side.
//!
//! A load holds the write lock across every paged round trip to the
//! definitions source. Readers never see half of an agent's conditions, but
//! every `check_*` call waits for the whole load to finish.

use std::sync::Arc;

use tokio::sync::RwLock;
use watchtower_core::definitions::{AlertDefinitionRecord, BaselineRecord, DefinitionEvent};
use watchtower_core::element::ElementSnapshot;
use watchtower_core::facts::{AvailabilityFact, EventFact, NumericFact, OperationFact, TraitFact};
use watchtower_core::types::DbId;
use watchtower_core::CacheStats;
use watchtower_events::sink::ConditionSink;

use crate::config::CacheConfig;
use crate::dispatch::{process_elements, report_errors};
use crate::error::CacheError;
use crate::index::{CacheName, IndexKey};
use crate::loader;
use crate::monitor::{CacheMonitor, FactFamily, MonitorSnapshot};
use crate::source::DefinitionsSource;
use crate::store::CacheStore;

/// Stats of both halves of a reload.
#[derive(Debug, Clone)]
pub struct ReloadStats {
    pub unloaded: CacheStats,
    pub loaded: CacheStats,
}

pub struct ConditionCache {
    store: RwLock<CacheStore>,
    source: Arc<dyn DefinitionsSource>,
    sink: Arc<dyn ConditionSink>,
    monitor: CacheMonitor,
    config: CacheConfig,
}

impl ConditionCache {
    pub fn new(
        source: Arc<dyn DefinitionsSource>,
        sink: Arc<dyn ConditionSink>,
        config: CacheConfig,
    ) -> Self {
        Self {
            store: RwLock::new(CacheStore::new()),
            source,
            sink,
            monitor: CacheMonitor::new(),
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Load / unload
    // -----------------------------------------------------------------------

    /// Load every condition and baseline of an agent.
    ///
    /// A source failure stops the load, is logged and counted in
    /// `stats.errors`; elements inserted before it stay cached.
    pub async fn load_agent(&self, agent_id: DbId) -> CacheStats {
        let mut store = self.store.write().await;
        self.load_locked(&mut store, agent_id).await
    }

    /// Remove every condition and out-of-bounds element of an agent.
    pub async fn unload_agent(&self, agent_id: DbId) -> CacheStats {
        let mut store = self.store.write().await;
        Self::unload_locked(&mut store, agent_id)
    }

    /// Unload then load an agent under a single write-lock hold.
    ///
    /// Never fails: problems are logged and show up in the returned stats.
    pub async fn reload_agent(&self, agent_id: DbId) -> ReloadStats {
        let mut store = self.store.write().await;
        let unloaded = Self::unload_locked(&mut store, agent_id);
        let loaded = self.load_locked(&mut store, agent_id).await;
        drop(store);

        self.monitor.record_reload();
        tracing::info!(agent_id, stats = %unloaded, "Unloaded agent conditions");
        tracing::info!(agent_id, stats = %loaded, "Loaded agent conditions");
        ReloadStats { unloaded, loaded }
    }

    async fn load_locked(&self, store: &mut CacheStore, agent_id: DbId) -> CacheStats {
        let mut stats = CacheStats::new();
        if let Err(e) =
            loader::load_agent(store, self.source.as_ref(), &self.config, agent_id, &mut stats).await
        {
            tracing::error!(agent_id, error = %e, "Failed to load agent conditions");
            stats.errors += 1;
        }
        tracing::debug!(agent_id, %stats, "Agent load finished");
        stats
    }

    fn unload_locked(store: &mut CacheStore, agent_id: DbId) -> CacheStats {
        let mut stats = CacheStats::new();
        store.remove_agent(agent_id, &mut stats);
        tracing::debug!(agent_id, %stats, "Agent unload finished");
        stats
    }

    /// Drop every element of every agent and reset the monitor.
    pub async fn clear_all(&self) -> CacheStats {
        let mut stats = CacheStats::new();
        let mut store = self.store.write().await;
        stats.deleted = store.clear();
        drop(store);

        self.monitor.reset();
        tracing::info!(%stats, "Cleared condition cache");
        stats
    }

    // -----------------------------------------------------------------------
    // Incremental updates
    // -----------------------------------------------------------------------

    /// Apply an alert definition lifecycle change.
    ///
    /// Created and enabled definitions have their conditions inserted;
    /// deleted and disabled ones have them removed.
    pub async fn update_definition(
        &self,
        definition: &AlertDefinitionRecord,
        event: DefinitionEvent,
    ) -> CacheStats {
        let mut stats = CacheStats::new();
        let mut store = self.store.write().await;
        match event {
            DefinitionEvent::Created | DefinitionEvent::Enabled => {
                for composite in &definition.conditions {
                    // Re-enabling must not duplicate elements already cached.
                    store.remove_condition(composite.condition.id, &mut stats);
                    loader::insert_composite(&mut store, definition.agent_id, composite, &mut stats);
                }
            }
            DefinitionEvent::Deleted | DefinitionEvent::Disabled => {
                for composite in &definition.conditions {
                    store.remove_agent_condition(definition.agent_id, composite.condition.id, &mut stats);
                }
            }
        }
        drop(store);

        tracing::debug!(
            definition_id = definition.id,
            agent_id = definition.agent_id,
            ?event,
            %stats,
            "Applied alert definition change"
        );
        stats
    }

    /// Drop every element keyed off a deleted resource.
    ///
    /// `schedule_ids` are the resource's measurement schedules; their
    /// threshold, change, baseline, trait and out-of-bounds elements go with
    /// it. The agent's other resources stay cached.
    pub async fn remove_resource(&self, resource_id: DbId, schedule_ids: &[DbId]) -> CacheStats {
        let mut stats = CacheStats::new();
        let mut store = self.store.write().await;
        store.remove_resource(resource_id, schedule_ids, &mut stats);
        drop(store);

        tracing::info!(resource_id, schedules = schedule_ids.len(), %stats, "Removed resource conditions");
        stats
    }

    /// Recompute baseline conditions and out-of-bounds ranges after the
    /// baselines were recalculated. Schedules without an out-of-bounds pair
    /// get one for the baseline's agent.
    pub async fn update_baselines(&self, baselines: &[BaselineRecord]) -> CacheStats {
        let mut stats = CacheStats::new();
        if baselines.is_empty() {
            return stats;
        }

        let mut store = self.store.write().await;
        for baseline in baselines {
            store.refresh_baseline(
                baseline,
                self.config.low_oob_factor,
                self.config.high_oob_factor,
                &mut stats,
            );
        }
        drop(store);

        tracing::debug!(count = baselines.len(), %stats, "Refreshed baselines");
        stats
    }

    // -----------------------------------------------------------------------
    // Fact checks
    // -----------------------------------------------------------------------

    /// Check numeric measurements against threshold, change and baseline
    /// conditions, then against the schedule's out-of-bounds pair.
    pub async fn check_numeric(&self, facts: &[NumericFact]) -> CacheStats {
        let mut stats = CacheStats::new();
        if facts.is_empty() {
            return stats;
        }

        {
            let store = self.store.read().await;
            for fact in facts {
                let value = fact.fact_value();
                let conditions = store.candidates(&IndexKey::Measurement(fact.schedule_id));
                process_elements(&conditions, &value, fact.timestamp, self.sink.as_ref(), &mut stats).await;
                let bounds = store.candidates(&IndexKey::OutOfBounds(fact.schedule_id));
                process_elements(&bounds, &value, fact.timestamp, self.sink.as_ref(), &mut stats).await;
            }
        }

        self.finish(FactFamily::Measurement, "measurements", &stats);
        stats
    }

    pub async fn check_traits(&self, facts: &[TraitFact]) -> CacheStats {
        let mut stats = CacheStats::new();
        if facts.is_empty() {
            return stats;
        }

        {
            let store = self.store.read().await;
            for fact in facts {
                let elements = store.candidates(&IndexKey::Trait(fact.schedule_id));
                process_elements(&elements, &fact.fact_value(), fact.timestamp, self.sink.as_ref(), &mut stats)
                    .await;
            }
        }

        self.finish(FactFamily::Trait, "traits", &stats);
        stats
    }

    pub async fn check_operation(&self, facts: &[OperationFact]) -> CacheStats {
        let mut stats = CacheStats::new();
        if facts.is_empty() {
            return stats;
        }

        {
            let store = self.store.read().await;
            for fact in facts {
                let key = IndexKey::Operation {
                    resource_id: fact.resource_id,
                    operation_definition_id: fact.operation_definition_id,
                };
                let elements = store.candidates(&key);
                process_elements(&elements, &fact.fact_value(), fact.timestamp, self.sink.as_ref(), &mut stats)
                    .await;
            }
        }

        self.finish(FactFamily::Operation, "operations", &stats);
        stats
    }

    pub async fn check_availability(&self, facts: &[AvailabilityFact]) -> CacheStats {
        let mut stats = CacheStats::new();
        if facts.is_empty() {
            return stats;
        }

        {
            let store = self.store.read().await;
            for fact in facts {
                let elements = store.candidates(&IndexKey::Availability(fact.resource_id));
                process_elements(&elements, &fact.fact_value(), fact.timestamp, self.sink.as_ref(), &mut stats)
                    .await;
            }
        }

        self.finish(FactFamily::Availability, "availabilities", &stats);
        stats
    }

    /// Check events raised by one resource.
    pub async fn check_events(&self, source_resource_id: DbId, facts: &[EventFact]) -> CacheStats {
        let mut stats = CacheStats::new();
        if facts.is_empty() {
            return stats;
        }

        {
            let store = self.store.read().await;
            let elements = store.candidates(&IndexKey::Event(source_resource_id));
            if !elements.is_empty() {
                for fact in facts {
                    process_elements(&elements, &fact.fact_value(), fact.timestamp, self.sink.as_ref(), &mut stats)
                        .await;
                }
            }
        }

        self.finish(FactFamily::Event, "events", &stats);
        stats
    }

    fn finish(&self, family: FactFamily, what: &'static str, stats: &CacheStats) {
        report_errors(what, stats);
        self.monitor.record(family, stats.matched, stats.errors, stats.age());
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Whether the index and inverse maps agree. Problems are logged.
    pub async fn is_cache_valid(&self) -> bool {
        self.store.read().await.validate()
    }

    pub fn cache_names(&self) -> Vec<&'static str> {
        CacheName::ALL.into_iter().map(CacheName::as_str).collect()
    }

    /// Log the contents of one named cache at debug level.
    ///
    /// Returns the number of elements logged.
    pub async fn dump_cache(&self, name: &str) -> Result<usize, CacheError> {
        let name: CacheName = name.parse()?;
        let printed = self.store.read().await.dump(name);
        tracing::debug!(cache = %name, printed, "Dumped cache");
        Ok(printed)
    }

    /// Snapshots of the elements under one index key.
    pub async fn lookup(&self, key: IndexKey) -> Vec<ElementSnapshot> {
        self.store.read().await.snapshots(&key)
    }

    pub async fn agent_conditions(&self, agent_id: DbId) -> Vec<DbId> {
        self.store.read().await.agent_conditions(agent_id)
    }

    pub async fn agent_out_of_bounds(&self, agent_id: DbId) -> Vec<DbId> {
        self.store.read().await.agent_out_of_bounds(agent_id)
    }

    pub fn monitor(&self) -> &CacheMonitor {
        &self.monitor
    }

    pub async fn monitor_snapshot(&self) -> MonitorSnapshot {
        let counts = self.store.read().await.element_counts();
        self.monitor.snapshot(counts)
    }
}
