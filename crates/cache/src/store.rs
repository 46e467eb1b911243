//! The guarded state of the condition cache: arena, shaped index and inverse
//! maps, plus every mutation that has to keep the three consistent.
//!
//! Nothing here locks. [`ConditionCache`](crate::ConditionCache) wraps a
//! `CacheStore` in its read/write lock and decides which side each call takes.

use std::collections::{HashMap, HashSet};

use watchtower_core::baseline::OutOfBoundsRange;
use watchtower_core::definitions::BaselineRecord;
use watchtower_core::element::ElementSnapshot;
use watchtower_core::types::DbId;
use watchtower_core::{CacheStats, ConditionElement, Operator};

use crate::arena::{Arena, SlotId};
use crate::index::{CacheName, IndexKey, ShapedIndex};
use crate::inverse::{InverseEntry, InverseMap};

/// Every out-of-bounds schedule holds exactly one low and one high element.
const OUT_OF_BOUNDS_PAIR: usize = 2;

#[derive(Debug, Default)]
pub struct CacheStore {
    arena: Arena,
    index: ShapedIndex,
    inverse: InverseMap,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Elements under `key`, in insertion order.
    pub fn candidates(&self, key: &IndexKey) -> Vec<&ConditionElement> {
        self.index
            .lookup(key)
            .iter()
            .filter_map(|slot| self.arena.get(*slot))
            .collect()
    }

    pub fn snapshots(&self, key: &IndexKey) -> Vec<ElementSnapshot> {
        self.candidates(key)
            .into_iter()
            .map(ConditionElement::snapshot)
            .collect()
    }

    pub fn agent_conditions(&self, agent_id: DbId) -> Vec<DbId> {
        self.inverse.agent_conditions(agent_id).to_vec()
    }

    pub fn agent_out_of_bounds(&self, agent_id: DbId) -> Vec<DbId> {
        self.inverse.agent_out_of_bounds(agent_id).to_vec()
    }

    pub fn element_count(&self) -> usize {
        self.arena.len()
    }

    /// Number of slots held per named cache.
    pub fn element_counts(&self) -> HashMap<CacheName, usize> {
        let mut counts: HashMap<CacheName, usize> =
            CacheName::ALL.into_iter().map(|name| (name, 0)).collect();
        for (key, slots) in self.index.entries() {
            *counts.entry(key.cache_name()).or_default() += slots.len();
        }
        counts
    }

    // -----------------------------------------------------------------------
    // Insert
    // -----------------------------------------------------------------------

    /// Store one compiled condition element under every key in `keys`.
    ///
    /// The first key is the list facts are matched against; further keys
    /// (the baseline bookkeeping list) share the same slot. `stats.created`
    /// counts the element once.
    pub fn insert(
        &mut self,
        agent_id: DbId,
        keys: &[IndexKey],
        element: ConditionElement,
        stats: &mut CacheStats,
    ) -> Option<SlotId> {
        if keys.is_empty() {
            tracing::warn!(condition_id = element.id(), "Element has no index key, not cached");
            stats.skipped += 1;
            return None;
        }

        let condition_id = element.id();
        tracing::debug!(agent_id, %element, "Caching condition element");
        let slot = self.arena.insert(element);
        for key in keys {
            self.index.push(*key, slot);
            self.inverse
                .record_condition(agent_id, condition_id, InverseEntry { slot, owner: *key });
        }
        stats.created += 1;
        Some(slot)
    }

    /// Store the low/high out-of-bounds pair for a schedule.
    ///
    /// Both elements are built before either is stored; if one cannot be
    /// built the schedule gets neither. A schedule that already holds
    /// out-of-bounds elements is left alone. Returns whether a pair was stored.
    pub fn insert_out_of_bounds(
        &mut self,
        agent_id: DbId,
        schedule_id: DbId,
        range: OutOfBoundsRange,
        stats: &mut CacheStats,
    ) -> bool {
        let key = IndexKey::OutOfBounds(schedule_id);
        if !self.index.lookup(&key).is_empty() {
            tracing::debug!(schedule_id, "Out-of-bounds elements already cached, skipping");
            return false;
        }

        let low = ConditionElement::out_of_bounds(schedule_id, Operator::LessThan, range.low);
        let high = ConditionElement::out_of_bounds(schedule_id, Operator::GreaterThan, range.high);
        let (low, high) = match (low, high) {
            (Ok(low), Ok(high)) => (low, high),
            (Err(e), _) | (_, Err(e)) => {
                tracing::info!(
                    schedule_id,
                    low = range.low,
                    high = range.high,
                    error = %e,
                    "Failed to create out-of-bounds pair, skipping"
                );
                stats.skipped += 1;
                return false;
            }
        };

        for element in [low, high] {
            let slot = self.arena.insert(element);
            self.index.push(key, slot);
            stats.created += 1;
        }
        self.inverse.record_out_of_bounds(agent_id, schedule_id);
        true
    }

    // -----------------------------------------------------------------------
    // Remove
    // -----------------------------------------------------------------------

    /// Remove every element of a condition from the index and the arena.
    ///
    /// Unknown ids are a no-op. `stats.deleted` counts dropped elements.
    pub fn remove_condition(&mut self, condition_id: DbId, stats: &mut CacheStats) {
        let Some(entries) = self.inverse.take_condition(condition_id) else {
            tracing::debug!(condition_id, "Condition not cached, nothing to remove");
            return;
        };

        let mut slots: Vec<SlotId> = Vec::with_capacity(entries.len());
        for entry in entries {
            self.index.remove_slot(&entry.owner, entry.slot);
            if !slots.contains(&entry.slot) {
                slots.push(entry.slot);
            }
        }
        for slot in slots {
            if self.arena.remove(slot).is_some() {
                stats.deleted += 1;
            }
        }
    }

    /// Empty the out-of-bounds list of a schedule. The key stays.
    pub fn remove_out_of_bounds(&mut self, schedule_id: DbId, stats: &mut CacheStats) {
        for slot in self.index.take(&IndexKey::OutOfBounds(schedule_id)) {
            if self.arena.remove(slot).is_some() {
                stats.deleted += 1;
            }
        }
    }

    /// Remove a condition and drop it from its agent's list.
    pub fn remove_agent_condition(&mut self, agent_id: DbId, condition_id: DbId, stats: &mut CacheStats) {
        self.remove_condition(condition_id, stats);
        self.inverse.forget_agent_condition(agent_id, condition_id);
    }

    /// Remove every condition and out-of-bounds schedule of an agent.
    pub fn remove_agent(&mut self, agent_id: DbId, stats: &mut CacheStats) {
        for condition_id in self.inverse.take_agent_conditions(agent_id) {
            self.remove_condition(condition_id, stats);
        }
        for schedule_id in self.inverse.take_agent_out_of_bounds(agent_id) {
            self.remove_out_of_bounds(schedule_id, stats);
        }
    }

    /// Remove every element keyed off a deleted resource.
    ///
    /// Operation, availability and event conditions are found by resource
    /// id. Measurement, trait and out-of-bounds elements are found through
    /// `schedule_ids`, the resource's measurement schedules. Each condition
    /// hit is removed from every list that holds it, baseline bookkeeping
    /// included. Other resources of the same agent are untouched.
    pub fn remove_resource(&mut self, resource_id: DbId, schedule_ids: &[DbId], stats: &mut CacheStats) {
        let mut keys = self.index.operation_keys(resource_id);
        keys.push(IndexKey::Availability(resource_id));
        keys.push(IndexKey::Event(resource_id));
        for schedule_id in schedule_ids {
            keys.push(IndexKey::Measurement(*schedule_id));
            keys.push(IndexKey::Trait(*schedule_id));
        }

        let mut condition_ids: Vec<DbId> = Vec::new();
        for key in &keys {
            for element in self.candidates(key) {
                if !condition_ids.contains(&element.id()) {
                    condition_ids.push(element.id());
                }
            }
        }
        for condition_id in condition_ids {
            self.remove_condition(condition_id, stats);
            self.inverse.forget_condition(condition_id);
        }

        for schedule_id in schedule_ids {
            self.remove_out_of_bounds(*schedule_id, stats);
            self.inverse.forget_out_of_bounds(*schedule_id);
            keys.push(IndexKey::OutOfBounds(*schedule_id));
        }
        for key in &keys {
            self.index.prune(key);
        }
    }

    /// Drop everything. Returns the number of elements dropped.
    pub fn clear(&mut self) -> usize {
        self.index.clear();
        self.inverse.clear();
        self.arena.clear()
    }

    // -----------------------------------------------------------------------
    // Baseline refresh
    // -----------------------------------------------------------------------

    /// Recompute references that depend on a baseline.
    ///
    /// Baseline condition elements registered under the baseline id get a
    /// new reference. The schedule's out-of-bounds pair is moved to the new
    /// range, or created for `record.agent_id` if the schedule has none yet.
    pub fn refresh_baseline(
        &mut self,
        record: &BaselineRecord,
        low_factor: f64,
        high_factor: f64,
        stats: &mut CacheStats,
    ) {
        for slot in self.index.lookup(&IndexKey::Baseline(record.baseline_id)).to_vec() {
            if let Some(element) = self.arena.get_mut(slot) {
                if element.refresh_baseline(record.min, record.mean, record.max) {
                    stats.updated += 1;
                }
            }
        }

        let Some(range) = OutOfBoundsRange::from_baseline(record.min, record.max, low_factor, high_factor) else {
            tracing::debug!(
                baseline_id = record.baseline_id,
                "Baseline min/max invalid, out-of-bounds range unchanged"
            );
            stats.skipped += 1;
            return;
        };

        let oob_slots = self.index.lookup(&IndexKey::OutOfBounds(record.schedule_id)).to_vec();
        if oob_slots.is_empty() {
            tracing::debug!(
                agent_id = record.agent_id,
                schedule_id = record.schedule_id,
                "No out-of-bounds elements cached for schedule, creating pair"
            );
            self.insert_out_of_bounds(record.agent_id, record.schedule_id, range, stats);
            return;
        }

        for slot in oob_slots {
            if let Some(element) = self.arena.get_mut(slot) {
                let bound = match element.operator() {
                    Operator::LessThan => range.low,
                    _ => range.high,
                };
                if element.set_out_of_bounds_reference(bound) {
                    stats.updated += 1;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Consistency
    // -----------------------------------------------------------------------

    /// Check the arena, index and inverse maps agree with each other.
    ///
    /// Every indexed slot must exist, every element must be owned by a
    /// condition or an agent's out-of-bounds schedule, and no schedule may
    /// hold more than one out-of-bounds pair. Problems are logged.
    pub fn validate(&self) -> bool {
        let mut valid = true;

        for (key, slots) in self.index.entries() {
            for slot in slots {
                if !self.arena.contains(*slot) {
                    tracing::error!(%key, %slot, "Index references a missing element");
                    valid = false;
                }
            }
            if matches!(key, IndexKey::OutOfBounds(_)) && slots.len() > OUT_OF_BOUNDS_PAIR {
                tracing::error!(%key, count = slots.len(), "Duplicate out-of-bounds elements");
                valid = false;
            }
        }

        let mut owned: HashSet<SlotId> = HashSet::new();
        for (condition_id, entries) in self.inverse.all_condition_entries() {
            for entry in entries {
                if !self.index.lookup(&entry.owner).contains(&entry.slot) {
                    tracing::error!(
                        condition_id,
                        owner = %entry.owner,
                        slot = %entry.slot,
                        "Inverse entry points at a list that no longer holds it"
                    );
                    valid = false;
                }
                owned.insert(entry.slot);
            }
        }
        for schedule_id in self.inverse.all_out_of_bounds_schedules() {
            owned.extend(self.index.lookup(&IndexKey::OutOfBounds(schedule_id)));
        }

        for slot in self.arena.slots() {
            if !owned.contains(&slot) {
                tracing::error!(%slot, "Element is not reachable from the inverse maps");
                valid = false;
            }
        }

        valid
    }

    /// Log every entry of one named cache at debug level.
    ///
    /// Returns the number of elements printed.
    pub fn dump(&self, name: CacheName) -> usize {
        let mut printed = 0;
        for (key, slots) in self.index.entries().filter(|(k, _)| k.cache_name() == name) {
            tracing::debug!(cache = %name, %key, count = slots.len(), "Cache entry");
            for element in slots.iter().filter_map(|slot| self.arena.get(*slot)) {
                tracing::debug!(cache = %name, %key, %element, "Cache element");
                printed += 1;
            }
        }
        printed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
