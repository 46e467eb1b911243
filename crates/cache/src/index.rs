//! The shaped index: one ordered slot list per lookup key.
//!
//! Every fact family has its own key variant, so the numeric list and the
//! out-of-bounds list for the same schedule id are distinct entries even
//! though a numeric fact consults both.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use watchtower_core::types::DbId;

use crate::arena::SlotId;
use crate::error::CacheError;

// ---------------------------------------------------------------------------
// CacheName
// ---------------------------------------------------------------------------

/// Named sub-caches, as exposed for introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheName {
    MeasurementData,
    MeasurementTraits,
    OutOfBounds,
    MeasurementBaselines,
    ResourceOperations,
    Availability,
    Events,
}

impl CacheName {
    pub const ALL: [CacheName; 7] = [
        Self::MeasurementData,
        Self::MeasurementTraits,
        Self::OutOfBounds,
        Self::MeasurementBaselines,
        Self::ResourceOperations,
        Self::Availability,
        Self::Events,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MeasurementData => "measurement_data",
            Self::MeasurementTraits => "measurement_traits",
            Self::OutOfBounds => "out_of_bounds",
            Self::MeasurementBaselines => "measurement_baselines",
            Self::ResourceOperations => "resource_operations",
            Self::Availability => "availability",
            Self::Events => "events",
        }
    }
}

impl fmt::Display for CacheName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheName {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CacheError::UnknownCache(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// IndexKey
// ---------------------------------------------------------------------------

/// The natural lookup key of each fact family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKey {
    /// Numeric schedule id: threshold, change and baseline conditions.
    Measurement(DbId),
    /// Trait schedule id.
    Trait(DbId),
    /// Numeric schedule id, out-of-bounds elements only.
    OutOfBounds(DbId),
    /// Baseline id. Bookkeeping for baseline refresh; never consulted by facts.
    Baseline(DbId),
    Operation {
        resource_id: DbId,
        operation_definition_id: DbId,
    },
    Availability(DbId),
    Event(DbId),
}

impl IndexKey {
    pub fn cache_name(&self) -> CacheName {
        match self {
            Self::Measurement(_) => CacheName::MeasurementData,
            Self::Trait(_) => CacheName::MeasurementTraits,
            Self::OutOfBounds(_) => CacheName::OutOfBounds,
            Self::Baseline(_) => CacheName::MeasurementBaselines,
            Self::Operation { .. } => CacheName::ResourceOperations,
            Self::Availability(_) => CacheName::Availability,
            Self::Event(_) => CacheName::Events,
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Measurement(id) => write!(f, "schedule:{id}"),
            Self::Trait(id) => write!(f, "trait-schedule:{id}"),
            Self::OutOfBounds(id) => write!(f, "oob-schedule:{id}"),
            Self::Baseline(id) => write!(f, "baseline:{id}"),
            Self::Operation {
                resource_id,
                operation_definition_id,
            } => write!(f, "resource:{resource_id}/operation:{operation_definition_id}"),
            Self::Availability(id) => write!(f, "availability-resource:{id}"),
            Self::Event(id) => write!(f, "event-resource:{id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// ShapedIndex
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ShapedIndex {
    lists: HashMap<IndexKey, Vec<SlotId>>,
}

impl ShapedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots registered under `key`, in insertion order. Empty on a miss.
    pub fn lookup(&self, key: &IndexKey) -> &[SlotId] {
        self.lists.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn push(&mut self, key: IndexKey, slot: SlotId) {
        self.lists.entry(key).or_default().push(slot);
    }

    /// Filter `slot` out of the list under `key`. The (possibly empty) list
    /// stays in place.
    pub fn remove_slot(&mut self, key: &IndexKey, slot: SlotId) -> bool {
        match self.lists.get_mut(key) {
            Some(list) => {
                let before = list.len();
                list.retain(|s| *s != slot);
                list.len() != before
            }
            None => false,
        }
    }

    /// Empty the list under `key`, returning the slots it held.
    pub fn take(&mut self, key: &IndexKey) -> Vec<SlotId> {
        self.lists.get_mut(key).map(std::mem::take).unwrap_or_default()
    }

    /// Drop the list under `key` if it holds nothing.
    pub fn prune(&mut self, key: &IndexKey) {
        if self.lists.get(key).is_some_and(Vec::is_empty) {
            self.lists.remove(key);
        }
    }

    /// Every operation key registered for one resource.
    pub fn operation_keys(&self, resource_id: DbId) -> Vec<IndexKey> {
        self.lists
            .keys()
            .filter(|key| matches!(key, IndexKey::Operation { resource_id: r, .. } if *r == resource_id))
            .copied()
            .collect()
    }

    pub fn contains_key(&self, key: &IndexKey) -> bool {
        self.lists.contains_key(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&IndexKey, &[SlotId])> {
        self.lists.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn clear(&mut self) {
        self.lists.clear();
    }
}
