//! Flat storage for condition elements.
//!
//! Index lists and inverse entries refer to elements by [`SlotId`]. Removing
//! an element is a single map removal; no list is searched by identity.

use std::collections::HashMap;
use std::fmt;

use watchtower_core::ConditionElement;

/// Handle to an element in the [`Arena`]. Never reused within one arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u64);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct Arena {
    slots: HashMap<SlotId, ConditionElement>,
    next: u64,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, element: ConditionElement) -> SlotId {
        let slot = SlotId(self.next);
        self.next += 1;
        self.slots.insert(slot, element);
        slot
    }

    pub fn get(&self, slot: SlotId) -> Option<&ConditionElement> {
        self.slots.get(&slot)
    }

    pub fn get_mut(&mut self, slot: SlotId) -> Option<&mut ConditionElement> {
        self.slots.get_mut(&slot)
    }

    pub fn remove(&mut self, slot: SlotId) -> Option<ConditionElement> {
        self.slots.remove(&slot)
    }

    pub fn contains(&self, slot: SlotId) -> bool {
        self.slots.contains_key(&slot)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.slots.keys().copied()
    }

    /// Drop every element. Slot ids keep increasing afterwards.
    pub fn clear(&mut self) -> usize {
        let dropped = self.slots.len();
        self.slots.clear();
        dropped
    }
}
