//! Inverse bookkeeping: which slots belong to a condition, which conditions
//! and out-of-bounds schedules belong to an agent.

use std::collections::HashMap;

use watchtower_core::types::DbId;

use crate::arena::SlotId;
use crate::index::IndexKey;

/// One placement of an element: the slot and the index list holding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InverseEntry {
    pub slot: SlotId,
    pub owner: IndexKey,
}

#[derive(Debug, Default)]
pub struct InverseMap {
    conditions: HashMap<DbId, Vec<InverseEntry>>,
    agent_conditions: HashMap<DbId, Vec<DbId>>,
    agent_out_of_bounds: HashMap<DbId, Vec<DbId>>,
}

impl InverseMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_condition(&mut self, agent_id: DbId, condition_id: DbId, entry: InverseEntry) {
        self.conditions.entry(condition_id).or_default().push(entry);
        let conditions = self.agent_conditions.entry(agent_id).or_default();
        if !conditions.contains(&condition_id) {
            conditions.push(condition_id);
        }
    }

    pub fn record_out_of_bounds(&mut self, agent_id: DbId, schedule_id: DbId) {
        let schedules = self.agent_out_of_bounds.entry(agent_id).or_default();
        if !schedules.contains(&schedule_id) {
            schedules.push(schedule_id);
        }
    }

    /// Remove and return every placement of a condition.
    pub fn take_condition(&mut self, condition_id: DbId) -> Option<Vec<InverseEntry>> {
        self.conditions.remove(&condition_id)
    }

    /// Empty the agent's condition list. The (empty) entry is kept.
    pub fn take_agent_conditions(&mut self, agent_id: DbId) -> Vec<DbId> {
        self.agent_conditions
            .get_mut(&agent_id)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Empty the agent's out-of-bounds schedule list. The (empty) entry is kept.
    pub fn take_agent_out_of_bounds(&mut self, agent_id: DbId) -> Vec<DbId> {
        self.agent_out_of_bounds
            .get_mut(&agent_id)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Drop a single condition from its agent's list.
    pub fn forget_agent_condition(&mut self, agent_id: DbId, condition_id: DbId) {
        if let Some(conditions) = self.agent_conditions.get_mut(&agent_id) {
            conditions.retain(|id| *id != condition_id);
        }
    }

    /// Drop a condition from whichever agent list holds it.
    pub fn forget_condition(&mut self, condition_id: DbId) {
        for conditions in self.agent_conditions.values_mut() {
            conditions.retain(|id| *id != condition_id);
        }
    }

    /// Drop an out-of-bounds schedule from whichever agent list holds it.
    pub fn forget_out_of_bounds(&mut self, schedule_id: DbId) {
        for schedules in self.agent_out_of_bounds.values_mut() {
            schedules.retain(|id| *id != schedule_id);
        }
    }

    pub fn agent_conditions(&self, agent_id: DbId) -> &[DbId] {
        self.agent_conditions
            .get(&agent_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn agent_out_of_bounds(&self, agent_id: DbId) -> &[DbId] {
        self.agent_out_of_bounds
            .get(&agent_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all_condition_entries(&self) -> impl Iterator<Item = (&DbId, &Vec<InverseEntry>)> {
        self.conditions.iter()
    }

    pub fn all_out_of_bounds_schedules(&self) -> impl Iterator<Item = DbId> + '_ {
        self.agent_out_of_bounds.values().flatten().copied()
    }

    pub fn clear(&mut self) {
        self.conditions.clear();
        self.agent_conditions.clear();
        self.agent_out_of_bounds.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use watchtower_core::{ConditionElement, Operator};

    fn slot(arena: &mut Arena, id: DbId) -> SlotId {
        arena.insert(ConditionElement::measurement(id, Operator::LessThan, Some(0.0)).unwrap())
    }

    #[test]
    fn agent_condition_list_has_no_duplicates() {
        let mut arena = Arena::new();
        let mut inverse = InverseMap::new();
        let a = slot(&mut arena, 1);
        let b = slot(&mut arena, 1);
        inverse.record_condition(9, 1, InverseEntry { slot: a, owner: IndexKey::Measurement(3) });
        inverse.record_condition(9, 1, InverseEntry { slot: b, owner: IndexKey::Baseline(4) });

        assert_eq!(inverse.agent_conditions(9), &[1]);
        assert_eq!(inverse.take_condition(1).map(|entries| entries.len()), Some(2));
    }

    #[test]
    fn forgetting_reaches_every_agent() {
        let mut arena = Arena::new();
        let mut inverse = InverseMap::new();
        let a = slot(&mut arena, 1);
        inverse.record_condition(3, 1, InverseEntry { slot: a, owner: IndexKey::Event(8) });
        inverse.record_out_of_bounds(4, 100);
        inverse.record_out_of_bounds(4, 101);

        inverse.forget_condition(1);
        inverse.forget_out_of_bounds(100);

        assert!(inverse.agent_conditions(3).is_empty());
        assert_eq!(inverse.agent_out_of_bounds(4), &[101]);
    }

    #[test]
    fn taking_agent_lists_keeps_entries() {
        let mut inverse = InverseMap::new();
        inverse.record_out_of_bounds(2, 100);
        inverse.record_out_of_bounds(2, 100);
        assert_eq!(inverse.take_agent_out_of_bounds(2), vec![100]);
        assert!(inverse.agent_out_of_bounds(2).is_empty());
        assert!(inverse.take_agent_out_of_bounds(2).is_empty());
    }
}
