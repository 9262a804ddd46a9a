//! In-memory slot catalog
//!
//! Holds the fixed set of slots and their occupancy. Every mutation of a
//! slot happens while holding that slot's DashMap entry guard, so the
//! check-and-set in [`SlotCatalog::try_mark_occupied`] is indivisible with
//! respect to all other catalog operations on the same slot. Guards are
//! never held across an `.await`.

use std::collections::BTreeSet;

use dashmap::DashMap;
use thiserror::Error;

use super::model::{Occupancy, Slot, SlotId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Slot {0} not found")]
    SlotNotFound(SlotId),

    #[error("Slot {0} is already occupied")]
    AlreadyOccupied(SlotId),
}

pub struct SlotCatalog {
    slots: DashMap<SlotId, Slot>,
}

impl SlotCatalog {
    pub fn new(slots: impl IntoIterator<Item = Slot>) -> Self {
        let map = DashMap::new();
        for slot in slots {
            map.insert(slot.id, slot);
        }
        Self { slots: map }
    }

    /// Snapshot of all slots ordered by label.
    pub fn list(&self) -> Vec<Slot> {
        let mut slots: Vec<Slot> = self.slots.iter().map(|e| e.value().clone()).collect();
        slots.sort_by(|a, b| a.label.cmp(&b.label));
        slots
    }

    pub fn label_of(&self, slot_id: SlotId) -> Option<String> {
        self.slots.get(&slot_id).map(|e| e.label.clone())
    }

    /// Flip `Available -> Occupied` atomically. Returns the slot as it is
    /// after the flip.
    pub fn try_mark_occupied(&self, slot_id: SlotId) -> Result<Slot, CatalogError> {
        let mut slot = self
            .slots
            .get_mut(&slot_id)
            .ok_or(CatalogError::SlotNotFound(slot_id))?;

        if slot.occupancy == Occupancy::Occupied {
            return Err(CatalogError::AlreadyOccupied(slot_id));
        }
        slot.occupancy = Occupancy::Occupied;
        Ok(slot.clone())
    }

    /// Unconditionally flip a slot back to `Available`, returning the
    /// occupancy it had before.
    pub fn mark_available(&self, slot_id: SlotId) -> Result<Occupancy, CatalogError> {
        let mut slot = self
            .slots
            .get_mut(&slot_id)
            .ok_or(CatalogError::SlotNotFound(slot_id))?;

        let previous = slot.occupancy;
        slot.occupancy = Occupancy::Available;
        Ok(previous)
    }

    pub fn occupied_ids(&self) -> BTreeSet<SlotId> {
        self.slots
            .iter()
            .filter(|e| e.occupancy == Occupancy::Occupied)
            .map(|e| *e.key())
            .collect()
    }
}
