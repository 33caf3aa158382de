use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clawdeck_core::{ActorId, DomainError, DomainResult, ItemId, MachineId, SlotId};
use clawdeck_inventory::ItemSnapshot;

/// Entry in a slot's upcoming queue. Insertion order is significant: the
/// head of the queue is the next replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub item_id: ItemId,
    pub name: String,
    pub added_by: ActorId,
    pub added_at: DateTime<Utc>,
}

/// A single item-bearing position on a machine.
///
/// Invariants: at most one current item; the queue never contains the
/// slot's current item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub name: String,
    /// The active occupant, materialized by value at read time.
    pub current_item: Option<ItemSnapshot>,
    pub upcoming_queue: Vec<QueueEntry>,
}

impl Slot {
    pub fn new(id: SlotId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            current_item: None,
            upcoming_queue: Vec::new(),
        }
    }

    pub fn is_current(&self, item_id: &ItemId) -> bool {
        self.current_item
            .as_ref()
            .is_some_and(|occ| &occ.item_id == item_id)
    }

    pub fn queue_position(&self, item_id: &ItemId) -> Option<usize> {
        self.upcoming_queue
            .iter()
            .position(|entry| &entry.item_id == item_id)
    }

    /// The next replacement waiting in line.
    pub fn next_in_queue(&self) -> Option<&QueueEntry> {
        self.upcoming_queue.first()
    }
}

/// Aggregate root: ArcadeMachine.
///
/// Owns one or more slots; current practice is exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArcadeMachine {
    pub id: MachineId,
    pub name: String,
    pub slots: Vec<Slot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ArcadeMachine {
    pub fn new(
        id: MachineId,
        name: impl Into<String>,
        slots: Vec<Slot>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if slots.is_empty() {
            return Err(DomainError::validation("machine needs at least one slot"));
        }
        Ok(Self {
            id,
            name,
            slots,
            created_at: now,
            updated_at: now,
        })
    }

    /// Convenience constructor for the common single-slot machine.
    pub fn single_slot(
        id: MachineId,
        name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let slot_id = SlotId::new(format!("{id}-slot-1"));
        Self::new(id, name, vec![Slot::new(slot_id, "Slot 1")], now)
    }

    /// The slot stock changes target. Machines currently carry exactly one.
    pub fn primary_slot(&self) -> &Slot {
        &self.slots[0]
    }

    pub fn primary_slot_mut(&mut self) -> &mut Slot {
        &mut self.slots[0]
    }
}
