//! Slot reconciliation.
//!
//! After the assignment engine commits a status change on an item, these
//! pure transforms bring the machine's slot view back in agreement. Every
//! transform is idempotent: re-applying it after a partial failure
//! converges without duplicating queue entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clawdeck_core::ActorId;
use clawdeck_inventory::{AssignmentStatus, ItemSnapshot};

use crate::machine::{ArcadeMachine, QueueEntry, Slot};

/// The committed change a slot must reflect.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotChange {
    /// The item became the machine's active occupant.
    Promoted,
    /// The item stays assigned but is queued as a future replacement.
    Demoted,
    /// The item's assignment was deleted.
    Removed,
}

impl From<AssignmentStatus> for SlotChange {
    fn from(status: AssignmentStatus) -> Self {
        match status {
            AssignmentStatus::Using => SlotChange::Promoted,
            AssignmentStatus::Replacement => SlotChange::Demoted,
        }
    }
}

/// Apply a committed change to the machine's primary slot.
pub fn apply_change(
    machine: &mut ArcadeMachine,
    item: &ItemSnapshot,
    change: SlotChange,
    actor: &ActorId,
    now: DateTime<Utc>,
) {
    let slot = machine.primary_slot_mut();
    match change {
        SlotChange::Promoted => {
            slot.current_item = Some(item.clone());
            // Promotion consumes the queue entry.
            slot.upcoming_queue
                .retain(|entry| entry.item_id != item.item_id);
        }
        SlotChange::Demoted => {
            if slot.is_current(&item.item_id) {
                slot.current_item = None;
            }
            // Append at the tail: replacements already queued by others keep
            // their priority. Skipped when the entry survives from an
            // earlier pass.
            if slot.queue_position(&item.item_id).is_none() {
                slot.upcoming_queue.push(QueueEntry {
                    item_id: item.item_id.clone(),
                    name: item.name.clone(),
                    added_by: actor.clone(),
                    added_at: now,
                });
            }
        }
        SlotChange::Removed => {
            // The item can only be in one place, but the caller may not know
            // which, so both are checked.
            if slot.is_current(&item.item_id) {
                slot.current_item = None;
            }
            slot.upcoming_queue
                .retain(|entry| entry.item_id != item.item_id);
        }
    }
    machine.updated_at = now;
}

/// One item's assignment on the machine being rebuilt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub item: ItemSnapshot,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
}

/// Recompute a machine's primary slot purely from the set of assignment
/// records that reference it.
///
/// This is the repair pass for a detected partial sync: the assignment list
/// is source of truth, so the slot's occupant and queue are derived from it.
/// Surviving queue entries keep their relative order; Replacement
/// assignments without an entry are appended in `assigned_at` order.
pub fn rebuild(machine: &mut ArcadeMachine, assignments: &[AssignmentRecord], now: DateTime<Utc>) {
    let current = pick_occupant(machine.primary_slot(), assignments);

    let slot = machine.primary_slot_mut();
    slot.current_item = current.clone();

    let current_id = current.as_ref().map(|occ| occ.item_id.clone());
    let is_queued_assignment = |entry: &QueueEntry| {
        assignments.iter().any(|rec| {
            rec.status == AssignmentStatus::Replacement && rec.item.item_id == entry.item_id
        })
    };

    // Keep surviving entries, dropping the occupant and anything no longer
    // Replacement-assigned.
    slot.upcoming_queue.retain(|entry| {
        Some(&entry.item_id) != current_id.as_ref() && is_queued_assignment(entry)
    });

    // Append missing Replacement assignments, oldest first.
    let mut missing: Vec<&AssignmentRecord> = assignments
        .iter()
        .filter(|rec| {
            rec.status == AssignmentStatus::Replacement
                && slot.queue_position(&rec.item.item_id).is_none()
        })
        .collect();
    missing.sort_by_key(|rec| rec.assigned_at);
    for rec in missing {
        slot.upcoming_queue.push(QueueEntry {
            item_id: rec.item.item_id.clone(),
            name: rec.item.name.clone(),
            added_by: ActorId::new("system"),
            added_at: rec.assigned_at,
        });
    }

    machine.updated_at = now;
}

/// Choose the slot occupant from the Using assignments: prefer the existing
/// occupant when it is still Using, otherwise the oldest Using assignment.
fn pick_occupant(slot: &Slot, assignments: &[AssignmentRecord]) -> Option<ItemSnapshot> {
    let mut using: Vec<&AssignmentRecord> = assignments
        .iter()
        .filter(|rec| rec.status == AssignmentStatus::Using)
        .collect();
    if using.is_empty() {
        return None;
    }

    if let Some(occ) = &slot.current_item
        && using.iter().any(|rec| rec.item.item_id == occ.item_id)
    {
        return Some(occ.clone());
    }

    using.sort_by_key(|rec| rec.assigned_at);
    using.first().map(|rec| rec.item.clone())
}
