//! Repository contracts for the two aggregates the engine touches.
//!
//! The assignment list lives on the stock item and the slot view on the
//! machine; they are different aggregates fetched and written independently.
//! Implementations are selected once at startup (see [`crate::config`]) and
//! injected — never referenced through globals.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use clawdeck_core::{ItemId, MachineId};
use clawdeck_inventory::{DerivedAssignmentFields, ItemSnapshot, MachineAssignment, StockItem};
use clawdeck_machines::{ArcadeMachine, AssignmentRecord, Slot};

use crate::error::StoreError;

/// Item-centric assignment store.
pub trait StockRepository: Send + Sync {
    fn load_item(&self, item_id: &ItemId) -> Result<StockItem, StoreError>;

    /// Persist an item's assignment list plus the derived read-side fields
    /// and `updated_at` stamp as one atomic write.
    fn save_assignments(
        &self,
        item_id: &ItemId,
        assignments: &[MachineAssignment],
        derived: &DerivedAssignmentFields,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Some *other* item currently Using on the machine, if any
    /// (conflict probe for promotions).
    fn find_active_on_machine(
        &self,
        machine_id: &MachineId,
        exclude: &ItemId,
    ) -> Result<Option<ItemSnapshot>, StoreError>;

    /// Every assignment referencing the machine (input to the repair pass).
    fn assignments_for_machine(
        &self,
        machine_id: &MachineId,
    ) -> Result<Vec<AssignmentRecord>, StoreError>;
}

/// Machine-centric slot view store.
pub trait MachineRepository: Send + Sync {
    fn load_machine(&self, machine_id: &MachineId) -> Result<ArcadeMachine, StoreError>;

    fn save_slots(
        &self,
        machine_id: &MachineId,
        slots: &[Slot],
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

impl<S> StockRepository for Arc<S>
where
    S: StockRepository + ?Sized,
{
    fn load_item(&self, item_id: &ItemId) -> Result<StockItem, StoreError> {
        (**self).load_item(item_id)
    }

    fn save_assignments(
        &self,
        item_id: &ItemId,
        assignments: &[MachineAssignment],
        derived: &DerivedAssignmentFields,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        (**self).save_assignments(item_id, assignments, derived, updated_at)
    }

    fn find_active_on_machine(
        &self,
        machine_id: &MachineId,
        exclude: &ItemId,
    ) -> Result<Option<ItemSnapshot>, StoreError> {
        (**self).find_active_on_machine(machine_id, exclude)
    }

    fn assignments_for_machine(
        &self,
        machine_id: &MachineId,
    ) -> Result<Vec<AssignmentRecord>, StoreError> {
        (**self).assignments_for_machine(machine_id)
    }
}

impl<M> MachineRepository for Arc<M>
where
    M: MachineRepository + ?Sized,
{
    fn load_machine(&self, machine_id: &MachineId) -> Result<ArcadeMachine, StoreError> {
        (**self).load_machine(machine_id)
    }

    fn save_slots(
        &self,
        machine_id: &MachineId,
        slots: &[Slot],
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        (**self).save_slots(machine_id, slots, updated_at)
    }
}
