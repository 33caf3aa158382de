use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use clawdeck_core::{ItemId, MachineId};
use clawdeck_inventory::{
    AssignmentStatus, DerivedAssignmentFields, ItemSnapshot, MachineAssignment, StockItem,
};
use clawdeck_machines::{ArcadeMachine, AssignmentRecord, Slot};

use crate::error::StoreError;
use crate::repository::{MachineRepository, StockRepository};

/// In-memory store.
///
/// Intended for tests/dev. Not optimized for performance; a poisoned lock
/// surfaces as a backend error rather than a panic.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    items: RwLock<HashMap<ItemId, StockItem>>,
    machines: RwLock<HashMap<MachineId, ArcadeMachine>>,
    derived: RwLock<HashMap<ItemId, DerivedAssignmentFields>>,
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace an item record.
    pub fn put_item(&self, item: StockItem) -> Result<(), StoreError> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        items.insert(item.id.clone(), item);
        Ok(())
    }

    /// Seed or replace a machine record.
    pub fn put_machine(&self, machine: ArcadeMachine) -> Result<(), StoreError> {
        let mut machines = self.machines.write().map_err(|_| poisoned())?;
        machines.insert(machine.id.clone(), machine);
        Ok(())
    }

    /// Current item record, if any (test inspection).
    pub fn item(&self, item_id: &ItemId) -> Option<StockItem> {
        self.items.read().ok()?.get(item_id).cloned()
    }

    /// Current machine record, if any (test inspection).
    pub fn machine(&self, machine_id: &MachineId) -> Option<ArcadeMachine> {
        self.machines.read().ok()?.get(machine_id).cloned()
    }

    /// Last derived fields written for an item (test inspection).
    pub fn derived_fields(&self, item_id: &ItemId) -> Option<DerivedAssignmentFields> {
        self.derived.read().ok()?.get(item_id).cloned()
    }
}

impl StockRepository for InMemoryStore {
    fn load_item(&self, item_id: &ItemId) -> Result<StockItem, StoreError> {
        let items = self.items.read().map_err(|_| poisoned())?;
        items
            .get(item_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("stock item {item_id}")))
    }

    fn save_assignments(
        &self,
        item_id: &ItemId,
        assignments: &[MachineAssignment],
        derived: &DerivedAssignmentFields,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        let item = items
            .get_mut(item_id)
            .ok_or_else(|| StoreError::NotFound(format!("stock item {item_id}")))?;
        item.assignments = assignments.to_vec();
        item.updated_at = updated_at;

        let mut derived_map = self.derived.write().map_err(|_| poisoned())?;
        derived_map.insert(item_id.clone(), derived.clone());
        Ok(())
    }

    fn find_active_on_machine(
        &self,
        machine_id: &MachineId,
        exclude: &ItemId,
    ) -> Result<Option<ItemSnapshot>, StoreError> {
        let items = self.items.read().map_err(|_| poisoned())?;
        Ok(items
            .values()
            .find(|item| {
                &item.id != exclude
                    && item.assignments.iter().any(|a| {
                        &a.machine_id == machine_id && a.status == AssignmentStatus::Using
                    })
            })
            .map(StockItem::snapshot))
    }

    fn assignments_for_machine(
        &self,
        machine_id: &MachineId,
    ) -> Result<Vec<AssignmentRecord>, StoreError> {
        let items = self.items.read().map_err(|_| poisoned())?;
        let mut records: Vec<AssignmentRecord> = items
            .values()
            .filter_map(|item| {
                item.assignment_for(machine_id).map(|a| AssignmentRecord {
                    item: item.snapshot(),
                    status: a.status,
                    assigned_at: a.assigned_at,
                })
            })
            .collect();
        records.sort_by_key(|rec| rec.assigned_at);
        Ok(records)
    }
}

impl MachineRepository for InMemoryStore {
    fn load_machine(&self, machine_id: &MachineId) -> Result<ArcadeMachine, StoreError> {
        let machines = self.machines.read().map_err(|_| poisoned())?;
        machines
            .get(machine_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("machine {machine_id}")))
    }

    fn save_slots(
        &self,
        machine_id: &MachineId,
        slots: &[Slot],
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut machines = self.machines.write().map_err(|_| poisoned())?;
        let machine = machines
            .get_mut(machine_id)
            .ok_or_else(|| StoreError::NotFound(format!("machine {machine_id}")))?;
        machine.slots = slots.to_vec();
        machine.updated_at = updated_at;
        Ok(())
    }
}
