use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clawdeck_audit::{AuditError, AuditLogEntry, AuditSink};
use clawdeck_core::{ItemId, MachineId};
use clawdeck_inventory::{
    AssignmentStatus, DerivedAssignmentFields, ItemSnapshot, MachineAssignment, StockItem,
};
use clawdeck_machines::{ArcadeMachine, AssignmentRecord, Slot};

use crate::error::StoreError;
use crate::repository::{MachineRepository, StockRepository};

/// Serialized document layout. The audit list is append-only.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    items: HashMap<ItemId, StockItem>,
    #[serde(default)]
    machines: HashMap<MachineId, ArcadeMachine>,
    #[serde(default)]
    derived: HashMap<ItemId, DerivedAssignmentFields>,
    #[serde(default)]
    audit: Vec<AuditLogEntry>,
}

/// JSON-file-backed store.
///
/// The whole state is one document: loaded at open, rewritten (write to a
/// temp file, then rename) on every mutation. Suited to the small
/// single-operator deployments this system runs in; swap the repository
/// implementation for anything bigger.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: RwLock<StoreState>,
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => {
                return Err(StoreError::Backend(format!("{}: {e}", path.display())));
            }
        };
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, state: &StoreState) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &bytes)
            .map_err(|e| StoreError::Backend(format!("{}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| StoreError::Backend(format!("{}: {e}", self.path.display())))
    }

    /// Seed or replace an item record.
    pub fn put_item(&self, item: StockItem) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.items.insert(item.id.clone(), item);
        self.persist(&state)
    }

    /// Seed or replace a machine record.
    pub fn put_machine(&self, machine: ArcadeMachine) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.machines.insert(machine.id.clone(), machine);
        self.persist(&state)
    }

    /// All audit entries appended so far, oldest first.
    pub fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.state
            .read()
            .map(|state| state.audit.clone())
            .unwrap_or_default()
    }
}

impl StockRepository for JsonFileStore {
    fn load_item(&self, item_id: &ItemId) -> Result<StockItem, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        state
            .items
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
        let mut state = self.state.write().map_err(|_| poisoned())?;
        let item = state
            .items
            .get_mut(item_id)
            .ok_or_else(|| StoreError::NotFound(format!("stock item {item_id}")))?;
        item.assignments = assignments.to_vec();
        item.updated_at = updated_at;
        state.derived.insert(item_id.clone(), derived.clone());
        self.persist(&state)
    }

    fn find_active_on_machine(
        &self,
        machine_id: &MachineId,
        exclude: &ItemId,
    ) -> Result<Option<ItemSnapshot>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .items
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
        let state = self.state.read().map_err(|_| poisoned())?;
        let mut records: Vec<AssignmentRecord> = state
            .items
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

impl MachineRepository for JsonFileStore {
    fn load_machine(&self, machine_id: &MachineId) -> Result<ArcadeMachine, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        state
            .machines
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
        let mut state = self.state.write().map_err(|_| poisoned())?;
        let machine = state
            .machines
            .get_mut(machine_id)
            .ok_or_else(|| StoreError::NotFound(format!("machine {machine_id}")))?;
        machine.slots = slots.to_vec();
        machine.updated_at = updated_at;
        self.persist(&state)
    }
}

impl AuditSink for JsonFileStore {
    fn append(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| AuditError::Append("lock poisoned".to_string()))?;
        state.audit.push(entry);
        self.persist(&state)
            .map_err(|e| AuditError::Append(e.to_string()))
    }
}
