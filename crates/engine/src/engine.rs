//! Assignment engine orchestration.
//!
//! One request flows guard → assignment commit → slot reconciliation →
//! best-effort audit. The guard always returns its decision before any
//! store write; the assignment list on the item is the source of truth and
//! the machine's slot view is brought into agreement afterwards.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::{info, warn};

use clawdeck_audit::{AuditAction, AuditLogEntry, AuditSink, EntityType};
use clawdeck_auth::{Actor, elevated_roles, has_capability};
use clawdeck_core::{ActorId, ItemId, MachineId};
use clawdeck_inventory::{
    AssignmentState, AssignmentStatus, ConfirmationKind, GuardContext, ItemSnapshot,
    RequestedChange, StockItem, TransitionDecision, derive_assignment_fields, evaluate,
};
use clawdeck_machines::{SlotChange, apply_change, rebuild};

use crate::error::{EngineError, StoreError};
use crate::repository::{MachineRepository, StockRepository};

/// Request to set an item's status on one machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChangeRequest {
    pub item_id: ItemId,
    pub machine_id: MachineId,
    pub new_status: AssignmentStatus,
    /// Set on the second invocation, after the caller has shown the
    /// confirmation prompt and the user agreed.
    pub confirmed: bool,
}

/// Request to delete an item's assignment on one machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalRequest {
    pub item_id: ItemId,
    pub machine_id: MachineId,
    pub confirmed: bool,
}

/// What a committed change did, for the caller's toast and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub item_id: ItemId,
    pub machine_id: MachineId,
    pub machine_name: String,
    pub old_state: AssignmentState,
    pub new_state: AssignmentState,
}

/// Outcome of a change request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeOutcome {
    Committed(CommitSummary),
    /// The caller must re-invoke with `confirmed` once the user agrees.
    /// Nothing has been written.
    NeedsConfirmation {
        kind: ConfirmationKind,
        message: String,
    },
    /// The request already matched current state (including removal of an
    /// assignment that does not exist). Nothing was written or audited.
    NoChange,
}

/// The machine ↔ stock-item assignment engine.
///
/// Repositories and the audit sink are injected once at construction (see
/// [`crate::config::build_engine`]); the engine itself holds no backend
/// knowledge.
pub struct AssignmentEngine {
    stock: Arc<dyn StockRepository>,
    machines: Arc<dyn MachineRepository>,
    audit: Arc<dyn AuditSink>,
}

impl AssignmentEngine {
    pub fn new(
        stock: Arc<dyn StockRepository>,
        machines: Arc<dyn MachineRepository>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            stock,
            machines,
            audit,
        }
    }

    /// Set `new_status` for the item on the machine, running the transition
    /// guard first.
    ///
    /// Re-requesting the current status is a no-op. A `NeedsConfirmation`
    /// outcome writes nothing; re-invoke with `confirmed` set to commit.
    pub fn change_status(
        &self,
        actor: &Actor,
        req: &StatusChangeRequest,
    ) -> Result<ChangeOutcome, EngineError> {
        let mut item = self.load_item(&req.item_id)?;
        let current = item.assignment_state(&req.machine_id);
        if current == AssignmentState::from(Some(req.new_status)) {
            return Ok(ChangeOutcome::NoChange);
        }

        // The conflict probe only matters for promotions; skip the scan
        // otherwise.
        let machine_occupant = if req.new_status == AssignmentStatus::Using {
            self.stock
                .find_active_on_machine(&req.machine_id, &req.item_id)
                .map_err(EngineError::write_failure)?
        } else {
            None
        };

        let ctx = GuardContext {
            stock_level: item.stock_level(),
            actor_is_elevated: has_capability(&actor.roles, &elevated_roles()),
            machine_occupant,
            using_elsewhere: item.using_elsewhere(&req.machine_id),
        };

        let machine_name = self.machine_name_for(&item, &req.machine_id)?;

        match evaluate(current, RequestedChange::SetStatus(req.new_status), &ctx) {
            TransitionDecision::Blocked { message } => {
                warn!(
                    item = %req.item_id,
                    machine = %req.machine_id,
                    actor = %actor.id,
                    "promotion blocked"
                );
                Err(EngineError::AccessDenied { message })
            }
            TransitionDecision::NeedsConfirmation(kind) if !req.confirmed => {
                let message = kind.message(&item.name, &machine_name);
                Ok(ChangeOutcome::NeedsConfirmation { kind, message })
            }
            TransitionDecision::NeedsConfirmation(_) | TransitionDecision::Proceed => self
                .commit_status(actor, &mut item, &req.machine_id, machine_name, req.new_status)
                .map(ChangeOutcome::Committed),
        }
    }

    /// Delete the item's assignment on the machine.
    ///
    /// Removal always asks for confirmation when an assignment exists;
    /// removing an absent assignment is a no-op, so a retried removal never
    /// errors or double-audits.
    pub fn remove_assignment(
        &self,
        actor: &Actor,
        req: &RemovalRequest,
    ) -> Result<ChangeOutcome, EngineError> {
        let mut item = self.load_item(&req.item_id)?;
        let current = item.assignment_state(&req.machine_id);
        if current == AssignmentState::Unassigned {
            return Ok(ChangeOutcome::NoChange);
        }

        let ctx = GuardContext {
            stock_level: item.stock_level(),
            actor_is_elevated: has_capability(&actor.roles, &elevated_roles()),
            machine_occupant: None,
            using_elsewhere: item.using_elsewhere(&req.machine_id),
        };
        if let TransitionDecision::NeedsConfirmation(kind) =
            evaluate(current, RequestedChange::Remove, &ctx)
            && !req.confirmed
        {
            let machine_name = item
                .assignment_for(&req.machine_id)
                .map(|a| a.machine_name.clone())
                .unwrap_or_default();
            let message = kind.message(&item.name, &machine_name);
            return Ok(ChangeOutcome::NeedsConfirmation { kind, message });
        }

        let now = Utc::now();
        let Some(removed) = item.remove_assignment(&req.machine_id) else {
            return Ok(ChangeOutcome::NoChange);
        };
        item.updated_at = now;
        let derived = derive_assignment_fields(&item.assignments);
        self.stock
            .save_assignments(&item.id, &item.assignments, &derived, now)
            .map_err(EngineError::write_failure)?;
        info!(item = %item.id, machine = %req.machine_id, "assignment removed");

        let sync = self.sync_slots(
            &item.snapshot(),
            &req.machine_id,
            SlotChange::Removed,
            &actor.id,
            now,
        );

        let mut details = Map::new();
        details.insert(
            "machineId".into(),
            JsonValue::String(req.machine_id.to_string()),
        );
        details.insert(
            "machineName".into(),
            JsonValue::String(removed.machine_name.clone()),
        );
        details.insert(
            "previousStatus".into(),
            JsonValue::String(removed.status.audit_label().to_string()),
        );
        self.emit_audit(&item.id, AuditAction::Unassign, details, actor, now);

        sync?;

        Ok(ChangeOutcome::Committed(CommitSummary {
            item_id: item.id.clone(),
            machine_id: req.machine_id.clone(),
            machine_name: removed.machine_name,
            old_state: AssignmentState::from(Some(removed.status)),
            new_state: AssignmentState::Unassigned,
        }))
    }

    /// Promote the head of the machine's replacement queue to Using.
    ///
    /// System-initiated: the vacating action already carried its
    /// confirmation, so the promotion commits directly. No queue entry means
    /// nothing to do.
    pub fn promote_next(
        &self,
        actor: &Actor,
        machine_id: &MachineId,
    ) -> Result<ChangeOutcome, EngineError> {
        let machine = match self.machines.load_machine(machine_id) {
            Ok(machine) => machine,
            Err(StoreError::NotFound(_)) => {
                return Err(EngineError::MachineNotFound(machine_id.clone()));
            }
            Err(e) => return Err(EngineError::write_failure(e)),
        };
        let Some(next) = machine.primary_slot().next_in_queue().cloned() else {
            return Ok(ChangeOutcome::NoChange);
        };

        let mut item = self.load_item(&next.item_id)?;
        info!(item = %item.id, machine = %machine_id, "promoting next queued item");
        self.commit_status(
            actor,
            &mut item,
            machine_id,
            machine.name,
            AssignmentStatus::Using,
        )
        .map(ChangeOutcome::Committed)
    }

    /// Recompute the machine's slot view purely from the assignment records
    /// that reference it.
    ///
    /// This is the repair path after a `PartialSyncFailure`; re-running it
    /// converges, so it is safe to retry freely.
    pub fn resync_machine(&self, machine_id: &MachineId) -> Result<(), EngineError> {
        let records = self
            .stock
            .assignments_for_machine(machine_id)
            .map_err(EngineError::write_failure)?;
        let mut machine = match self.machines.load_machine(machine_id) {
            Ok(machine) => machine,
            Err(StoreError::NotFound(_)) => {
                return Err(EngineError::MachineNotFound(machine_id.clone()));
            }
            Err(e) => return Err(EngineError::write_failure(e)),
        };

        let now = Utc::now();
        rebuild(&mut machine, &records, now);
        self.machines
            .save_slots(machine_id, &machine.slots, now)
            .map_err(EngineError::write_failure)?;
        info!(machine = %machine_id, "slot view resynced from assignments");
        Ok(())
    }

    fn load_item(&self, item_id: &ItemId) -> Result<StockItem, EngineError> {
        match self.stock.load_item(item_id) {
            Ok(mut item) => {
                item.dedupe_assignments();
                Ok(item)
            }
            Err(StoreError::NotFound(_)) => Err(EngineError::ItemNotFound(item_id.clone())),
            Err(e) => Err(EngineError::write_failure(e)),
        }
    }

    /// Machine display name for prompts and audit details: taken from the
    /// existing assignment, else the machine record (which must then exist).
    fn machine_name_for(
        &self,
        item: &StockItem,
        machine_id: &MachineId,
    ) -> Result<String, EngineError> {
        if let Some(existing) = item.assignment_for(machine_id) {
            return Ok(existing.machine_name.clone());
        }
        match self.machines.load_machine(machine_id) {
            Ok(machine) => Ok(machine.name),
            Err(StoreError::NotFound(_)) => Err(EngineError::MachineNotFound(machine_id.clone())),
            Err(e) => Err(EngineError::write_failure(e)),
        }
    }

    fn commit_status(
        &self,
        actor: &Actor,
        item: &mut StockItem,
        machine_id: &MachineId,
        machine_name: String,
        new_status: AssignmentStatus,
    ) -> Result<CommitSummary, EngineError> {
        let now = Utc::now();
        let old_state =
            item.upsert_assignment(machine_id.clone(), machine_name.clone(), new_status, now);
        item.updated_at = now;
        let derived = derive_assignment_fields(&item.assignments);
        self.stock
            .save_assignments(&item.id, &item.assignments, &derived, now)
            .map_err(EngineError::write_failure)?;
        info!(
            item = %item.id,
            machine = %machine_id,
            status = ?new_status,
            "assignment status committed"
        );

        let sync = self.sync_slots(
            &item.snapshot(),
            machine_id,
            SlotChange::from(new_status),
            &actor.id,
            now,
        );

        let mut details = Map::new();
        details.insert("machineId".into(), JsonValue::String(machine_id.to_string()));
        details.insert("machineName".into(), JsonValue::String(machine_name.clone()));
        details.insert(
            "oldStatus".into(),
            JsonValue::String(old_state.audit_label().to_string()),
        );
        details.insert(
            "newStatus".into(),
            JsonValue::String(new_status.audit_label().to_string()),
        );
        self.emit_audit(&item.id, AuditAction::StatusChange, details, actor, now);

        sync?;

        Ok(CommitSummary {
            item_id: item.id.clone(),
            machine_id: machine_id.clone(),
            machine_name,
            old_state,
            new_state: AssignmentState::from(Some(new_status)),
        })
    }

    /// Bring the machine's slot view in line with a committed change.
    ///
    /// A missing machine record is tolerated (the assignment list is source
    /// of truth; the slot view is a denormalization). A failed save is the
    /// partial-sync case the caller must surface.
    fn sync_slots(
        &self,
        item: &ItemSnapshot,
        machine_id: &MachineId,
        change: SlotChange,
        actor_id: &ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let mut machine = match self.machines.load_machine(machine_id) {
            Ok(machine) => machine,
            Err(StoreError::NotFound(_)) => {
                warn!(machine = %machine_id, "machine record missing, slot sync skipped");
                return Ok(());
            }
            Err(e) => return Err(EngineError::partial_sync(machine_id.clone(), e)),
        };
        apply_change(&mut machine, item, change, actor_id, now);
        self.machines
            .save_slots(machine_id, &machine.slots, now)
            .map_err(|e| EngineError::partial_sync(machine_id.clone(), e))
    }

    /// Audit is best-effort: an append failure is logged and swallowed, it
    /// never rolls back or fails the committed change.
    fn emit_audit(
        &self,
        item_id: &ItemId,
        action: AuditAction,
        details: Map<String, JsonValue>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) {
        let entry = AuditLogEntry::new(
            EntityType::Stock,
            item_id.to_string(),
            action,
            details,
            actor.id.clone(),
            now,
        );
        if let Err(e) = self.audit.append(entry) {
            warn!(item = %item_id, error = %e, "audit append failed");
        }
    }
}
