//! End-to-end assignment flows against the in-memory backend.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use clawdeck_audit::{AuditAction, InMemoryAuditSink};
use clawdeck_auth::{Actor, Role};
use clawdeck_core::{ActorId, ItemId, MachineId};
use clawdeck_engine::{
    AssignmentEngine, ChangeOutcome, EngineError, InMemoryStore, MachineRepository,
    RemovalRequest, StatusChangeRequest, StoreError,
};
use clawdeck_inventory::{
    AssignmentState, AssignmentStatus, ComputedAssignedStatus, ConfirmationKind, StockItem,
    StockLevel,
};
use clawdeck_machines::{ArcadeMachine, Slot};

fn crew() -> Actor {
    Actor::new(ActorId::new("crew@example.com"), "Crew", HashSet::new())
}

fn manager() -> Actor {
    let mut roles = HashSet::new();
    roles.insert(Role::new("manager"));
    Actor::new(ActorId::new("mgr@example.com"), "Manager", roles)
}

fn item(id: &str, name: &str, quantity: u32, threshold: u32, now: DateTime<Utc>) -> StockItem {
    let mut item = StockItem::new(ItemId::new(id), name, threshold, now).expect("valid item");
    item.total_quantity = Some(quantity);
    item
}

fn build(store: &Arc<InMemoryStore>) -> (AssignmentEngine, Arc<InMemoryAuditSink>) {
    clawdeck_observability::init();
    let audit = Arc::new(InMemoryAuditSink::new());
    (
        AssignmentEngine::new(store.clone(), store.clone(), audit.clone()),
        audit,
    )
}

fn set_status(id: &str, machine: &str, status: AssignmentStatus, confirmed: bool) -> StatusChangeRequest {
    StatusChangeRequest {
        item_id: ItemId::new(id),
        machine_id: MachineId::new(machine),
        new_status: status,
        confirmed,
    }
}

fn removal(id: &str, machine: &str, confirmed: bool) -> RemovalRequest {
    RemovalRequest {
        item_id: ItemId::new(id),
        machine_id: MachineId::new(machine),
        confirmed,
    }
}

#[test]
fn out_of_stock_promotion_is_denied_without_an_elevated_role() {
    let store = Arc::new(InMemoryStore::new());
    let now = Utc::now();
    store.put_item(item("itm_1", "Plush Bear", 0, 5, now)).expect("seed");
    store
        .put_machine(ArcadeMachine::single_slot(MachineId::new("M-12"), "Crane 12", now).expect("machine"))
        .expect("seed");
    let (engine, audit) = build(&store);

    let err = engine
        .change_status(&crew(), &set_status("itm_1", "M-12", AssignmentStatus::Using, false))
        .expect_err("must be denied");
    assert!(matches!(err, EngineError::AccessDenied { .. }));

    // Zero mutation: no assignment, no slot occupant, no audit entry.
    let after = store.item(&ItemId::new("itm_1")).expect("item");
    assert!(after.assignments.is_empty());
    let machine = store.machine(&MachineId::new("M-12")).expect("machine");
    assert!(machine.primary_slot().current_item.is_none());
    assert!(audit.entries().is_empty());
}

#[test]
fn out_of_stock_promotion_by_a_manager_warns_then_commits() {
    let store = Arc::new(InMemoryStore::new());
    let now = Utc::now();
    store.put_item(item("itm_1", "Plush Bear", 0, 5, now)).expect("seed");
    store
        .put_machine(ArcadeMachine::single_slot(MachineId::new("M-12"), "Crane 12", now).expect("machine"))
        .expect("seed");
    let (engine, _) = build(&store);

    let first = engine
        .change_status(&manager(), &set_status("itm_1", "M-12", AssignmentStatus::Using, false))
        .expect("evaluate");
    assert!(matches!(
        first,
        ChangeOutcome::NeedsConfirmation {
            kind: ConfirmationKind::StockWarning {
                level: StockLevel::OutOfStock
            },
            ..
        }
    ));

    let second = engine
        .change_status(&manager(), &set_status("itm_1", "M-12", AssignmentStatus::Using, true))
        .expect("commit");
    assert!(matches!(second, ChangeOutcome::Committed(_)));
}

#[test]
fn low_stock_promotion_warns_then_commits_and_audits_once() {
    let store = Arc::new(InMemoryStore::new());
    let now = Utc::now();
    // quantity 3 with threshold 5: low stock.
    store.put_item(item("itm_1", "Plush Bear", 3, 5, now)).expect("seed");
    store
        .put_machine(ArcadeMachine::single_slot(MachineId::new("M-12"), "Crane 12", now).expect("machine"))
        .expect("seed");
    let (engine, audit) = build(&store);

    let first = engine
        .change_status(&manager(), &set_status("itm_1", "M-12", AssignmentStatus::Using, false))
        .expect("evaluate");
    match &first {
        ChangeOutcome::NeedsConfirmation { kind, message } => {
            assert_eq!(
                kind,
                &ConfirmationKind::StockWarning {
                    level: StockLevel::LowStock
                }
            );
            assert!(message.contains("Plush Bear"));
            assert!(message.contains("Crane 12"));
        }
        other => panic!("expected a stock warning, got {other:?}"),
    }
    // Nothing written yet.
    assert!(store.item(&ItemId::new("itm_1")).expect("item").assignments.is_empty());
    assert!(audit.entries().is_empty());

    let second = engine
        .change_status(&manager(), &set_status("itm_1", "M-12", AssignmentStatus::Using, true))
        .expect("commit");
    match second {
        ChangeOutcome::Committed(summary) => {
            assert_eq!(summary.old_state, AssignmentState::Unassigned);
            assert_eq!(summary.new_state, AssignmentState::Using);
        }
        other => panic!("expected a commit, got {other:?}"),
    }

    let after = store.item(&ItemId::new("itm_1")).expect("item");
    assert_eq!(
        after.assignment_state(&MachineId::new("M-12")),
        AssignmentState::Using
    );
    let machine = store.machine(&MachineId::new("M-12")).expect("machine");
    assert!(machine.primary_slot().is_current(&ItemId::new("itm_1")));

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::StatusChange);
    assert_eq!(entries[0].entity_id, "itm_1");
    assert_eq!(
        entries[0].details.get("newStatus"),
        Some(&serde_json::json!("Assigned"))
    );

    let derived = store.derived_fields(&ItemId::new("itm_1")).expect("derived");
    assert_eq!(derived.assigned_status, ComputedAssignedStatus::Assigned);
    assert_eq!(derived.primary_machine_id, Some(MachineId::new("M-12")));
}

#[test]
fn machine_conflict_names_the_occupant_and_keeps_it_assigned_after_confirm() {
    let store = Arc::new(InMemoryStore::new());
    let now = Utc::now();
    let mut occupant = item("itm_x", "Plush Dragon", 40, 5, now);
    occupant.upsert_assignment(MachineId::new("M-7"), "Crane 7", AssignmentStatus::Using, now);
    store.put_item(occupant).expect("seed");
    store.put_item(item("itm_y", "Plush Duck", 40, 5, now)).expect("seed");
    let mut machine =
        ArcadeMachine::single_slot(MachineId::new("M-7"), "Crane 7", now).expect("machine");
    machine.primary_slot_mut().current_item = Some(
        store.item(&ItemId::new("itm_x")).expect("item").snapshot(),
    );
    store.put_machine(machine).expect("seed");
    let (engine, _) = build(&store);

    let first = engine
        .change_status(&crew(), &set_status("itm_y", "M-7", AssignmentStatus::Using, false))
        .expect("evaluate");
    match &first {
        ChangeOutcome::NeedsConfirmation { kind, message } => {
            assert!(matches!(kind, ConfirmationKind::MachineConflict { occupant } if occupant.name == "Plush Dragon"));
            assert!(message.contains("Plush Dragon"));
        }
        other => panic!("expected a machine conflict, got {other:?}"),
    }

    let second = engine
        .change_status(&crew(), &set_status("itm_y", "M-7", AssignmentStatus::Using, true))
        .expect("commit");
    assert!(matches!(second, ChangeOutcome::Committed(_)));

    // The slot flips to the new item; the old occupant's own assignment is
    // not touched (it stays Using until someone changes it).
    let machine = store.machine(&MachineId::new("M-7")).expect("machine");
    assert!(machine.primary_slot().is_current(&ItemId::new("itm_y")));
    let old = store.item(&ItemId::new("itm_x")).expect("item");
    assert_eq!(
        old.assignment_state(&MachineId::new("M-7")),
        AssignmentState::Using
    );
}

#[test]
fn multi_machine_activation_confirms_and_keeps_both_using() {
    let store = Arc::new(InMemoryStore::new());
    let now = Utc::now();
    let mut bear = item("itm_1", "Plush Bear", 40, 5, now);
    bear.upsert_assignment(MachineId::new("M-1"), "Crane 1", AssignmentStatus::Using, now);
    store.put_item(bear).expect("seed");
    store
        .put_machine(ArcadeMachine::single_slot(MachineId::new("M-2"), "Crane 2", now).expect("machine"))
        .expect("seed");
    let (engine, _) = build(&store);

    let first = engine
        .change_status(&crew(), &set_status("itm_1", "M-2", AssignmentStatus::Using, false))
        .expect("evaluate");
    assert!(matches!(
        first,
        ChangeOutcome::NeedsConfirmation {
            kind: ConfirmationKind::MultiMachine,
            ..
        }
    ));

    engine
        .change_status(&crew(), &set_status("itm_1", "M-2", AssignmentStatus::Using, true))
        .expect("commit");

    let after = store.item(&ItemId::new("itm_1")).expect("item");
    assert_eq!(after.assignment_state(&MachineId::new("M-1")), AssignmentState::Using);
    assert_eq!(after.assignment_state(&MachineId::new("M-2")), AssignmentState::Using);
}

#[test]
fn demotion_confirms_then_queues_behind_earlier_replacements() {
    let store = Arc::new(InMemoryStore::new());
    let now = Utc::now();
    let mut bear = item("itm_1", "Plush Bear", 40, 5, now);
    bear.upsert_assignment(MachineId::new("M-7"), "Crane 7", AssignmentStatus::Using, now);
    store.put_item(bear).expect("seed");
    store.put_item(item("itm_2", "Plush Duck", 40, 5, now)).expect("seed");
    store
        .put_machine(ArcadeMachine::single_slot(MachineId::new("M-7"), "Crane 7", now).expect("machine"))
        .expect("seed");
    let (engine, _) = build(&store);

    // Queue the duck first, then demote the bear.
    engine
        .change_status(&crew(), &set_status("itm_2", "M-7", AssignmentStatus::Replacement, false))
        .expect("queue duck");

    let first = engine
        .change_status(&crew(), &set_status("itm_1", "M-7", AssignmentStatus::Replacement, false))
        .expect("evaluate");
    assert!(matches!(
        first,
        ChangeOutcome::NeedsConfirmation {
            kind: ConfirmationKind::Demotion,
            ..
        }
    ));

    engine
        .change_status(&crew(), &set_status("itm_1", "M-7", AssignmentStatus::Replacement, true))
        .expect("commit");

    let machine = store.machine(&MachineId::new("M-7")).expect("machine");
    let slot = machine.primary_slot();
    assert!(slot.current_item.is_none());
    let order: Vec<&str> = slot.upcoming_queue.iter().map(|e| e.item_id.as_str()).collect();
    assert_eq!(order, vec!["itm_2", "itm_1"]);
}

#[test]
fn removal_of_the_active_item_warns_about_vacating_the_slot() {
    let store = Arc::new(InMemoryStore::new());
    let now = Utc::now();
    let mut bear = item("itm_1", "Plush Bear", 40, 5, now);
    bear.upsert_assignment(MachineId::new("M-7"), "Crane 7", AssignmentStatus::Using, now);
    store.put_item(bear).expect("seed");
    let mut machine =
        ArcadeMachine::single_slot(MachineId::new("M-7"), "Crane 7", now).expect("machine");
    machine.primary_slot_mut().current_item = Some(
        store.item(&ItemId::new("itm_1")).expect("item").snapshot(),
    );
    store.put_machine(machine).expect("seed");
    let (engine, audit) = build(&store);

    let first = engine
        .remove_assignment(&crew(), &removal("itm_1", "M-7", false))
        .expect("evaluate");
    match &first {
        ChangeOutcome::NeedsConfirmation { kind, message } => {
            assert_eq!(kind, &ConfirmationKind::Removal { vacates_slot: true });
            assert!(message.contains("without an active item"));
        }
        other => panic!("expected a removal confirmation, got {other:?}"),
    }

    let second = engine
        .remove_assignment(&crew(), &removal("itm_1", "M-7", true))
        .expect("commit");
    match second {
        ChangeOutcome::Committed(summary) => {
            assert_eq!(summary.old_state, AssignmentState::Using);
            assert_eq!(summary.new_state, AssignmentState::Unassigned);
        }
        other => panic!("expected a commit, got {other:?}"),
    }

    // No status is persisted for "unassigned"; the record is gone.
    let after = store.item(&ItemId::new("itm_1")).expect("item");
    assert!(after.assignments.is_empty());
    let machine = store.machine(&MachineId::new("M-7")).expect("machine");
    assert!(machine.primary_slot().current_item.is_none());

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::Unassign);
    assert_eq!(
        entries[0].details.get("previousStatus"),
        Some(&serde_json::json!("Assigned"))
    );

    // Retrying the removal is a no-op, not an error, and does not audit
    // again.
    let retry = engine
        .remove_assignment(&crew(), &removal("itm_1", "M-7", true))
        .expect("retry");
    assert_eq!(retry, ChangeOutcome::NoChange);
    assert_eq!(audit.entries().len(), 1);
}

#[test]
fn promote_next_activates_the_queue_head() {
    let store = Arc::new(InMemoryStore::new());
    let now = Utc::now();
    store.put_item(item("itm_1", "Plush Bear", 40, 5, now)).expect("seed");
    store
        .put_machine(ArcadeMachine::single_slot(MachineId::new("M-7"), "Crane 7", now).expect("machine"))
        .expect("seed");
    let (engine, _) = build(&store);

    engine
        .change_status(&crew(), &set_status("itm_1", "M-7", AssignmentStatus::Replacement, false))
        .expect("queue");

    let outcome = engine
        .promote_next(&crew(), &MachineId::new("M-7"))
        .expect("promote");
    assert!(matches!(outcome, ChangeOutcome::Committed(_)));

    let machine = store.machine(&MachineId::new("M-7")).expect("machine");
    let slot = machine.primary_slot();
    assert!(slot.is_current(&ItemId::new("itm_1")));
    assert!(slot.upcoming_queue.is_empty());
    let after = store.item(&ItemId::new("itm_1")).expect("item");
    assert_eq!(after.assignment_state(&MachineId::new("M-7")), AssignmentState::Using);
}

/// Machine repository wrapper whose slot saves fail, to exercise the
/// partial-sync path.
struct FailingSlotSaves {
    inner: Arc<InMemoryStore>,
}

impl MachineRepository for FailingSlotSaves {
    fn load_machine(&self, machine_id: &MachineId) -> Result<ArcadeMachine, StoreError> {
        self.inner.load_machine(machine_id)
    }

    fn save_slots(
        &self,
        _machine_id: &MachineId,
        _slots: &[Slot],
        _updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        Err(StoreError::Backend("disk full".to_string()))
    }
}

#[test]
fn failed_slot_sync_keeps_the_commit_and_resync_repairs_the_machine() {
    let store = Arc::new(InMemoryStore::new());
    let now = Utc::now();
    store.put_item(item("itm_1", "Plush Bear", 40, 5, now)).expect("seed");
    store
        .put_machine(ArcadeMachine::single_slot(MachineId::new("M-7"), "Crane 7", now).expect("machine"))
        .expect("seed");

    let audit = Arc::new(InMemoryAuditSink::new());
    let failing = Arc::new(FailingSlotSaves { inner: store.clone() });
    let engine = AssignmentEngine::new(store.clone(), failing, audit.clone());

    let err = engine
        .change_status(&crew(), &set_status("itm_1", "M-7", AssignmentStatus::Using, false))
        .expect_err("slot sync must fail");
    assert!(matches!(err, EngineError::PartialSyncFailure { .. }));

    // The assignment committed and was audited exactly once; only the slot
    // view is stale.
    let after = store.item(&ItemId::new("itm_1")).expect("item");
    assert_eq!(after.assignment_state(&MachineId::new("M-7")), AssignmentState::Using);
    assert_eq!(audit.entries().len(), 1);
    let machine = store.machine(&MachineId::new("M-7")).expect("machine");
    assert!(machine.primary_slot().current_item.is_none());

    // Repair through an engine whose machine repository works again.
    let repaired = AssignmentEngine::new(store.clone(), store.clone(), audit.clone());
    repaired.resync_machine(&MachineId::new("M-7")).expect("resync");

    let machine = store.machine(&MachineId::new("M-7")).expect("machine");
    assert!(machine.primary_slot().is_current(&ItemId::new("itm_1")));
    // Resync converges; running it again changes nothing.
    repaired.resync_machine(&MachineId::new("M-7")).expect("resync again");
    let again = store.machine(&MachineId::new("M-7")).expect("machine");
    assert_eq!(again.slots, machine.slots);
}

#[test]
fn replacement_on_a_fresh_machine_proceeds_without_prompts() {
    let store = Arc::new(InMemoryStore::new());
    let now = Utc::now();
    store.put_item(item("itm_1", "Plush Bear", 40, 5, now)).expect("seed");
    store
        .put_machine(ArcadeMachine::single_slot(MachineId::new("M-7"), "Crane 7", now).expect("machine"))
        .expect("seed");
    let (engine, audit) = build(&store);

    let outcome = engine
        .change_status(&crew(), &set_status("itm_1", "M-7", AssignmentStatus::Replacement, false))
        .expect("commit");
    assert!(matches!(outcome, ChangeOutcome::Committed(_)));

    let machine = store.machine(&MachineId::new("M-7")).expect("machine");
    assert_eq!(machine.primary_slot().upcoming_queue.len(), 1);
    let derived = store.derived_fields(&ItemId::new("itm_1")).expect("derived");
    assert_eq!(
        derived.assigned_status,
        ComputedAssignedStatus::AssignedForReplacement
    );
    assert_eq!(derived.replacement_machines.len(), 1);
    assert_eq!(audit.entries().len(), 1);
}
