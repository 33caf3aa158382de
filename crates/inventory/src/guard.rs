//! Transition guard for assignment status changes.
//!
//! Pure decision logic: the guard is evaluated synchronously against
//! already-fetched state and performs no IO. Callers must obtain a
//! [`TransitionDecision::Proceed`] (or re-invoke with confirmation after a
//! [`TransitionDecision::NeedsConfirmation`]) before any store write.

use serde::{Deserialize, Serialize};

use crate::item::{AssignmentState, AssignmentStatus, ItemSnapshot};
use crate::stock_level::StockLevel;

/// The change a caller is asking for on one (item, machine) pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestedChange {
    SetStatus(AssignmentStatus),
    Remove,
}

/// Already-fetched state the guard decides against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardContext {
    /// Current stock level of the item under change.
    pub stock_level: StockLevel,
    /// Whether the actor holds an elevated role (supervisor override).
    pub actor_is_elevated: bool,
    /// Another item currently Using on the target machine, if any.
    pub machine_occupant: Option<ItemSnapshot>,
    /// Whether this item is already Using on a different machine.
    pub using_elsewhere: bool,
}

/// Which confirmation the caller must supply before the change commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationKind {
    /// Item stock is unhealthy; activating it needs an explicit go-ahead.
    StockWarning { level: StockLevel },
    /// The machine already has a different active item.
    MachineConflict { occupant: ItemSnapshot },
    /// The item would be active on multiple machines at once.
    MultiMachine,
    /// Demoting the active item vacates the machine's slot.
    Demotion,
    /// Deleting the assignment; `vacates_slot` when the item was Using.
    Removal { vacates_slot: bool },
}

impl ConfirmationKind {
    /// Human-readable prompt for the confirmation dialog.
    pub fn message(&self, item_name: &str, machine_name: &str) -> String {
        match self {
            ConfirmationKind::StockWarning { level } => format!(
                "{item_name} has {}. Are you sure you want to set it as active on {machine_name}?",
                level.label().to_lowercase()
            ),
            ConfirmationKind::MachineConflict { occupant } => format!(
                "{machine_name} already has {} as its active item. Setting {item_name} as \
                 \"Using\" will make both items active on the same machine.",
                occupant.name
            ),
            ConfirmationKind::MultiMachine => format!(
                "{item_name} is already set as \"Using\" on another machine. Setting \
                 {machine_name} to \"Using\" will make it active on multiple machines \
                 simultaneously."
            ),
            ConfirmationKind::Demotion => format!(
                "{item_name} will remain assigned to {machine_name} but will no longer be \
                 the active item."
            ),
            ConfirmationKind::Removal { vacates_slot } => {
                let mut msg =
                    format!("Are you sure you want to remove {item_name} from {machine_name}?");
                if *vacates_slot {
                    msg.push_str(
                        " This item is currently active on this machine. Removing it will \
                         leave the machine without an active item.",
                    );
                }
                msg
            }
        }
    }
}

/// Outcome of guard evaluation. No mutation may happen unless the decision
/// is `Proceed` (directly, or after the caller confirms).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionDecision {
    Proceed,
    Blocked { message: String },
    NeedsConfirmation(ConfirmationKind),
}

/// Evaluate a requested change against the current assignment state.
///
/// Checks run in a fixed priority order, most operationally severe first:
/// stock gate (with role escalation for out-of-stock), then machine
/// conflict, then multi-machine activation. Total over all three states,
/// including the never-persisted `Unassigned`.
pub fn evaluate(
    current: AssignmentState,
    requested: RequestedChange,
    ctx: &GuardContext,
) -> TransitionDecision {
    match (requested, current) {
        (RequestedChange::Remove, AssignmentState::Unassigned) => {
            // Nothing to delete; the caller treats this as a no-op.
            TransitionDecision::Proceed
        }
        (RequestedChange::Remove, state) => {
            TransitionDecision::NeedsConfirmation(ConfirmationKind::Removal {
                vacates_slot: state == AssignmentState::Using,
            })
        }
        // Re-requesting the current status is not a transition.
        (RequestedChange::SetStatus(AssignmentStatus::Using), AssignmentState::Using)
        | (
            RequestedChange::SetStatus(AssignmentStatus::Replacement),
            AssignmentState::Replacement,
        ) => TransitionDecision::Proceed,
        (RequestedChange::SetStatus(AssignmentStatus::Using), _) => evaluate_promotion(ctx),
        (RequestedChange::SetStatus(AssignmentStatus::Replacement), AssignmentState::Using) => {
            // Demoting vacates the machine's active slot; never silent.
            TransitionDecision::NeedsConfirmation(ConfirmationKind::Demotion)
        }
        (RequestedChange::SetStatus(AssignmentStatus::Replacement), AssignmentState::Unassigned) => {
            TransitionDecision::Proceed
        }
    }
}

fn evaluate_promotion(ctx: &GuardContext) -> TransitionDecision {
    match ctx.stock_level {
        StockLevel::OutOfStock if !ctx.actor_is_elevated => TransitionDecision::Blocked {
            message: "This item is out of stock. Only supervisors can set out-of-stock items \
                      as active."
                .to_string(),
        },
        StockLevel::OutOfStock => {
            TransitionDecision::NeedsConfirmation(ConfirmationKind::StockWarning {
                level: StockLevel::OutOfStock,
            })
        }
        level if level.warns_on_activation() => {
            TransitionDecision::NeedsConfirmation(ConfirmationKind::StockWarning { level })
        }
        _ => {
            if let Some(occupant) = &ctx.machine_occupant {
                TransitionDecision::NeedsConfirmation(ConfirmationKind::MachineConflict {
                    occupant: occupant.clone(),
                })
            } else if ctx.using_elsewhere {
                TransitionDecision::NeedsConfirmation(ConfirmationKind::MultiMachine)
            } else {
                TransitionDecision::Proceed
            }
        }
    }
}
