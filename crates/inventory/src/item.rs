use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clawdeck_core::{DomainError, DomainResult, ItemId, MachineId};

use crate::stock_level::{StockLevel, StockLevelOverride, classify};

/// One named storage location holding part of an item's quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLocation {
    pub name: String,
    pub quantity: u32,
}

/// Assignment status of an item on one machine.
///
/// "Unassigned" is deliberately not a variant: it is the absence of a
/// [`MachineAssignment`] record and never gets persisted. Use
/// [`AssignmentState`] where totality over all three states is needed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignmentStatus {
    Using,
    Replacement,
}

impl AssignmentStatus {
    /// Label used in audit details ("Assigned" / "Assigned for Replacement"),
    /// not the raw enum token.
    pub fn audit_label(self) -> &'static str {
        match self {
            AssignmentStatus::Using => "Assigned",
            AssignmentStatus::Replacement => "Assigned for Replacement",
        }
    }
}

/// Total view over an (item, machine) pair including the implicit
/// not-assigned state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignmentState {
    Using,
    Replacement,
    Unassigned,
}

impl AssignmentState {
    pub fn audit_label(self) -> &'static str {
        match self {
            AssignmentState::Using => "Assigned",
            AssignmentState::Replacement => "Assigned for Replacement",
            AssignmentState::Unassigned => "Not Assigned",
        }
    }
}

impl From<Option<AssignmentStatus>> for AssignmentState {
    fn from(value: Option<AssignmentStatus>) -> Self {
        match value {
            Some(AssignmentStatus::Using) => AssignmentState::Using,
            Some(AssignmentStatus::Replacement) => AssignmentState::Replacement,
            None => AssignmentState::Unassigned,
        }
    }
}

/// An item's assignment to one machine.
///
/// Invariant (kept by [`StockItem`]): at most one assignment per machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineAssignment {
    pub machine_id: MachineId,
    pub machine_name: String,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
}

/// A by-value snapshot of an item, used where another aggregate references
/// it (slot occupancy, conflict reporting) without loading the full record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub item_id: ItemId,
    pub name: String,
}

/// Stock item record.
///
/// Owned by the inventory subsystem; the assignment engine mutates only the
/// assignment list and `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    pub id: ItemId,
    pub name: String,
    pub locations: Vec<StockLocation>,
    /// Explicit total, consulted only when no locations are recorded.
    pub total_quantity: Option<u32>,
    pub low_stock_threshold: u32,
    pub stock_level_override: Option<StockLevelOverride>,
    pub assignments: Vec<MachineAssignment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockItem {
    pub fn new(
        id: ItemId,
        name: impl Into<String>,
        low_stock_threshold: u32,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            locations: Vec::new(),
            total_quantity: None,
            low_stock_threshold,
            stock_level_override: None,
            assignments: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Units on hand: sum of location quantities, falling back to the
    /// explicit total when no locations are recorded.
    pub fn quantity_on_hand(&self) -> u32 {
        if self.locations.is_empty() {
            self.total_quantity.unwrap_or(0)
        } else {
            self.locations
                .iter()
                .fold(0u32, |acc, loc| acc.saturating_add(loc.quantity))
        }
    }

    pub fn stock_level(&self) -> StockLevel {
        classify(
            self.quantity_on_hand(),
            self.low_stock_threshold,
            self.stock_level_override,
        )
    }

    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            item_id: self.id.clone(),
            name: self.name.clone(),
        }
    }

    pub fn assignment_for(&self, machine_id: &MachineId) -> Option<&MachineAssignment> {
        self.assignments.iter().find(|a| &a.machine_id == machine_id)
    }

    pub fn assignment_state(&self, machine_id: &MachineId) -> AssignmentState {
        self.assignment_for(machine_id).map(|a| a.status).into()
    }

    /// The active (Using) assignment, if any.
    pub fn primary_assignment(&self) -> Option<&MachineAssignment> {
        self.assignments
            .iter()
            .find(|a| a.status == AssignmentStatus::Using)
    }

    pub fn replacement_assignments(&self) -> impl Iterator<Item = &MachineAssignment> {
        self.assignments
            .iter()
            .filter(|a| a.status == AssignmentStatus::Replacement)
    }

    /// Whether the item is Using on some machine other than `machine_id`.
    pub fn using_elsewhere(&self, machine_id: &MachineId) -> bool {
        self.assignments
            .iter()
            .any(|a| a.status == AssignmentStatus::Using && &a.machine_id != machine_id)
    }

    /// Set the status for a machine, creating the assignment when absent.
    /// Returns the prior state. The one-assignment-per-machine invariant is
    /// preserved: an existing entry is updated in place.
    pub fn upsert_assignment(
        &mut self,
        machine_id: MachineId,
        machine_name: impl Into<String>,
        status: AssignmentStatus,
        now: DateTime<Utc>,
    ) -> AssignmentState {
        if let Some(existing) = self
            .assignments
            .iter_mut()
            .find(|a| a.machine_id == machine_id)
        {
            let prior = AssignmentState::from(Some(existing.status));
            existing.status = status;
            prior
        } else {
            self.assignments.push(MachineAssignment {
                machine_id,
                machine_name: machine_name.into(),
                status,
                assigned_at: now,
            });
            AssignmentState::Unassigned
        }
    }

    /// Delete the assignment for a machine entirely (no status is persisted
    /// for "unassigned"). Returns the removed entry, if there was one.
    pub fn remove_assignment(&mut self, machine_id: &MachineId) -> Option<MachineAssignment> {
        let idx = self
            .assignments
            .iter()
            .position(|a| &a.machine_id == machine_id)?;
        Some(self.assignments.remove(idx))
    }

    /// Drop duplicate assignments for the same machine, keeping the first.
    /// Records written by older clients occasionally carry duplicates.
    pub fn dedupe_assignments(&mut self) {
        let mut seen: Vec<MachineId> = Vec::with_capacity(self.assignments.len());
        self.assignments.retain(|a| {
            if seen.contains(&a.machine_id) {
                false
            } else {
                seen.push(a.machine_id.clone());
                true
            }
        });
    }
}

/// Overall assigned status computed from the assignment list.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComputedAssignedStatus {
    #[serde(rename = "Not Assigned")]
    NotAssigned,
    #[serde(rename = "Assigned")]
    Assigned,
    #[serde(rename = "Assigned for Replacement")]
    AssignedForReplacement,
}

impl ComputedAssignedStatus {
    pub fn label(self) -> &'static str {
        match self {
            ComputedAssignedStatus::NotAssigned => "Not Assigned",
            ComputedAssignedStatus::Assigned => "Assigned",
            ComputedAssignedStatus::AssignedForReplacement => "Assigned for Replacement",
        }
    }
}

/// Reference to a machine queued for replacement (denormalized form).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementMachineRef {
    pub id: MachineId,
    pub name: String,
}

/// Denormalized fields derived from the assignment list, written alongside
/// every assignment save so read-side consumers stay consistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAssignmentFields {
    pub assigned_status: ComputedAssignedStatus,
    pub primary_machine_id: Option<MachineId>,
    pub primary_machine_name: Option<String>,
    pub replacement_machines: Vec<ReplacementMachineRef>,
}

/// Compute the denormalized assignment fields.
///
/// The primary machine is the Using assignment when one exists, otherwise
/// the first assignment in list order.
pub fn derive_assignment_fields(assignments: &[MachineAssignment]) -> DerivedAssignmentFields {
    let assigned_status = if assignments.is_empty() {
        ComputedAssignedStatus::NotAssigned
    } else if assignments
        .iter()
        .any(|a| a.status == AssignmentStatus::Using)
    {
        ComputedAssignedStatus::Assigned
    } else {
        ComputedAssignedStatus::AssignedForReplacement
    };

    let primary = assignments
        .iter()
        .find(|a| a.status == AssignmentStatus::Using)
        .or_else(|| assignments.first());

    DerivedAssignmentFields {
        assigned_status,
        primary_machine_id: primary.map(|a| a.machine_id.clone()),
        primary_machine_name: primary.map(|a| a.machine_name.clone()),
        replacement_machines: assignments
            .iter()
            .filter(|a| a.status == AssignmentStatus::Replacement)
            .map(|a| ReplacementMachineRef {
                id: a.machine_id.clone(),
                name: a.machine_name.clone(),
            })
            .collect(),
    }
}
