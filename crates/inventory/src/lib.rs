//! Inventory domain module.
//!
//! This crate contains business rules for stock items and their machine
//! assignments, implemented purely as deterministic domain logic (no IO,
//! no HTTP, no storage).

pub mod guard;
pub mod item;
pub mod stock_level;

pub use guard::{
    ConfirmationKind, GuardContext, RequestedChange, TransitionDecision, evaluate,
};
pub use item::{
    AssignmentState, AssignmentStatus, ComputedAssignedStatus, DerivedAssignmentFields,
    ItemSnapshot, MachineAssignment, ReplacementMachineRef, StockItem, StockLocation,
    derive_assignment_fields,
};
pub use stock_level::{StockLevel, StockLevelOverride, classify};
