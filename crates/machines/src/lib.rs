//! Machine domain module.
//!
//! Arcade machines and their item-bearing slots, plus the pure slot
//! reconciliation that keeps the machine-centric view in agreement with the
//! item-centric assignment list.

pub mod machine;
pub mod reconcile;

pub use machine::{ArcadeMachine, QueueEntry, Slot};
pub use reconcile::{AssignmentRecord, SlotChange, apply_change, rebuild};
