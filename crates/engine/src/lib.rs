//! `clawdeck-engine` — the machine ↔ stock-item assignment engine.
//!
//! Decides which item is the active occupant of a machine slot, which items
//! are queued as replacements, and under what conditions a status change is
//! allowed, warned, or blocked. One request flows guard → assignment commit
//! → slot reconciliation → best-effort audit; the guard always returns a
//! decision before any store write is issued.

pub mod config;
pub mod engine;
pub mod error;
pub mod repository;
pub mod store;

pub use config::{EngineConfig, StoreBackend, build_engine};
pub use engine::{
    AssignmentEngine, ChangeOutcome, CommitSummary, RemovalRequest, StatusChangeRequest,
};
pub use error::{EngineError, StoreError};
pub use repository::{MachineRepository, StockRepository};
pub use store::{InMemoryStore, JsonFileStore};
