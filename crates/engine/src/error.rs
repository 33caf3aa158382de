//! Engine and store error taxonomy.

use thiserror::Error;

use clawdeck_core::{ItemId, MachineId};

/// Store operation error.
///
/// These are **infrastructure errors** (missing records, backend failures,
/// serialization) as opposed to domain errors (validation, invariants).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend failure: {0}")]
    Backend(String),

    #[error("serialization failure: {0}")]
    Serialization(String),
}

/// Operation-level failure surfaced to engine callers.
///
/// A needs-confirmation outcome is deliberately **not** an error: it is a
/// structured pause signal, returned through `ChangeOutcome`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Out-of-stock promotion attempted without the required capability.
    /// Zero mutation has occurred.
    #[error("access denied: {message}")]
    AccessDenied { message: String },

    /// The item under change does not exist.
    #[error("stock item {0} not found")]
    ItemNotFound(ItemId),

    /// The target machine record does not exist (required when creating a
    /// new assignment).
    #[error("machine {0} not found")]
    MachineNotFound(MachineId),

    /// A read or the primary assignment write failed. No partial state
    /// exists: the assignment list is a single atomic write to one
    /// aggregate.
    #[error("operation failed: {source}")]
    WriteFailure {
        #[source]
        source: StoreError,
    },

    /// The assignment write committed but the slot view update failed — a
    /// genuine inconsistency between the two aggregates. Retry with
    /// `resync_machine`; re-running the reconciler alone converges without
    /// duplicating queue entries.
    #[error("update partially applied to machine {machine_id} - please retry: {source}")]
    PartialSyncFailure {
        machine_id: MachineId,
        #[source]
        source: StoreError,
    },
}

impl EngineError {
    pub(crate) fn write_failure(source: StoreError) -> Self {
        Self::WriteFailure { source }
    }

    pub(crate) fn partial_sync(machine_id: MachineId, source: StoreError) -> Self {
        Self::PartialSyncFailure { machine_id, source }
    }
}
