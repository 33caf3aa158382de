//! `clawdeck-audit` — append-only audit trail.
//!
//! Best-effort by design: an audit write failure is logged and swallowed by
//! callers, never rolled back into the mutation that already committed.

pub mod entry;
pub mod sink;

pub use entry::{AuditAction, AuditEntryId, AuditLogEntry, EntityType};
pub use sink::{AuditError, AuditSink, InMemoryAuditSink, TracingAuditSink};
