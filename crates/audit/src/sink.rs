use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::info;

use crate::entry::AuditLogEntry;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit append failed: {0}")]
    Append(String),
}

/// Append-only audit sink.
///
/// Implementations must never mutate or delete previously appended entries.
/// Callers treat failures as non-fatal: log and move on.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: AuditLogEntry) -> Result<(), AuditError>;
}

impl<S> AuditSink for Arc<S>
where
    S: AuditSink + ?Sized,
{
    fn append(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        (**self).append(entry)
    }
}

/// In-memory sink for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    entries: Mutex<Vec<AuditLogEntry>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn append(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AuditError::Append("lock poisoned".to_string()))?;
        entries.push(entry);
        Ok(())
    }
}

/// Sink that emits entries as structured log events. Useful when no durable
/// audit store is configured.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn append(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        info!(
            entry_id = %entry.id,
            entity_type = ?entry.entity_type,
            entity_id = %entry.entity_id,
            action = ?entry.action,
            actor = %entry.actor_id,
            details = %serde_json::Value::Object(entry.details.clone()),
            "audit"
        );
        Ok(())
    }
}
