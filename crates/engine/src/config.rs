//! Engine configuration and startup wiring.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use clawdeck_audit::TracingAuditSink;

use crate::engine::AssignmentEngine;
use crate::error::StoreError;
use crate::store::{InMemoryStore, JsonFileStore};

/// Which store backs the repositories. Chosen once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreBackend {
    /// Volatile store for tests/dev.
    #[default]
    InMemory,
    /// Single JSON document on disk.
    JsonFile { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub backend: StoreBackend,
}

/// Build an engine with repositories selected by configuration.
///
/// The selection happens exactly once here and the implementations are
/// injected into the engine; nothing is referenced through globals. The
/// in-memory backend audits through tracing; the JSON backend keeps its own
/// append-only audit list.
pub fn build_engine(config: &EngineConfig) -> Result<AssignmentEngine, StoreError> {
    match &config.backend {
        StoreBackend::InMemory => {
            let store = Arc::new(InMemoryStore::new());
            Ok(AssignmentEngine::new(
                store.clone(),
                store,
                Arc::new(TracingAuditSink),
            ))
        }
        StoreBackend::JsonFile { path } => {
            let store = Arc::new(JsonFileStore::open(path)?);
            Ok(AssignmentEngine::new(store.clone(), store.clone(), store))
        }
    }
}
