//! Store implementations behind the repository traits.
//!
//! Two backends: an in-memory store for tests/dev and a JSON-file store for
//! small persistent deployments. Which one runs is decided once at startup
//! by [`crate::config::EngineConfig`].

pub mod json;
pub mod memory;

pub use json::JsonFileStore;
pub use memory::InMemoryStore;
