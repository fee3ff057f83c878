//! Mnemo Core - records, relations, errors, and the tool layer
//!
//! This crate contains the shared contract between all Mnemo frontends
//! (CLI, agent-runtime bridges, future API server, etc.): the data model,
//! the error taxonomy, and the tool handlers that render plain-text results.

pub mod record;
pub mod tools;

pub use record::{Category, MemoryRecord, RelationRecord, RelationType};
pub use tools::{GraphSnapshot, MemoryBackend, Neighbor, ScopeProvider, ScoredMemory};

/// Errors from memory operations
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("memory not found: '{0}'")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for MemoryError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;
