//! Durable persistence for one scope
//!
//! The whole scope (memories and relations) serializes to a single JSON
//! document. Writes go to a temporary file in the same directory and are
//! renamed over the previous document in one step, so an interrupted
//! process never leaves a half-written store behind.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use mnemo_core::{MemoryRecord, RelationRecord, Result};

use crate::scope::Scope;

/// Everything a scope owns, as persisted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeData {
    #[serde(default)]
    pub memories: BTreeMap<String, MemoryRecord>,
    #[serde(default)]
    pub relations: Vec<RelationRecord>,
}

/// Handle to one scope's on-disk document
pub struct ScopedStore {
    path: PathBuf,
}

impl ScopedStore {
    pub fn new(root: &Path, scope: &Scope) -> Self {
        Self {
            path: scope.storage_file(root),
        }
    }

    /// Read the scope document. A scope that was never persisted is empty,
    /// not an error; an unreadable or corrupt document surfaces as
    /// storage-unavailable.
    pub fn load(&self) -> Result<ScopeData> {
        if !self.path.exists() {
            return Ok(ScopeData::default());
        }
        let bytes = fs::read(&self.path)?;
        let data: ScopeData = serde_json::from_slice(&bytes)?;
        debug!(path = %self.path.display(), "loaded scope document");
        Ok(data)
    }

    /// Write the full scope state durably via atomic replace
    pub fn persist(&self, data: &ScopeData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(data)?)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(
            path = %self.path.display(),
            memories = data.memories.len(),
            relations = data.relations.len(),
            "persisted scope document"
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
