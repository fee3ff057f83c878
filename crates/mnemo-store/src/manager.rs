//! The memory manager and the scope registry
//!
//! One manager per resolved scope. The manager is the serialization
//! point: mutating operations hold the scope mutex, validate before
//! touching anything, and roll the in-memory state back if the persist
//! fails, so memory and disk never drift apart.

use std::collections::btree_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info};

use mnemo_core::record::validate_strength;
use mnemo_core::{
    Category, GraphSnapshot, MemoryBackend, MemoryError, MemoryRecord, Neighbor, RelationRecord,
    RelationType, Result, ScopeProvider, ScoredMemory,
};

use crate::graph::RelationGraph;
use crate::rank;
use crate::scope::Scope;
use crate::store::{ScopeData, ScopedStore};

struct ScopeState {
    data: ScopeData,
    graph: RelationGraph,
}

/// Single entry point for one scope's memories
pub struct MemoryManager {
    scope: Scope,
    store: ScopedStore,
    state: Mutex<ScopeState>,
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl MemoryManager {
    /// Load the scope's persisted state, or start empty
    pub fn open(root: &Path, scope: Scope) -> Result<Self> {
        let store = ScopedStore::new(root, &scope);
        let data = store.load()?;
        let graph = RelationGraph::build(&data.relations);
        debug!(
            scope = scope.as_str(),
            memories = data.memories.len(),
            relations = data.relations.len(),
            "opened scope"
        );
        Ok(Self {
            scope,
            store,
            state: Mutex::new(ScopeState { data, graph }),
        })
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    fn lock(&self) -> Result<MutexGuard<'_, ScopeState>> {
        self.state
            .lock()
            .map_err(|_| MemoryError::Internal("scope state poisoned".into()))
    }
}

impl MemoryBackend for MemoryManager {
    fn save(&self, key: &str, value: &str, category: Category) -> Result<MemoryRecord> {
        if key.trim().is_empty() {
            return Err(MemoryError::Validation("memory key must not be empty".into()));
        }

        let mut state = self.lock()?;
        let previous = state.data.memories.get(key).cloned();
        match state.data.memories.entry(key.to_string()) {
            Entry::Occupied(entry) => entry.into_mut().overwrite(value, category),
            Entry::Vacant(entry) => {
                entry.insert(MemoryRecord::new(key, value, category));
            }
        }

        if let Err(e) = self.store.persist(&state.data) {
            match previous {
                Some(prev) => state.data.memories.insert(key.to_string(), prev),
                None => state.data.memories.remove(key),
            };
            return Err(e);
        }
        info!(scope = self.scope.as_str(), key, "saved memory");
        Ok(state.data.memories[key].clone())
    }

    fn recall(&self, key: &str) -> Result<Option<MemoryRecord>> {
        let mut state = self.lock()?;
        let record = match state.data.memories.get_mut(key) {
            Some(record) => {
                record.mark_recalled();
                record.clone()
            }
            None => return Ok(None),
        };

        if let Err(e) = self.store.persist(&state.data) {
            if let Some(r) = state.data.memories.get_mut(key) {
                r.access_count -= 1;
            }
            return Err(e);
        }
        Ok(Some(record))
    }

    fn link(
        &self,
        source_key: &str,
        target_key: &str,
        relation_type: RelationType,
        strength: f64,
        bidirectional: bool,
    ) -> Result<RelationRecord> {
        let strength = validate_strength(strength)?;

        let mut state = self.lock()?;
        for key in [source_key, target_key] {
            if !state.data.memories.contains_key(key) {
                return Err(MemoryError::NotFound(key.to_string()));
            }
        }

        let rollback = state.data.relations.clone();
        // Re-linking the same (source, target, type) triple replaces the
        // edge rather than duplicating it.
        state.data.relations.retain(|rel| {
            !(rel.source_key == source_key
                && rel.target_key == target_key
                && rel.relation_type == relation_type)
        });
        let rel = RelationRecord::new(source_key, target_key, relation_type, strength, bidirectional);
        if bidirectional {
            state.data.relations.retain(|existing| {
                !(existing.source_key == target_key
                    && existing.target_key == source_key
                    && existing.relation_type == relation_type)
            });
            state.data.relations.push(rel.inverse());
        }
        state.data.relations.push(rel.clone());

        if let Err(e) = self.store.persist(&state.data) {
            state.data.relations = rollback;
            return Err(e);
        }
        let graph = RelationGraph::build(&state.data.relations);
        state.graph = graph;
        info!(
            scope = self.scope.as_str(),
            source = source_key,
            target = target_key,
            relation = %relation_type,
            "linked memories"
        );
        Ok(rel)
    }

    fn forget(&self, key: &str) -> Result<bool> {
        let mut state = self.lock()?;
        let removed = match state.data.memories.remove(key) {
            Some(record) => record,
            None => return Ok(false),
        };
        let rollback = state.data.relations.clone();
        state
            .data
            .relations
            .retain(|rel| rel.source_key != key && rel.target_key != key);

        if let Err(e) = self.store.persist(&state.data) {
            state.data.memories.insert(key.to_string(), removed);
            state.data.relations = rollback;
            return Err(e);
        }
        let graph = RelationGraph::build(&state.data.relations);
        state.graph = graph;
        info!(scope = self.scope.as_str(), key, "forgot memory");
        Ok(true)
    }

    fn prioritize(&self, context: &str, limit: usize) -> Result<Vec<ScoredMemory>> {
        let state = self.lock()?;
        let mut ranked = rank::rank(&state.data.memories, &state.graph, context, Utc::now());
        ranked.truncate(limit);
        Ok(ranked)
    }

    fn neighbors(&self, key: &str) -> Result<Vec<Neighbor>> {
        Ok(self.lock()?.graph.neighbors(key))
    }

    fn graph(&self) -> Result<GraphSnapshot> {
        let state = self.lock()?;
        Ok(GraphSnapshot {
            scope: self.scope.as_str().to_string(),
            nodes: state.data.memories.values().cloned().collect(),
            edges: state.data.relations.clone(),
        })
    }
}

/// Maps scope identity to its manager.
///
/// Construct one registry per data root and pass it by handle; there is
/// no ambient global instance, which keeps an in-memory substitute easy
/// to slot in for tests.
pub struct MemoryRegistry {
    root: PathBuf,
    managers: Mutex<HashMap<Scope, Arc<MemoryManager>>>,
}

impl MemoryRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            managers: Mutex::new(HashMap::new()),
        }
    }

    /// Registry rooted at the default data directory (~/.mnemo)
    pub fn open_default() -> Result<Self> {
        let root = dirs::home_dir()
            .ok_or_else(|| MemoryError::StorageUnavailable("no home directory".into()))?
            .join(".mnemo");
        Ok(Self::new(root))
    }

    /// The manager for a project path, or the global scope when absent.
    /// The same path string always resolves to the same instance.
    pub fn manager(&self, project_path: Option<&str>) -> Result<Arc<MemoryManager>> {
        let scope = Scope::resolve(project_path);
        let mut managers = self
            .managers
            .lock()
            .map_err(|_| MemoryError::Internal("registry poisoned".into()))?;
        if let Some(manager) = managers.get(&scope) {
            return Ok(manager.clone());
        }
        let manager = Arc::new(MemoryManager::open(&self.root, scope.clone())?);
        managers.insert(scope, manager.clone());
        Ok(manager)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ScopeProvider for MemoryRegistry {
    fn scope(&self, project_path: Option<&str>) -> Result<Arc<dyn MemoryBackend>> {
        let manager = self.manager(project_path)?;
        Ok(manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn registry() -> (tempfile::TempDir, MemoryRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry = MemoryRegistry::new(dir.path());
        (dir, registry)
    }

    #[test]
    fn test_never_saved_key_is_absent() {
        let (_dir, registry) = registry();
        let manager = registry.manager(None).unwrap();
        assert!(manager.recall("ghost").unwrap().is_none());
    }

    #[test]
    fn test_save_recall_round_trip() {
        let (_dir, registry) = registry();
        let manager = registry.manager(None).unwrap();

        manager.save("build", "cargo check", Category::Project).unwrap();
        let record = manager.recall("build").unwrap().unwrap();
        assert_eq!(record.value, "cargo check");
        assert_eq!(record.access_count, 1);
    }

    #[test]
    fn test_upsert_preserves_creation_time() {
        let (_dir, registry) = registry();
        let manager = registry.manager(None).unwrap();

        let first = manager.save("style", "tabs", Category::Pattern).unwrap();
        let second = manager.save("style", "spaces", Category::Pattern).unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
        assert_eq!(manager.recall("style").unwrap().unwrap().value, "spaces");
        // Still one record, not two
        assert_eq!(manager.graph().unwrap().nodes.len(), 1);
    }

    #[test]
    fn test_recall_count_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let registry = MemoryRegistry::new(dir.path());
            let manager = registry.manager(None).unwrap();
            manager.save("k", "v", Category::Global).unwrap();
            manager.recall("k").unwrap();
            manager.recall("k").unwrap();
        }

        let registry = MemoryRegistry::new(dir.path());
        let manager = registry.manager(None).unwrap();
        let record = manager.recall("k").unwrap().unwrap();
        assert_eq!(record.access_count, 3);
    }

    #[test]
    fn test_link_requires_both_endpoints() {
        let (_dir, registry) = registry();
        let manager = registry.manager(None).unwrap();
        manager.save("a", "1", Category::Project).unwrap();

        let err = manager
            .link("a", "missing", RelationType::Uses, 1.0, false)
            .unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(ref key) if key == "missing"));

        let err = manager
            .link("missing", "a", RelationType::Uses, 1.0, false)
            .unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
        assert!(manager.graph().unwrap().edges.is_empty());
    }

    #[test]
    fn test_strength_boundaries() {
        let (_dir, registry) = registry();
        let manager = registry.manager(None).unwrap();
        manager.save("a", "1", Category::Project).unwrap();
        manager.save("b", "2", Category::Project).unwrap();

        assert!(manager.link("a", "b", RelationType::RelatedTo, 0.0, false).is_ok());
        assert!(manager.link("a", "b", RelationType::Uses, 1.0, false).is_ok());

        for bad in [-0.1, 1.1] {
            let err = manager
                .link("a", "b", RelationType::Extends, bad, false)
                .unwrap_err();
            assert!(matches!(err, MemoryError::Validation(_)));
        }
        // Only the two valid links were stored
        assert_eq!(manager.graph().unwrap().edges.len(), 2);
    }

    #[test]
    fn test_bidirectional_link_visible_from_both_ends() {
        let (_dir, registry) = registry();
        let manager = registry.manager(None).unwrap();
        manager.save("a", "1", Category::Project).unwrap();
        manager.save("b", "2", Category::Project).unwrap();

        manager
            .link("a", "b", RelationType::RelatedTo, 0.6, true)
            .unwrap();

        let from_a = manager.neighbors("a").unwrap();
        assert_eq!(from_a.len(), 1);
        assert_eq!(from_a[0].key, "b");
        assert_eq!(from_a[0].strength, 0.6);

        let from_b = manager.neighbors("b").unwrap();
        assert_eq!(from_b.len(), 1);
        assert_eq!(from_b[0].key, "a");
        assert_eq!(from_b[0].relation_type, RelationType::RelatedTo);
    }

    #[test]
    fn test_relink_replaces_edge() {
        let (_dir, registry) = registry();
        let manager = registry.manager(None).unwrap();
        manager.save("a", "1", Category::Project).unwrap();
        manager.save("b", "2", Category::Project).unwrap();

        manager.link("a", "b", RelationType::Uses, 0.4, false).unwrap();
        manager.link("a", "b", RelationType::Uses, 0.9, false).unwrap();

        let edges = manager.graph().unwrap().edges;
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].strength, 0.9);

        // A different relation type between the same pair is its own edge
        manager
            .link("a", "b", RelationType::References, 0.5, false)
            .unwrap();
        assert_eq!(manager.graph().unwrap().edges.len(), 2);
    }

    #[test]
    fn test_forget_cascades_to_relations() {
        let (_dir, registry) = registry();
        let manager = registry.manager(None).unwrap();
        manager.save("a", "1", Category::Project).unwrap();
        manager.save("b", "2", Category::Project).unwrap();
        manager.link("a", "b", RelationType::Uses, 0.8, true).unwrap();

        assert!(manager.forget("a").unwrap());
        assert!(!manager.forget("a").unwrap());

        assert!(manager.recall("a").unwrap().is_none());
        assert!(manager.neighbors("b").unwrap().is_empty());
        assert!(manager.graph().unwrap().edges.is_empty());
    }

    #[test]
    fn test_scopes_are_isolated() {
        let (_dir, registry) = registry();
        let global = registry.manager(None).unwrap();
        let project = registry.manager(Some("/home/dev/api")).unwrap();

        project.save("secret", "project-only", Category::Project).unwrap();
        assert!(global.recall("secret").unwrap().is_none());
        assert_eq!(project.recall("secret").unwrap().unwrap().value, "project-only");
    }

    #[test]
    fn test_scope_resolution_is_idempotent() {
        let (_dir, registry) = registry();
        let first = registry.manager(Some("/home/dev/api")).unwrap();
        let second = registry.manager(Some("/home/dev/api/")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_corrupt_scope_surfaces_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join("global.json"), b"not json at all").unwrap();

        let registry = MemoryRegistry::new(dir.path());
        let err = registry.manager(None).unwrap_err();
        assert!(matches!(err, MemoryError::StorageUnavailable(_)));
    }

    #[test]
    fn test_tool_layer_drives_real_registry() {
        let (_dir, registry) = registry();
        let call = |name: &str, args: serde_json::Value| {
            mnemo_core::tools::execute_tool(name, &args, &registry).unwrap()
        };

        call(
            "save_memory",
            serde_json::json!({"key": "arch-decision", "value": "Use GPS-first validation", "category": "decision"}),
        );
        call(
            "save_memory",
            serde_json::json!({"key": "vision-threshold", "value": "0.8 confidence", "category": "decision"}),
        );
        let linked = call(
            "link_memories",
            serde_json::json!({
                "sourceKey": "arch-decision",
                "targetKey": "vision-threshold",
                "relationType": "depends_on",
                "strength": 0.9,
            }),
        );
        assert!(linked.starts_with('✓'), "unexpected output: {}", linked);
        assert!(linked.contains("arch-decision"));
        assert!(linked.contains("vision-threshold"));

        let graph = call("memory_graph", serde_json::json!({}));
        assert!(graph.contains("2 memories, 1 relations"));
    }

    #[test]
    fn test_prioritize_end_to_end() {
        let (_dir, registry) = registry();
        let manager = registry.manager(None).unwrap();

        manager
            .save("arch-decision", "Use GPS-first validation", Category::Decision)
            .unwrap();
        manager
            .save("vision-threshold", "0.8 confidence", Category::Decision)
            .unwrap();
        manager
            .save("lunch-spot", "tacos on fridays", Category::Global)
            .unwrap();
        manager
            .link("arch-decision", "vision-threshold", RelationType::DependsOn, 0.9, false)
            .unwrap();

        let ranked = manager.prioritize("payment validation flow", 10).unwrap();
        let position = |key: &str| ranked.iter().position(|e| e.record.key == key).unwrap();
        assert!(position("arch-decision") < position("lunch-spot"));
        assert!(position("vision-threshold") < position("lunch-spot"));
    }
}
