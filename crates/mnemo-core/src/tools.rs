//! Tool definitions and execution
//!
//! All memory tools live here. The CLI and any agent-runtime bridge share
//! the same handlers: fixed JSON input, plain-text output where the leading
//! ✓/✗ symbol is the success signal.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::record::{Category, MemoryRecord, RelationRecord, RelationType};
use crate::{MemoryError, Result};

/// All memory tool definitions as OpenAI-compatible function schemas
pub fn tool_schemas() -> Vec<Value> {
    serde_json::json!([
        {
            "type": "function",
            "function": {
                "name": "save_memory",
                "description": "Store or overwrite a piece of knowledge under a key. Use for facts, conventions, and design decisions worth keeping across sessions.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "key": { "type": "string", "description": "Unique name for this memory within its scope" },
                        "value": { "type": "string", "description": "The content to remember" },
                        "category": {
                            "type": "string",
                            "enum": ["project", "global", "pattern", "decision"],
                            "description": "Retention intent (default: project)"
                        },
                        "projectPath": { "type": "string", "description": "Project the memory belongs to; omit for the global scope" }
                    },
                    "required": ["key", "value"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "recall_memory",
                "description": "Look up one memory by key. Also lists what it is linked to.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "key": { "type": "string", "description": "The memory key to look up" },
                        "projectPath": { "type": "string", "description": "Project scope; omit for global" }
                    },
                    "required": ["key"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "link_memories",
                "description": "Create a typed, weighted relationship between two existing memories.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "sourceKey": { "type": "string", "description": "Key of the source memory" },
                        "targetKey": { "type": "string", "description": "Key of the target memory" },
                        "relationType": {
                            "type": "string",
                            "enum": ["related_to", "depends_on", "implements", "extends", "uses", "references", "part_of"],
                            "description": "How the source relates to the target"
                        },
                        "strength": { "type": "number", "description": "Edge weight between 0.0 and 1.0 (default: 1.0)" },
                        "bidirectional": { "type": "boolean", "description": "Also store the mirrored edge (default: false)" },
                        "projectPath": { "type": "string", "description": "Project scope; omit for global" }
                    },
                    "required": ["sourceKey", "targetKey", "relationType"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "forget_memory",
                "description": "Delete a memory and every relation attached to it.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "key": { "type": "string", "description": "The memory key to delete" },
                        "projectPath": { "type": "string", "description": "Project scope; omit for global" }
                    },
                    "required": ["key"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "prioritize_memories",
                "description": "Rank stored memories against a task context by recency, usage, and graph connectivity. Use at the start of a task to load the most relevant knowledge.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "context": { "type": "string", "description": "Free-text description of the task at hand" },
                        "limit": { "type": "number", "description": "Max memories to return (default: 10)" },
                        "projectPath": { "type": "string", "description": "Project scope; omit for global" }
                    },
                    "required": ["context"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "memory_graph",
                "description": "Show every memory and relation in a scope.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "projectPath": { "type": "string", "description": "Project scope; omit for global" }
                    }
                }
            }
        }
    ])
    .as_array()
    .unwrap()
    .clone()
}

/// Per-scope operations the tool layer needs from a store
///
/// Implemented by the scoped memory manager; tests substitute an in-memory fake.
pub trait MemoryBackend: Send + Sync {
    /// Upsert: create on first save, overwrite value/category on repeat saves
    fn save(&self, key: &str, value: &str, category: Category) -> Result<MemoryRecord>;

    /// Key lookup. Absence is an expected outcome, not an error.
    /// A hit increments the record's access count.
    fn recall(&self, key: &str) -> Result<Option<MemoryRecord>>;

    /// Create a relation between two existing memories. All-or-nothing:
    /// validation failures leave the scope untouched.
    fn link(
        &self,
        source_key: &str,
        target_key: &str,
        relation_type: RelationType,
        strength: f64,
        bidirectional: bool,
    ) -> Result<RelationRecord>;

    /// Delete a memory and its incident relations. Returns false if the key
    /// was never stored.
    fn forget(&self, key: &str) -> Result<bool>;

    /// Rank the scope's memories against a task context
    fn prioritize(&self, context: &str, limit: usize) -> Result<Vec<ScoredMemory>>;

    /// Outgoing adjacency of one memory
    fn neighbors(&self, key: &str) -> Result<Vec<Neighbor>>;

    /// Point-in-time view of the whole scope
    fn graph(&self) -> Result<GraphSnapshot>;
}

/// Resolves a project path (or its absence) to the backend for that scope
pub trait ScopeProvider: Send + Sync {
    fn scope(&self, project_path: Option<&str>) -> Result<Arc<dyn MemoryBackend>>;
}

/// One ranked entry returned from prioritize
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScoredMemory {
    pub record: MemoryRecord,
    pub score: f64,
}

/// One adjacency entry returned from neighbors
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Neighbor {
    pub key: String,
    pub relation_type: RelationType,
    pub strength: f64,
}

/// Point-in-time view of a scope's nodes and edges
#[derive(Debug, Clone, serde::Serialize)]
pub struct GraphSnapshot {
    pub scope: String,
    pub nodes: Vec<MemoryRecord>,
    pub edges: Vec<RelationRecord>,
}

/// Execute a memory tool by name
///
/// Returns None for names this layer does not own - the caller should try
/// its other tool sources. Owned tools always resolve to text: expected
/// failures render as ✗ messages inside the handlers, and anything left
/// over is formatted here so no error escapes to the hosting runtime.
pub fn execute_tool(name: &str, args: &Value, scopes: &dyn ScopeProvider) -> Option<String> {
    debug!(tool = name, "dispatching memory tool");
    let result = match name {
        "save_memory" => tool_save(args, scopes),
        "recall_memory" => tool_recall(args, scopes),
        "link_memories" => tool_link(args, scopes),
        "forget_memory" => tool_forget(args, scopes),
        "prioritize_memories" => tool_prioritize(args, scopes),
        "memory_graph" => tool_graph(args, scopes),
        _ => return None, // Not a memory tool - caller should try elsewhere
    };
    Some(result.unwrap_or_else(|e| {
        warn!(tool = name, error = %e, "memory tool failed");
        format!("✗ Error: {}", e)
    }))
}

// --- Argument helpers ---

fn require_str<'a>(args: &'a Value, field: &str) -> Result<&'a str> {
    args[field]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| MemoryError::Validation(format!("missing required field '{}'", field)))
}

fn project_path(args: &Value) -> Option<&str> {
    args["projectPath"].as_str().filter(|s| !s.trim().is_empty())
}

// --- Tool implementations ---

fn tool_save(args: &Value, scopes: &dyn ScopeProvider) -> Result<String> {
    let key = require_str(args, "key")?;
    let value = require_str(args, "value")?;
    let category = match args["category"].as_str() {
        Some(raw) => match raw.parse::<Category>() {
            Ok(category) => category,
            Err(e) => return Ok(format!("✗ {}", e)),
        },
        None => Category::Project,
    };

    let backend = scopes.scope(project_path(args))?;
    let record = backend.save(key, value, category)?;
    Ok(format!("✓ Saved [{}] '{}'", record.category, record.key))
}

fn tool_recall(args: &Value, scopes: &dyn ScopeProvider) -> Result<String> {
    let key = require_str(args, "key")?;
    let backend = scopes.scope(project_path(args))?;

    let record = match backend.recall(key)? {
        Some(record) => record,
        None => return Ok(format!("✗ No memory found: '{}'", key)),
    };

    let mut out = format!(
        "✓ [{}] '{}': {}\n  saved {}, updated {}, recalled {} times",
        record.category,
        record.key,
        record.value,
        record.created_at.format("%Y-%m-%d %H:%M"),
        record.updated_at.format("%Y-%m-%d %H:%M"),
        record.access_count,
    );
    let related = backend.neighbors(key)?;
    if !related.is_empty() {
        out.push_str("\n  related:");
        for n in &related {
            out.push_str(&format!(
                "\n    {} '{}' (strength {:.2})",
                n.relation_type, n.key, n.strength
            ));
        }
    }
    Ok(out)
}

fn tool_link(args: &Value, scopes: &dyn ScopeProvider) -> Result<String> {
    let source = require_str(args, "sourceKey")?;
    let target = require_str(args, "targetKey")?;
    let relation_type = match require_str(args, "relationType")?.parse::<RelationType>() {
        Ok(relation_type) => relation_type,
        Err(e) => return Ok(format!("✗ {}", e)),
    };
    let strength = args["strength"].as_f64().unwrap_or(1.0);
    let bidirectional = args["bidirectional"].as_bool().unwrap_or(false);

    let backend = scopes.scope(project_path(args))?;
    match backend.link(source, target, relation_type, strength, bidirectional) {
        Ok(rel) => Ok(format!(
            "✓ Linked '{}' → '{}' ({}, strength {:.2}{})",
            rel.source_key,
            rel.target_key,
            rel.relation_type,
            rel.strength,
            if rel.bidirectional { ", bidirectional" } else { "" },
        )),
        Err(MemoryError::NotFound(key)) => Ok(format!("✗ Memory not found: '{}'", key)),
        Err(MemoryError::Validation(msg)) => Ok(format!("✗ {}", msg)),
        Err(e) => Err(e),
    }
}

fn tool_forget(args: &Value, scopes: &dyn ScopeProvider) -> Result<String> {
    let key = require_str(args, "key")?;
    let backend = scopes.scope(project_path(args))?;
    if backend.forget(key)? {
        Ok(format!("✓ Forgot '{}' and its relations", key))
    } else {
        Ok(format!("✗ No memory found: '{}'", key))
    }
}

fn tool_prioritize(args: &Value, scopes: &dyn ScopeProvider) -> Result<String> {
    let context = require_str(args, "context")?;
    let limit = args["limit"].as_u64().unwrap_or(10) as usize;

    let backend = scopes.scope(project_path(args))?;
    let ranked = backend.prioritize(context, limit)?;
    if ranked.is_empty() {
        return Ok("✓ No memories stored in this scope yet".to_string());
    }

    let mut out = format!("✓ Top memories for '{}':", context);
    for (i, entry) in ranked.iter().enumerate() {
        out.push_str(&format!(
            "\n  {}. [{}] '{}' (score {:.3}): {}",
            i + 1,
            entry.record.category,
            entry.record.key,
            entry.score,
            entry.record.value,
        ));
    }
    Ok(out)
}

fn tool_graph(args: &Value, scopes: &dyn ScopeProvider) -> Result<String> {
    let backend = scopes.scope(project_path(args))?;
    let snapshot = backend.graph()?;

    let mut out = format!(
        "✓ Scope '{}': {} memories, {} relations",
        snapshot.scope,
        snapshot.nodes.len(),
        snapshot.edges.len(),
    );
    for node in &snapshot.nodes {
        out.push_str(&format!(
            "\n  • '{}' [{}] ({} recalls)",
            node.key, node.category, node.access_count
        ));
    }
    for edge in &snapshot.edges {
        out.push_str(&format!(
            "\n  '{}' -[{} {:.2}]-> '{}'",
            edge.source_key, edge.relation_type, edge.strength, edge.target_key
        ));
    }
    Ok(out)
}
