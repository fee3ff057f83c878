//! Deterministic prioritization of memories against a task context
//!
//! The score combines recency, recall frequency, graph centrality, and
//! context relevance. Each component is monotonic in its underlying
//! signal and ties break by key order, so the same store state always
//! ranks the same way.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};

use mnemo_core::{MemoryRecord, ScoredMemory};

use crate::graph::RelationGraph;

const RECENCY_WEIGHT: f64 = 0.3;
const FREQUENCY_WEIGHT: f64 = 0.2;
const CENTRALITY_WEIGHT: f64 = 0.2;
const RELEVANCE_WEIGHT: f64 = 0.3;

/// Half-life of the recency signal
const RECENCY_HALF_LIFE_HOURS: f64 = 24.0 * 7.0;

/// Per-hop attenuation when relevance spreads along relations
const SPREAD_DECAY: f64 = 0.5;

/// Rank all records against a free-text context.
///
/// `now` is passed in so the function is a pure mapping from store state
/// to an ordering.
pub fn rank(
    memories: &BTreeMap<String, MemoryRecord>,
    graph: &RelationGraph,
    context: &str,
    now: DateTime<Utc>,
) -> Vec<ScoredMemory> {
    let relevance = relevance_scores(memories, graph, context);

    let mut ranked: Vec<ScoredMemory> = memories
        .values()
        .map(|record| {
            let score = RECENCY_WEIGHT * recency_score(record.updated_at, now)
                + FREQUENCY_WEIGHT * frequency_score(record.access_count)
                + CENTRALITY_WEIGHT * centrality_score(graph.centrality(&record.key))
                + RELEVANCE_WEIGHT * relevance.get(&record.key).copied().unwrap_or(0.0);
            ScoredMemory {
                record: record.clone(),
                score,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.record.key.cmp(&b.record.key))
    });
    ranked
}

/// Exponential decay in age: the fresher the update, the higher the score
fn recency_score(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_hours = (now - updated_at).num_milliseconds().max(0) as f64 / 3_600_000.0;
    0.5f64.powf(age_hours / RECENCY_HALF_LIFE_HOURS)
}

/// Saturating in recall count, bounded by 1
fn frequency_score(access_count: u32) -> f64 {
    let count = access_count as f64;
    count / (count + 5.0)
}

/// Saturating in summed incident strength, bounded by 1
fn centrality_score(incident_strength: f64) -> f64 {
    incident_strength / (incident_strength + 2.0)
}

/// Token overlap with the context, spread outward to graph neighbors.
/// Records the context never touches, directly or through relations,
/// carry no relevance at all.
fn relevance_scores(
    memories: &BTreeMap<String, MemoryRecord>,
    graph: &RelationGraph,
    context: &str,
) -> HashMap<String, f64> {
    let context_terms = tokenize(context);
    if context_terms.is_empty() {
        return HashMap::new();
    }

    let mut direct: Vec<(String, f64)> = Vec::new();
    for record in memories.values() {
        let mut terms = tokenize(&record.key);
        terms.extend(tokenize(&record.value));
        let hits = context_terms.iter().filter(|t| terms.contains(*t)).count();
        if hits > 0 {
            direct.push((
                record.key.clone(),
                hits as f64 / context_terms.len() as f64,
            ));
        }
    }

    let spread = graph.spread(&direct, SPREAD_DECAY);
    let mut relevance: HashMap<String, f64> = direct.into_iter().collect();
    for (key, energy) in spread {
        *relevance.entry(key).or_default() += energy;
    }
    for score in relevance.values_mut() {
        *score = score.min(1.0);
    }
    relevance
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3)
        .map(|t| t.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mnemo_core::{Category, RelationRecord, RelationType};

    fn record(key: &str, value: &str, updated_at: DateTime<Utc>) -> MemoryRecord {
        MemoryRecord {
            key: key.to_string(),
            value: value.to_string(),
            category: Category::Project,
            created_at: updated_at,
            updated_at,
            access_count: 0,
        }
    }

    fn positions(ranked: &[ScoredMemory]) -> HashMap<String, usize> {
        ranked
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.record.key.clone(), i))
            .collect()
    }

    #[test]
    fn test_more_recent_update_ranks_higher() {
        let now = Utc::now();
        let mut memories = BTreeMap::new();
        memories.insert("old".to_string(), record("old", "x", now - Duration::days(30)));
        memories.insert("new".to_string(), record("new", "x", now - Duration::hours(1)));

        let ranked = rank(&memories, &RelationGraph::default(), "", now);
        assert_eq!(ranked[0].record.key, "new");
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn test_more_recalled_ranks_higher() {
        let now = Utc::now();
        let mut memories = BTreeMap::new();
        let mut hot = record("hot", "x", now);
        hot.access_count = 12;
        memories.insert("hot".to_string(), hot);
        memories.insert("cold".to_string(), record("cold", "x", now));

        let ranked = rank(&memories, &RelationGraph::default(), "", now);
        assert_eq!(ranked[0].record.key, "hot");
    }

    #[test]
    fn test_more_connected_ranks_higher() {
        let now = Utc::now();
        let mut memories = BTreeMap::new();
        memories.insert("hub".to_string(), record("hub", "x", now));
        memories.insert("leaf".to_string(), record("leaf", "x", now));
        memories.insert("stray".to_string(), record("stray", "x", now));

        let graph = RelationGraph::build(&[RelationRecord::new(
            "hub",
            "leaf",
            RelationType::Uses,
            1.0,
            false,
        )]);

        let ranked = rank(&memories, &graph, "", now);
        let pos = positions(&ranked);
        assert!(pos["hub"] < pos["stray"]);
        assert!(pos["leaf"] < pos["stray"]);
    }

    #[test]
    fn test_ties_break_by_key_order() {
        let now = Utc::now();
        let mut memories = BTreeMap::new();
        memories.insert("beta".to_string(), record("beta", "same", now));
        memories.insert("alpha".to_string(), record("alpha", "same", now));

        let ranked = rank(&memories, &RelationGraph::default(), "", now);
        assert_eq!(ranked[0].record.key, "alpha");
        assert_eq!(ranked[1].record.key, "beta");
    }

    #[test]
    fn test_ranking_is_reproducible() {
        let now = Utc::now();
        let mut memories = BTreeMap::new();
        memories.insert("a".to_string(), record("a", "payment flow", now));
        memories.insert("b".to_string(), record("b", "retry logic", now));
        memories.insert("c".to_string(), record("c", "unrelated", now));

        let graph = RelationGraph::build(&[RelationRecord::new(
            "a",
            "b",
            RelationType::DependsOn,
            0.9,
            false,
        )]);

        let first = rank(&memories, &graph, "payment retries", now);
        let second = rank(&memories, &graph, "payment retries", now);
        let keys = |r: &[ScoredMemory]| r.iter().map(|e| e.record.key.clone()).collect::<Vec<_>>();
        assert_eq!(keys(&first), keys(&second));
    }

    #[test]
    fn test_context_pulls_in_linked_memories() {
        let now = Utc::now();
        let mut memories = BTreeMap::new();
        memories.insert(
            "arch-decision".to_string(),
            record("arch-decision", "Use GPS-first validation", now),
        );
        memories.insert(
            "vision-threshold".to_string(),
            record("vision-threshold", "0.8 confidence", now),
        );
        memories.insert(
            "deploy-notes".to_string(),
            record("deploy-notes", "blue green rollout", now),
        );

        let graph = RelationGraph::build(&[RelationRecord::new(
            "arch-decision",
            "vision-threshold",
            RelationType::DependsOn,
            0.9,
            false,
        )]);

        let ranked = rank(&memories, &graph, "payment validation flow", now);
        let pos = positions(&ranked);
        // The matched memory and everything linked to it outrank the
        // unrelated, unlinked memory of equal recency.
        assert!(pos["arch-decision"] < pos["deploy-notes"]);
        assert!(pos["vision-threshold"] < pos["deploy-notes"]);
    }
}
