//! In-memory adjacency view over a scope's relations
//!
//! Rebuilt from the persisted relations after every mutation. Relation
//! sets may contain cycles, so every walk tracks a visited set.

use std::collections::{HashMap, HashSet, VecDeque};

use mnemo_core::{Neighbor, RelationRecord};

/// Adjacency structure derived from persisted relations
#[derive(Debug, Default)]
pub struct RelationGraph {
    outgoing: HashMap<String, Vec<Neighbor>>,
    incident_strength: HashMap<String, f64>,
}

impl RelationGraph {
    pub fn build(relations: &[RelationRecord]) -> Self {
        let mut graph = Self::default();
        for rel in relations {
            graph
                .outgoing
                .entry(rel.source_key.clone())
                .or_default()
                .push(Neighbor {
                    key: rel.target_key.clone(),
                    relation_type: rel.relation_type,
                    strength: rel.strength,
                });
            *graph
                .incident_strength
                .entry(rel.source_key.clone())
                .or_default() += rel.strength;
            *graph
                .incident_strength
                .entry(rel.target_key.clone())
                .or_default() += rel.strength;
        }
        graph
    }

    /// Outgoing edges of one key
    pub fn neighbors(&self, key: &str) -> Vec<Neighbor> {
        self.outgoing.get(key).cloned().unwrap_or_default()
    }

    /// Sum of incident edge strengths - how load-bearing a memory is
    pub fn centrality(&self, key: &str) -> f64 {
        self.incident_strength.get(key).copied().unwrap_or(0.0)
    }

    /// Every key reachable from `start` (itself included), breadth-first.
    /// Terminates on cyclic relation sets.
    pub fn reachable(&self, start: &str) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::new();
        visited.insert(start.to_string());
        queue.push_back(start.to_string());
        while let Some(key) = queue.pop_front() {
            if let Some(edges) = self.outgoing.get(&key) {
                for edge in edges {
                    if visited.insert(edge.key.clone()) {
                        queue.push_back(edge.key.clone());
                    }
                }
            }
            order.push(key);
        }
        order
    }

    /// Spread activation outward from seed keys, attenuating by edge
    /// strength and a per-hop decay. Each node is charged at most once per
    /// seed; contributions from different seeds accumulate.
    pub fn spread(&self, seeds: &[(String, f64)], decay: f64) -> HashMap<String, f64> {
        let mut energy: HashMap<String, f64> = HashMap::new();
        for (seed, weight) in seeds {
            let mut visited = HashSet::new();
            visited.insert(seed.clone());
            let mut queue = VecDeque::new();
            queue.push_back((seed.clone(), *weight));
            while let Some((key, charge)) = queue.pop_front() {
                if let Some(edges) = self.outgoing.get(&key) {
                    for edge in edges {
                        let passed = charge * decay * edge.strength;
                        if passed <= f64::EPSILON {
                            continue;
                        }
                        if visited.insert(edge.key.clone()) {
                            *energy.entry(edge.key.clone()).or_default() += passed;
                            queue.push_back((edge.key.clone(), passed));
                        }
                    }
                }
            }
        }
        energy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::RelationType;

    fn edge(source: &str, target: &str, strength: f64) -> RelationRecord {
        RelationRecord::new(source, target, RelationType::RelatedTo, strength, false)
    }

    #[test]
    fn test_neighbors_and_centrality() {
        let graph = RelationGraph::build(&[edge("a", "b", 0.9), edge("c", "a", 0.4)]);

        let neighbors = graph.neighbors("a");
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].key, "b");
        assert_eq!(neighbors[0].strength, 0.9);

        // a touches both edges: 0.9 outgoing + 0.4 incoming
        assert!((graph.centrality("a") - 1.3).abs() < 1e-9);
        assert!((graph.centrality("b") - 0.9).abs() < 1e-9);
        assert_eq!(graph.centrality("unlinked"), 0.0);
    }

    #[test]
    fn test_traversal_terminates_on_cycle() {
        let graph = RelationGraph::build(&[edge("a", "b", 1.0), edge("b", "a", 1.0)]);

        let visited = graph.reachable("a");
        assert_eq!(visited, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_reachable_walks_transitively() {
        let graph = RelationGraph::build(&[
            edge("a", "b", 1.0),
            edge("b", "c", 1.0),
            edge("x", "y", 1.0),
        ]);

        let visited = graph.reachable("a");
        assert_eq!(visited.len(), 3);
        assert!(visited.contains(&"c".to_string()));
        assert!(!visited.contains(&"x".to_string()));
    }

    #[test]
    fn test_spread_attenuates_per_hop() {
        let graph = RelationGraph::build(&[edge("a", "b", 0.8), edge("b", "c", 0.5)]);

        let energy = graph.spread(&[("a".to_string(), 1.0)], 0.5);
        assert!((energy["b"] - 0.4).abs() < 1e-9); // 1.0 * 0.5 * 0.8
        assert!((energy["c"] - 0.1).abs() < 1e-9); // 0.4 * 0.5 * 0.5
        assert!(!energy.contains_key("a"));
    }

    #[test]
    fn test_spread_terminates_on_cycle() {
        let graph = RelationGraph::build(&[edge("a", "b", 1.0), edge("b", "a", 1.0)]);

        let energy = graph.spread(&[("a".to_string(), 1.0)], 0.5);
        // b charged once, the cycle does not feed energy back into a forever
        assert!((energy["b"] - 0.5).abs() < 1e-9);
        assert!(!energy.contains_key("a"));
    }
}
