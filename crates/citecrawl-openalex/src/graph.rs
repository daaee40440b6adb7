//! Citation graph assembly
//!
//! Nodes are keyed by work identifier and carry metadata plus the BFS
//! level at which the identifier first entered a frontier. Edges are
//! ordered (citer → cited) pairs with both endpoints present. All
//! mutators are safe under concurrent calls: records expanded in parallel
//! within a level may race on nodes they both cite.

use std::sync::Mutex;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::record::{WorkId, WorkMeta};

/// One publication in the assembled graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: WorkId,
    pub meta: WorkMeta,
    /// BFS hop count from the nearest root, fixed at creation
    pub level: u32,
}

#[derive(Debug, Default)]
struct GraphState {
    index: FxHashMap<WorkId, u32>,
    nodes: Vec<Node>,
    edges: Vec<(u32, u32)>,
    edge_set: FxHashSet<(u32, u32)>,
}

/// Shared, incrementally assembled citation graph.
#[derive(Debug, Default)]
pub struct CitationGraph {
    state: Mutex<GraphState>,
}

impl CitationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. No-op returning false if the identifier already has a
    /// node: the first write wins and the level never changes.
    pub fn add_node(&self, id: &str, meta: WorkMeta, level: u32) -> bool {
        let mut state = self.state.lock().expect("graph poisoned");
        if state.index.contains_key(id) {
            return false;
        }
        let idx = state.nodes.len() as u32;
        state.index.insert(id.to_string(), idx);
        state.nodes.push(Node {
            id: id.to_string(),
            meta,
            level,
        });
        true
    }

    /// Add an ordered edge. No-op returning false when the identical edge
    /// already exists or either endpoint has no node (edges never dangle).
    pub fn add_edge(&self, citer: &str, cited: &str) -> bool {
        let mut state = self.state.lock().expect("graph poisoned");
        let (Some(&from), Some(&to)) = (state.index.get(citer), state.index.get(cited)) else {
            return false;
        };
        if !state.edge_set.insert((from, to)) {
            return false;
        }
        state.edges.push((from, to));
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state
            .lock()
            .expect("graph poisoned")
            .index
            .contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.state.lock().expect("graph poisoned").nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.state.lock().expect("graph poisoned").edges.len()
    }

    /// Point-in-time immutable copy, usable mid-run for introspection and
    /// handed to the caller on completion.
    pub fn snapshot(&self) -> GraphSnapshot {
        let state = self.state.lock().expect("graph poisoned");
        GraphSnapshot {
            index: state.index.clone(),
            nodes: state.nodes.clone(),
            edges: state.edges.clone(),
        }
    }
}

/// Immutable graph view exposing row-per-node and row-per-edge access,
/// sufficient for tabular export and lossless reconstruction.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    index: FxHashMap<WorkId, u32>,
    nodes: Vec<Node>,
    edges: Vec<(u32, u32)>,
}

impl GraphSnapshot {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Nodes in insertion (discovery) order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&idx| &self.nodes[idx as usize])
    }

    pub fn level_of(&self, id: &str) -> Option<u32> {
        self.get(id).map(|n| n.level)
    }

    /// Edges as (citer, cited) identifier pairs, insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges.iter().map(|&(from, to)| {
            (
                self.nodes[from as usize].id.as_str(),
                self.nodes[to as usize].id.as_str(),
            )
        })
    }

    pub fn has_edge(&self, citer: &str, cited: &str) -> bool {
        self.edges().any(|(f, t)| f == citer && t == cited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(title: &str) -> WorkMeta {
        WorkMeta {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn first_node_write_wins() {
        let graph = CitationGraph::new();
        assert!(graph.add_node("W1", meta("first"), 0));
        assert!(!graph.add_node("W1", meta("second"), 3));

        let snap = graph.snapshot();
        let node = snap.get("W1").unwrap();
        assert_eq!(node.level, 0);
        assert_eq!(node.meta.title.as_deref(), Some("first"));
    }

    #[test]
    fn duplicate_edges_collapse() {
        let graph = CitationGraph::new();
        graph.add_node("W1", WorkMeta::default(), 0);
        graph.add_node("W2", WorkMeta::default(), 1);
        assert!(graph.add_edge("W1", "W2"));
        assert!(!graph.add_edge("W1", "W2"));
        // reverse direction is a distinct edge
        assert!(graph.add_edge("W2", "W1"));
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn edges_never_dangle() {
        let graph = CitationGraph::new();
        graph.add_node("W1", WorkMeta::default(), 0);
        assert!(!graph.add_edge("W1", "W404"));
        assert!(!graph.add_edge("W404", "W1"));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn snapshot_preserves_discovery_order() {
        let graph = CitationGraph::new();
        graph.add_node("W3", WorkMeta::default(), 0);
        graph.add_node("W1", WorkMeta::default(), 1);
        graph.add_node("W2", WorkMeta::default(), 1);

        let snap = graph.snapshot();
        let order: Vec<&str> = snap.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(order, vec!["W3", "W1", "W2"]);
    }

    #[test]
    fn snapshot_edge_pairs() {
        let graph = CitationGraph::new();
        graph.add_node("W1", WorkMeta::default(), 0);
        graph.add_node("W2", WorkMeta::default(), 1);
        graph.add_edge("W1", "W2");

        let snap = graph.snapshot();
        let pairs: Vec<(&str, &str)> = snap.edges().collect();
        assert_eq!(pairs, vec![("W1", "W2")]);
        assert!(snap.has_edge("W1", "W2"));
        assert!(!snap.has_edge("W2", "W1"));
    }

    #[test]
    fn concurrent_node_creation_races_cleanly() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let graph = Arc::new(CitationGraph::new());
        let created = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for t in 0..8 {
            let graph = graph.clone();
            let created = created.clone();
            handles.push(std::thread::spawn(move || {
                // every thread tries the same shared target plus its own
                for i in 0..50 {
                    if graph.add_node("W0", meta(&format!("thread {t}")), 1) {
                        created.fetch_add(1, Ordering::Relaxed);
                    }
                    graph.add_node(&format!("W{t}_{i}"), WorkMeta::default(), 1);
                    graph.add_edge(&format!("W{t}_{i}"), "W0");
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(created.load(Ordering::Relaxed), 1);
        assert_eq!(graph.node_count(), 1 + 8 * 50);
        assert_eq!(graph.edge_count(), 8 * 50);
    }
}
