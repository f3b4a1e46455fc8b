//! The module dependency graph: cycle detection and a deterministic visit
//! order, backed by a plain `petgraph::DiGraph` over module names.

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

#[derive(Default)]
pub struct ModuleGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.node_map.insert(name.to_string(), idx);
        idx
    }

    /// Record that `from` depends on `to` (root manifest entries are their
    /// own `from`/`to` pair so they appear as graph nodes even with no
    /// dependents).
    pub fn add_edge(&mut self, from: &str, to: &str) {
        let from_idx = self.node(from);
        let to_idx = self.node(to);
        if from_idx != to_idx {
            self.graph.update_edge(from_idx, to_idx, ());
        }
    }

    pub fn add_node(&mut self, name: &str) {
        self.node(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node_map.contains_key(name)
    }

    /// Cycles are permitted (a module may transitively list itself); the
    /// BFS in `Resolver::resolve` already terminates on one via its
    /// visited set. This just lets a caller record whether one was seen.
    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }
}
