//! Planned task graph
//!
//! Built by the executor while planning a run. Edges point from a task to the
//! prerequisites it declared, in declaration order.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TaskGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task by canonical name; adding it twice is a no-op
    pub fn add_task(&mut self, name: &str) -> NodeIndex {
        if let Some(idx) = self.node_map.get(name) {
            return *idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.node_map.insert(name.to_string(), idx);
        idx
    }

    /// Records that `task` needs `prerequisite` first. Repeated edges are kept once.
    pub fn add_dependency(&mut self, task: &str, prerequisite: &str) {
        let from = self.add_task(task);
        let to = self.add_task(prerequisite);
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, ());
        }
    }

    /// Direct prerequisites of `name`, in declaration order
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        let Some(idx) = self.node_map.get(name) else {
            return vec![];
        };
        let mut edges: Vec<_> = self.graph.edges_directed(*idx, Direction::Outgoing).collect();
        edges.sort_by_key(|e| e.id());
        edges
            .into_iter()
            .map(|e| self.graph[e.target()].as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_keep_declaration_order() {
        let mut graph = TaskGraph::new();
        graph.add_dependency("package", "compile");
        graph.add_dependency("package", "resources");
        graph.add_dependency("test", "compile");
        graph.add_dependency("package", "compile");

        assert_eq!(graph.dependencies("package"), vec!["compile", "resources"]);
        assert_eq!(graph.dependencies("test"), vec!["compile"]);
        assert!(graph.dependencies("compile").is_empty());
        assert!(graph.dependencies("missing").is_empty());
    }
}
