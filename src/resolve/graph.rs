//! Raw dependency graph built during expansion
//!
//! Vertices are exact (group, name, version) triples; every descriptor edge
//! that survived expansion filtering becomes a graph edge. Per artifact key,
//! a [`DependencyNode`] collects the version candidates that were discovered.
//! The raw graph may contain cycles and several versions of one key.

use indexmap::IndexMap;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

use crate::domain::{
    ArtifactKey, Coordinate, DependencyDeclaration, Exclusion, Scope, Version, VersionRequirement,
};

/// One version of a key as it was discovered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub version: Version,
    /// 1 for root declarations
    pub depth: usize,
    /// Global discovery sequence number
    pub order: usize,
    /// Coordinates leading to this candidate, root first; empty for roots
    pub path: Vec<Coordinate>,
}

/// All candidates of one (group, name)
#[derive(Debug, Clone)]
pub struct DependencyNode {
    pub key: ArtifactKey,
    pub candidates: Vec<Candidate>,
    pub selected: Option<Coordinate>,
}

impl DependencyNode {
    fn new(key: ArtifactKey) -> Self {
        Self {
            key,
            candidates: Vec::new(),
            selected: None,
        }
    }

    pub fn candidate(&self, version: &Version) -> Option<&Candidate> {
        self.candidates.iter().find(|c| &c.version == version)
    }
}

/// A declaration with its version fixed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub key: ArtifactKey,
    pub requirement: VersionRequirement,
    pub version: Version,
    pub scope: Scope,
    pub optional: bool,
    pub exclusions: Vec<Exclusion>,
    pub classifier: Option<String>,
    pub extension: String,
}

impl DependencyEdge {
    pub fn from_declaration(decl: &DependencyDeclaration, version: Version) -> Self {
        Self {
            key: decl.key(),
            requirement: decl.version.clone(),
            version,
            scope: decl.scope,
            optional: decl.optional,
            exclusions: decl.exclusions.clone(),
            classifier: decl.classifier.clone(),
            extension: decl.extension.clone(),
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        let c = Coordinate::new(self.key.clone(), self.version.clone()).with_extension(&self.extension);
        match &self.classifier {
            Some(classifier) => c.with_classifier(classifier),
            None => c,
        }
    }
}

/// The expanded graph
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<Coordinate, DependencyEdge>,

    /// Map from (key, version) to vertex
    node_map: HashMap<(ArtifactKey, Version), NodeIndex>,

    /// Per-key candidates, in first-discovery order
    nodes: IndexMap<ArtifactKey, DependencyNode>,

    /// Root declarations with fixed versions, in declaration order
    roots: Vec<(DependencyEdge, NodeIndex)>,

    next_order: usize,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_candidate(&mut self, edge: &DependencyEdge, depth: usize, path: &[Coordinate]) {
        let order = self.next_order;
        let node = self
            .nodes
            .entry(edge.key.clone())
            .or_insert_with(|| DependencyNode::new(edge.key.clone()));

        if node.candidate(&edge.version).is_none() {
            node.candidates.push(Candidate {
                version: edge.version.clone(),
                depth,
                order,
                path: path.to_vec(),
            });
            self.next_order += 1;
        }
    }

    /// Returns the vertex of an edge's target, creating it if needed.
    /// The flag is true when the vertex is new.
    fn vertex_for(&mut self, edge: &DependencyEdge) -> (NodeIndex, bool) {
        let id = (edge.key.clone(), edge.version.clone());
        if let Some(idx) = self.node_map.get(&id) {
            return (*idx, false);
        }
        let idx = self.graph.add_node(edge.coordinate());
        self.node_map.insert(id, idx);
        (idx, true)
    }

    /// Adds a root declaration. Returns the vertex and whether it is new.
    pub fn add_root(&mut self, edge: DependencyEdge) -> (NodeIndex, bool) {
        self.record_candidate(&edge, 1, &[]);
        let (idx, is_new) = self.vertex_for(&edge);
        self.roots.push((edge, idx));
        (idx, is_new)
    }

    /// Adds a descriptor edge of `from`, discovered at `depth` (of the target)
    pub fn add_edge(
        &mut self,
        from: NodeIndex,
        edge: DependencyEdge,
        depth: usize,
        path: &[Coordinate],
    ) -> (NodeIndex, bool) {
        self.record_candidate(&edge, depth, path);
        let (to, is_new) = self.vertex_for(&edge);
        self.graph.add_edge(from, to, edge);
        (to, is_new)
    }

    pub fn roots(&self) -> &[(DependencyEdge, NodeIndex)] {
        &self.roots
    }

    pub fn coordinate(&self, idx: NodeIndex) -> Option<&Coordinate> {
        self.graph.node_weight(idx)
    }

    pub fn vertex(&self, key: &ArtifactKey, version: &Version) -> Option<NodeIndex> {
        self.node_map.get(&(key.clone(), version.clone())).copied()
    }

    /// Outgoing edges of a vertex in declaration order
    pub fn edges_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, &DependencyEdge)> {
        // petgraph walks adjacency lists newest first; edge ids grow with insertion
        let mut edges: Vec<(EdgeIndex, NodeIndex, &DependencyEdge)> = self
            .graph
            .edges(idx)
            .map(|e| (e.id(), e.target(), e.weight()))
            .collect();
        edges.sort_by_key(|(id, _, _)| *id);
        edges.into_iter().map(|(_, to, e)| (to, e)).collect()
    }

    pub fn node(&self, key: &ArtifactKey) -> Option<&DependencyNode> {
        self.nodes.get(key)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DependencyNode> {
        self.nodes.values()
    }

    pub(crate) fn select(&mut self, key: &ArtifactKey, coordinate: Coordinate) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.selected = Some(coordinate);
        }
    }

    /// Number of distinct (group, name, version) vertices
    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
