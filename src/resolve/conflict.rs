//! Conflict mediation
//!
//! Picks one version per (group, name) from the expanded graph:
//!
//! 1. Breadth-first walk from the roots, following only edges of selected
//!    versions. The first time a key is reached fixes its version, so the
//!    nearest declaration wins and equal depths go to the earlier declaration.
//! 2. Exclusions are global: an exclusion on the request, or on any edge
//!    that leads to a selected version, removes the matching key everywhere
//!    unless a root declares it. Exclusions on edges into losing versions
//!    are ignored.
//! 3. Effective scopes are propagated over the selected graph, then nodes
//!    invisible to the consuming scope are dropped.
//! 4. Edges whose requested version lost mediation do not order anything.
//!    A cycle among the remaining edges is an error.
//! 5. Output is topological, ties broken by discovery order.

use indexmap::{IndexMap, IndexSet};
use petgraph::graph::NodeIndex;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::fmt;

use super::graph::DependencyGraph;
use super::ResolveError;
use crate::domain::{ArtifactKey, Coordinate, Exclusion, Scope, ScopeSet, Version};

/// Why a version lost mediation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// The key is declared directly by the project
    RootDeclaration,
    /// The selected version was declared closer to the project
    Nearer,
    /// Same depth; the selected version was declared first
    DeclaredEarlier,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictReason::RootDeclaration => "declared by the project",
            ConflictReason::Nearer => "nearer",
            ConflictReason::DeclaredEarlier => "declared earlier",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedVersion {
    pub version: Version,
    /// `None` when the project itself declared the rejected version
    pub requested_by: Option<Coordinate>,
    pub reason: ConflictReason,
}

/// All versions of one key that lost against the selected one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConflict {
    pub key: ArtifactKey,
    pub selected: Version,
    pub rejected: Vec<RejectedVersion>,
}

impl fmt::Display for VersionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} selected over", self.key, self.selected)?;
        for (i, r) in self.rejected.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            match &r.requested_by {
                Some(by) => write!(f, "{}{} ({}, requested by {})", sep, r.version, r.reason, by)?,
                None => write!(f, "{}{} ({})", sep, r.version, r.reason)?,
            }
        }
        Ok(())
    }
}

/// Mediation outcome, kept with the resolved graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictReport {
    conflicts: Vec<VersionConflict>,
    excluded: Vec<ArtifactKey>,
}

impl ConflictReport {
    pub fn conflicts(&self) -> &[VersionConflict] {
        &self.conflicts
    }

    /// Keys removed by exclusions
    pub fn excluded(&self) -> &[ArtifactKey] {
        &self.excluded
    }

    pub fn get(&self, key: &ArtifactKey) -> Option<&VersionConflict> {
        self.conflicts.iter().find(|c| &c.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty() && self.excluded.is_empty()
    }
}

/// A mediated artifact before its file is fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediatedArtifact {
    pub coordinate: Coordinate,
    pub scope: Scope,
}

/// Ordered, conflict-free selection
#[derive(Debug, Clone, Default)]
pub struct MediatedGraph {
    pub artifacts: Vec<MediatedArtifact>,
    /// (dependent, dependency) positions in `artifacts`
    pub edges: Vec<(usize, usize)>,
    pub report: ConflictReport,
}

struct Selection {
    version: Version,
    vertex: NodeIndex,
    depth: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Single-threaded mediation over a fully expanded graph
pub struct ConflictResolver<'a> {
    graph: &'a mut DependencyGraph,
    request_exclusions: Vec<Exclusion>,
    root_keys: HashSet<ArtifactKey>,
}

/// One breadth-first pass under a fixed exclusion set
struct Mediation {
    selected: IndexMap<ArtifactKey, Selection>,
    conflicts: IndexMap<ArtifactKey, Vec<RejectedVersion>>,
    excluded: IndexSet<ArtifactKey>,
}

impl<'a> ConflictResolver<'a> {
    /// `exclusions` are the request-level exclusions; the ones declared on
    /// edges the mediation follows are added as they are reached
    pub fn new(graph: &'a mut DependencyGraph, exclusions: &[Exclusion]) -> Self {
        let root_keys = graph.roots().iter().map(|(e, _)| e.key.clone()).collect();
        Self {
            graph,
            request_exclusions: exclusions.to_vec(),
            root_keys,
        }
    }

    fn is_excluded(&self, exclusions: &[Exclusion], key: &ArtifactKey) -> bool {
        !self.root_keys.contains(key) && exclusions.iter().any(|e| e.matches(key))
    }

    /// Mediates versions and produces the graph visible to `consumer`
    pub fn resolve(self, consumer: Scope) -> Result<MediatedGraph, ResolveError> {
        // An exclusion found on a followed edge can prune other branches,
        // so mediate again until no new exclusion shows up. The set only
        // grows, which bounds the passes by the number of declared exclusions.
        let mut exclusions = self.request_exclusions.clone();
        let Mediation {
            selected,
            conflicts,
            excluded,
        } = loop {
            let mediation = self.mediate(&exclusions);
            let before = exclusions.len();
            for exclusion in self.followed_exclusions(&mediation.selected, &exclusions) {
                if !exclusions.contains(&exclusion) {
                    exclusions.push(exclusion);
                }
            }
            if exclusions.len() == before {
                break mediation;
            }
        };

        // Dependency edges between selected versions, by selection position
        let n = selected.len();
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, sel) in selected.values().enumerate() {
            for (to, edge) in self.graph.edges_of(sel.vertex) {
                if self.is_excluded(&exclusions, &edge.key) {
                    continue;
                }
                if let Some((j, _, target)) = selected.get_full(&edge.key) {
                    if target.vertex == to && !adjacency[i].contains(&j) {
                        adjacency[i].push(j);
                    }
                }
            }
        }

        let coordinates: Vec<Coordinate> = selected
            .values()
            .map(|sel| {
                self.graph
                    .coordinate(sel.vertex)
                    .cloned()
                    .ok_or_else(|| ResolveError::Aborted("selected vertex vanished".into()))
            })
            .collect::<Result<_, _>>()?;

        if let Some(cycle) = find_cycle(&adjacency) {
            return Err(ResolveError::CyclicDependency(
                cycle.into_iter().map(|i| coordinates[i].clone()).collect(),
            ));
        }

        let scopes = self.propagate_scopes(&selected, &exclusions);
        let order = stable_topological_order(&adjacency);

        // Scope filtering comes last; hidden nodes still took part above
        let mut position = vec![None; n];
        let mut artifacts = Vec::new();
        for &i in &order {
            if let Some(scope) = scopes[i].effective_for(consumer) {
                position[i] = Some(artifacts.len());
                artifacts.push(MediatedArtifact {
                    coordinate: coordinates[i].clone(),
                    scope,
                });
            }
        }

        let mut edges = Vec::new();
        for (i, deps) in adjacency.iter().enumerate() {
            for &j in deps {
                if let (Some(a), Some(b)) = (position[i], position[j]) {
                    edges.push((a, b));
                }
            }
        }

        let report = ConflictReport {
            conflicts: conflicts
                .into_iter()
                .filter_map(|(key, rejected)| {
                    let selected = selected.get(&key)?.version.clone();
                    Some(VersionConflict {
                        key,
                        selected,
                        rejected,
                    })
                })
                .collect(),
            excluded: excluded.into_iter().collect(),
        };

        for conflict in report.conflicts() {
            tracing::debug!(target: "brood::resolve", %conflict, "version conflict mediated");
        }

        for (key, coordinate) in selected.keys().zip(coordinates) {
            self.graph.select(key, coordinate);
        }

        Ok(MediatedGraph {
            artifacts,
            edges,
            report,
        })
    }

    /// Breadth-first walk from the roots; the first version to reach a key
    /// wins and only the winners' edges are followed
    fn mediate(&self, exclusions: &[Exclusion]) -> Mediation {
        let mut selected: IndexMap<ArtifactKey, Selection> = IndexMap::new();
        let mut conflicts: IndexMap<ArtifactKey, Vec<RejectedVersion>> = IndexMap::new();
        let mut excluded: IndexSet<ArtifactKey> = IndexSet::new();

        let mut reject = |key: &ArtifactKey, rejected: RejectedVersion| {
            let list = conflicts.entry(key.clone()).or_default();
            if !list.iter().any(|r| r.version == rejected.version) {
                list.push(rejected);
            }
        };

        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();

        for (edge, vertex) in self.graph.roots() {
            match selected.get(&edge.key) {
                None => {
                    selected.insert(
                        edge.key.clone(),
                        Selection {
                            version: edge.version.clone(),
                            vertex: *vertex,
                            depth: 1,
                        },
                    );
                    queue.push_back((*vertex, 1));
                }
                Some(sel) if sel.version != edge.version => reject(
                    &edge.key,
                    RejectedVersion {
                        version: edge.version.clone(),
                        requested_by: None,
                        reason: ConflictReason::RootDeclaration,
                    },
                ),
                Some(_) => {}
            }
        }

        while let Some((from, depth)) = queue.pop_front() {
            let from_coordinate = self.graph.coordinate(from).cloned();

            for (to, edge) in self.graph.edges_of(from) {
                if self.is_excluded(exclusions, &edge.key) {
                    excluded.insert(edge.key.clone());
                    continue;
                }

                match selected.get(&edge.key) {
                    None => {
                        selected.insert(
                            edge.key.clone(),
                            Selection {
                                version: edge.version.clone(),
                                vertex: to,
                                depth: depth + 1,
                            },
                        );
                        queue.push_back((to, depth + 1));
                    }
                    Some(sel) if sel.version != edge.version => {
                        let reason = if self.root_keys.contains(&edge.key) {
                            ConflictReason::RootDeclaration
                        } else if sel.depth < depth + 1 {
                            ConflictReason::Nearer
                        } else {
                            ConflictReason::DeclaredEarlier
                        };
                        reject(
                            &edge.key,
                            RejectedVersion {
                                version: edge.version.clone(),
                                requested_by: from_coordinate.clone(),
                                reason,
                            },
                        );
                    }
                    Some(_) => {}
                }
            }
        }

        Mediation {
            selected,
            conflicts,
            excluded,
        }
    }

    /// Exclusions declared on the edges that lead to a selected version:
    /// the winning root declarations and the followed edges between winners.
    /// Edges into versions that lost mediation contribute nothing.
    fn followed_exclusions(
        &self,
        selected: &IndexMap<ArtifactKey, Selection>,
        exclusions: &[Exclusion],
    ) -> Vec<Exclusion> {
        let leads_to_winner =
            |key: &ArtifactKey, to: NodeIndex| selected.get(key).is_some_and(|sel| sel.vertex == to);

        let mut found = Vec::new();
        for (edge, vertex) in self.graph.roots() {
            if leads_to_winner(&edge.key, *vertex) {
                found.extend(edge.exclusions.iter().cloned());
            }
        }
        for sel in selected.values() {
            for (to, edge) in self.graph.edges_of(sel.vertex) {
                if !self.is_excluded(exclusions, &edge.key) && leads_to_winner(&edge.key, to) {
                    found.extend(edge.exclusions.iter().cloned());
                }
            }
        }
        found
    }

    fn propagate_scopes(
        &self,
        selected: &IndexMap<ArtifactKey, Selection>,
        exclusions: &[Exclusion],
    ) -> Vec<ScopeSet> {
        let mut scopes = vec![ScopeSet::default(); selected.len()];
        let mut work: VecDeque<(usize, Scope)> = VecDeque::new();
        let mut seen_roots = HashSet::new();

        for (edge, _) in self.graph.roots() {
            if seen_roots.insert(edge.key.clone()) {
                if let Some(i) = selected.get_index_of(&edge.key) {
                    work.push_back((i, edge.scope));
                }
            }
        }

        while let Some((i, scope)) = work.pop_front() {
            if scopes[i].covers(scope) {
                continue;
            }
            scopes[i].insert(scope);

            let Some((_, sel)) = selected.get_index(i) else {
                continue;
            };
            for (_, edge) in self.graph.edges_of(sel.vertex) {
                if edge.optional || self.is_excluded(exclusions, &edge.key) {
                    continue;
                }
                if let (Some(j), Some(derived)) =
                    (selected.get_index_of(&edge.key), scope.derive(edge.scope))
                {
                    work.push_back((j, derived));
                }
            }
        }

        scopes
    }
}

/// White/gray/black depth-first search; returns the first cycle found
fn find_cycle(adjacency: &[Vec<usize>]) -> Option<Vec<usize>> {
    let mut color = vec![Color::White; adjacency.len()];

    for start in 0..adjacency.len() {
        if color[start] != Color::White {
            continue;
        }

        // (vertex, next neighbour to visit); the stack doubles as the path
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        color[start] = Color::Gray;

        while let Some(top) = stack.last_mut() {
            let (v, next) = *top;
            top.1 += 1;

            if let Some(&w) = adjacency[v].get(next) {
                match color[w] {
                    Color::White => {
                        color[w] = Color::Gray;
                        stack.push((w, 0));
                    }
                    Color::Gray => {
                        let from = stack.iter().position(|(u, _)| *u == w).unwrap_or(0);
                        let mut cycle: Vec<usize> = stack[from..].iter().map(|(u, _)| *u).collect();
                        cycle.push(w);
                        return Some(cycle);
                    }
                    Color::Black => {}
                }
            } else {
                color[v] = Color::Black;
                stack.pop();
            }
        }
    }
    None
}

/// Kahn's algorithm emitting dependencies first; among ready nodes the
/// earliest discovered goes first. Expects an acyclic graph.
fn stable_topological_order(adjacency: &[Vec<usize>]) -> Vec<usize> {
    let n = adjacency.len();
    let mut pending: Vec<usize> = adjacency.iter().map(Vec::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, deps) in adjacency.iter().enumerate() {
        for &j in deps {
            dependents[j].push(i);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> =
        (0..n).filter(|i| pending[*i] == 0).map(Reverse).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        for &d in &dependents[i] {
            pending[d] -= 1;
            if pending[d] == 0 {
                ready.push(Reverse(d));
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DependencyDeclaration;
    use crate::resolve::graph::DependencyEdge;

    fn edge(key: &str, version: &str, scope: Scope) -> DependencyEdge {
        let decl = DependencyDeclaration::new(key.parse().unwrap(), version.parse().unwrap(), scope);
        DependencyEdge::from_declaration(&decl, version.parse().unwrap())
    }

    fn names(graph: &MediatedGraph) -> Vec<String> {
        graph.artifacts.iter().map(|a| a.coordinate.to_string()).collect()
    }

    #[test]
    fn nearest_wins_and_ties_go_to_first_declaration() {
        // A -> B -> D:1 ; A -> C -> D:2 ; A -> E -> F -> D:3
        let mut g = DependencyGraph::new();
        let (a, _) = g.add_root(edge("g:a", "1", Scope::Compile));
        let (b, _) = g.add_edge(a, edge("g:b", "1", Scope::Compile), 2, &[]);
        let (c, _) = g.add_edge(a, edge("g:c", "1", Scope::Compile), 2, &[]);
        g.add_edge(b, edge("g:d", "1", Scope::Compile), 3, &[]);
        g.add_edge(c, edge("g:d", "2", Scope::Compile), 3, &[]);

        let mediated = ConflictResolver::new(&mut g, &[]).resolve(Scope::Compile).unwrap();
        // C's edge to D:2 lost mediation, so C is free to come first
        assert_eq!(names(&mediated), vec!["g:c:1", "g:d:1", "g:b:1", "g:a:1"]);

        let conflict = mediated.report.get(&"g:d".parse().unwrap()).unwrap();
        assert_eq!(conflict.selected.to_string(), "1");
        assert_eq!(conflict.rejected[0].version.to_string(), "2");
        assert_eq!(conflict.rejected[0].reason, ConflictReason::DeclaredEarlier);
        assert_eq!(
            g.node(&"g:d".parse().unwrap()).unwrap().selected.as_ref().map(|c| c.to_string()),
            Some("g:d:1".to_string())
        );
    }

    #[test]
    fn mediated_away_branch_is_not_followed() {
        // A -> B:1 -> X ; C -> B:2 -> Y ; B:1 wins, so Y never appears
        let mut g = DependencyGraph::new();
        let (a, _) = g.add_root(edge("g:a", "1", Scope::Compile));
        let (c, _) = g.add_root(edge("g:c", "1", Scope::Compile));
        let (b1, _) = g.add_edge(a, edge("g:b", "1", Scope::Compile), 2, &[]);
        let (b2, _) = g.add_edge(c, edge("g:b", "2", Scope::Compile), 2, &[]);
        g.add_edge(b1, edge("g:x", "1", Scope::Compile), 3, &[]);
        g.add_edge(b2, edge("g:y", "1", Scope::Compile), 3, &[]);

        let mediated = ConflictResolver::new(&mut g, &[]).resolve(Scope::Compile).unwrap();
        let names = names(&mediated);
        assert!(names.contains(&"g:x:1".to_string()));
        assert!(!names.iter().any(|n| n.starts_with("g:y")));
        assert!(!names.contains(&"g:b:2".to_string()));
    }

    #[test]
    fn scope_narrows_and_filters() {
        // test-scoped root pulls a compile dependency: visible to tests only
        let mut g = DependencyGraph::new();
        let (t, _) = g.add_root(edge("g:junit", "4", Scope::Test));
        g.add_edge(t, edge("g:hamcrest", "1", Scope::Compile), 2, &[]);
        let (r, _) = g.add_root(edge("g:app", "1", Scope::Compile));
        g.add_edge(r, edge("g:driver", "1", Scope::Runtime), 2, &[]);

        let compile = ConflictResolver::new(&mut g, &[]).resolve(Scope::Compile).unwrap();
        assert_eq!(names(&compile), vec!["g:app:1"]);

        let runtime = ConflictResolver::new(&mut g, &[]).resolve(Scope::Runtime).unwrap();
        assert_eq!(names(&runtime), vec!["g:driver:1", "g:app:1"]);

        let test = ConflictResolver::new(&mut g, &[]).resolve(Scope::Test).unwrap();
        assert_eq!(test.artifacts.len(), 4);
        let hamcrest = test
            .artifacts
            .iter()
            .find(|a| a.coordinate.name() == "hamcrest")
            .unwrap();
        assert_eq!(hamcrest.scope, Scope::Test);
    }

    #[test]
    fn broader_path_wins_scope() {
        // D reached through a test root and a compile root: compile visible
        let mut g = DependencyGraph::new();
        let (t, _) = g.add_root(edge("g:t", "1", Scope::Test));
        let (c, _) = g.add_root(edge("g:c", "1", Scope::Compile));
        g.add_edge(t, edge("g:d", "1", Scope::Compile), 2, &[]);
        g.add_edge(c, edge("g:d", "1", Scope::Compile), 2, &[]);

        let mediated = ConflictResolver::new(&mut g, &[]).resolve(Scope::Compile).unwrap();
        let d = mediated
            .artifacts
            .iter()
            .find(|a| a.coordinate.name() == "d")
            .unwrap();
        assert_eq!(d.scope, Scope::Compile);
    }

    #[test]
    fn global_exclusion_spares_root_declarations() {
        let mut g = DependencyGraph::new();
        let mut a_edge = edge("g:a", "1", Scope::Compile);
        a_edge.exclusions.push(Exclusion::new("log", "*"));
        let (a, _) = g.add_root(a_edge);
        let (b, _) = g.add_root(edge("g:b", "1", Scope::Compile));
        g.add_edge(b, edge("log:api", "1", Scope::Compile), 2, &[]);
        g.add_root(edge("log:impl", "1", Scope::Compile));
        g.add_edge(a, edge("g:c", "1", Scope::Compile), 2, &[]);

        let mediated = ConflictResolver::new(&mut g, &[]).resolve(Scope::Compile).unwrap();
        let names = names(&mediated);
        assert!(!names.contains(&"log:api:1".to_string()));
        assert!(names.contains(&"log:impl:1".to_string()));
        assert_eq!(
            mediated.report.excluded().to_vec(),
            vec!["log:api".parse::<ArtifactKey>().unwrap()]
        );
    }

    #[test]
    fn exclusion_under_losing_version_is_ignored() {
        // A -> B:1, A -> X ; C -> B:2 -> Y (excludes g:x) ; B:1 wins, X stays
        let mut g = DependencyGraph::new();
        let (a, _) = g.add_root(edge("g:a", "1", Scope::Compile));
        let (c, _) = g.add_root(edge("g:c", "1", Scope::Compile));
        g.add_edge(a, edge("g:b", "1", Scope::Compile), 2, &[]);
        g.add_edge(a, edge("g:x", "1", Scope::Compile), 2, &[]);
        let (b2, _) = g.add_edge(c, edge("g:b", "2", Scope::Compile), 2, &[]);
        let mut y_edge = edge("g:y", "1", Scope::Compile);
        y_edge.exclusions.push(Exclusion::new("g", "x"));
        g.add_edge(b2, y_edge, 3, &[]);

        let mediated = ConflictResolver::new(&mut g, &[]).resolve(Scope::Compile).unwrap();
        assert_eq!(names(&mediated), vec!["g:c:1", "g:b:1", "g:x:1", "g:a:1"]);
        assert!(mediated.report.excluded().is_empty());
    }

    #[test]
    fn exclusion_on_followed_edge_prunes_other_branches() {
        // A -> B -> D ; A -> C (excludes g:d) ; the exclusion is global
        let mut g = DependencyGraph::new();
        let (a, _) = g.add_root(edge("g:a", "1", Scope::Compile));
        let (b, _) = g.add_edge(a, edge("g:b", "1", Scope::Compile), 2, &[]);
        let mut c_edge = edge("g:c", "1", Scope::Compile);
        c_edge.exclusions.push(Exclusion::new("g", "d"));
        g.add_edge(a, c_edge, 2, &[]);
        g.add_edge(b, edge("g:d", "1", Scope::Compile), 3, &[]);

        let mediated = ConflictResolver::new(&mut g, &[]).resolve(Scope::Compile).unwrap();
        assert_eq!(names(&mediated), vec!["g:b:1", "g:c:1", "g:a:1"]);
        assert_eq!(
            mediated.report.excluded().to_vec(),
            vec!["g:d".parse::<ArtifactKey>().unwrap()]
        );
    }

    #[test]
    fn exact_cycle_is_reported() {
        let mut g = DependencyGraph::new();
        let (a, _) = g.add_root(edge("g:a", "1", Scope::Compile));
        let (b, _) = g.add_edge(a, edge("g:b", "1", Scope::Compile), 2, &[]);
        g.add_edge(b, edge("g:a", "1", Scope::Compile), 3, &[]);

        let err = ConflictResolver::new(&mut g, &[]).resolve(Scope::Compile).unwrap_err();
        match err {
            ResolveError::CyclicDependency(path) => {
                let path: Vec<_> = path.iter().map(|c| c.to_string()).collect();
                assert_eq!(path, vec!["g:a:1", "g:b:1", "g:a:1"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn cycle_through_mediated_version_is_broken() {
        // A:1 -> B:1 -> A:0.9 ; A:0.9 loses to the root
        let mut g = DependencyGraph::new();
        let (a, _) = g.add_root(edge("g:a", "1", Scope::Compile));
        let (b, _) = g.add_edge(a, edge("g:b", "1", Scope::Compile), 2, &[]);
        let (old_a, _) = g.add_edge(b, edge("g:a", "0.9", Scope::Compile), 3, &[]);
        g.add_edge(old_a, edge("g:b", "1", Scope::Compile), 4, &[]);

        let mediated = ConflictResolver::new(&mut g, &[]).resolve(Scope::Compile).unwrap();
        assert_eq!(names(&mediated), vec!["g:b:1", "g:a:1"]);
        let conflict = mediated.report.get(&"g:a".parse().unwrap()).unwrap();
        assert_eq!(conflict.rejected[0].reason, ConflictReason::RootDeclaration);
    }

    #[test]
    fn topological_order_prefers_discovery_order() {
        let adjacency = vec![vec![2], vec![], vec![], vec![1]];
        assert_eq!(stable_topological_order(&adjacency), vec![1, 2, 0, 3]);
    }

    #[test]
    fn find_cycle_reports_path() {
        assert_eq!(find_cycle(&[vec![1], vec![2], vec![]]), None);
        assert_eq!(find_cycle(&[vec![1], vec![2], vec![1]]), Some(vec![1, 2, 1]));
        assert_eq!(find_cycle(&[vec![0]]), Some(vec![0, 0]));
    }
}
