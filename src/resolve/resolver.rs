//! Graph expansion
//!
//! Walks the dependency graph breadth-first, one depth level at a time. The
//! descriptors of a level, and the version listings its range requirements
//! need, are fetched in parallel on a bounded pool; everything that decides
//! graph shape runs sequentially in declaration order, so the resulting graph
//! does not depend on fetch timing.

use rayon::prelude::*;
use std::collections::{HashMap, HashSet};

use super::conflict::ConflictResolver;
use super::graph::{DependencyEdge, DependencyGraph};
use super::resolved::ResolvedGraph;
use super::ResolveError;
use crate::cancel::CancellationFlag;
use crate::domain::{
    ArtifactKey, Coordinate, DependencyDeclaration, Exclusion, Scope, Version, VersionRequirement,
};
use crate::repository::RepositoryClient;

/// What to resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    /// Direct dependencies, in declaration order
    pub roots: Vec<DependencyDeclaration>,
    /// Exclusions applied to the whole request
    pub exclusions: Vec<Exclusion>,
    /// The consuming scope the result is filtered for
    pub scope: Scope,
}

impl ResolveRequest {
    pub fn new(roots: Vec<DependencyDeclaration>, scope: Scope) -> Self {
        Self {
            roots,
            exclusions: Vec::new(),
            scope,
        }
    }

    pub fn with_exclusions(mut self, exclusions: Vec<Exclusion>) -> Self {
        self.exclusions = exclusions;
        self
    }
}

/// A vertex waiting for its descriptor
struct Pending {
    vertex: petgraph::graph::NodeIndex,
    coordinate: Coordinate,
    /// Exclusions accumulated along the discovering path
    exclusions: Vec<Exclusion>,
    /// Coordinates from the root down to this vertex
    path: Vec<Coordinate>,
}

fn build_pool(threads: usize) -> Option<rayon::ThreadPool> {
    // Thread creation can fail under tight process limits; shrink, then go inline
    let mut threads = threads.max(1);
    loop {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("brood-fetch-{idx}"))
            .build()
        {
            Ok(pool) => return Some(pool),
            Err(_) if threads > 1 => threads = (threads / 2).max(1),
            Err(e) => {
                tracing::warn!(
                    target: "brood::resolve",
                    error = %e,
                    "no fetch workers available, fetching inline"
                );
                return None;
            }
        }
    }
}

/// Expands, mediates and fetches
pub struct Resolver {
    client: RepositoryClient,
    pool: Option<rayon::ThreadPool>,
}

impl Resolver {
    pub fn new(client: RepositoryClient, fetch_workers: usize) -> Self {
        Self {
            client,
            pool: build_pool(fetch_workers),
        }
    }

    pub fn client(&self) -> &RepositoryClient {
        &self.client
    }

    fn cancel(&self) -> &CancellationFlag {
        self.client.cancellation_flag()
    }

    fn check_cancelled(&self) -> Result<(), ResolveError> {
        if self.cancel().is_cancelled() {
            Err(ResolveError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Maps `f` over `items` on the fetch pool, keeping input order
    fn parallel<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(|| items.par_iter().map(&f).collect()),
            None => items.iter().map(f).collect(),
        }
    }

    /// Resolves `request` into an ordered graph with fetched artifact files
    pub fn resolve(&self, request: &ResolveRequest) -> Result<ResolvedGraph, ResolveError> {
        let mut graph = self.expand(request)?;

        let mediated = ConflictResolver::new(&mut graph, &request.exclusions).resolve(request.scope)?;
        self.check_cancelled()?;

        let coordinates: Vec<Coordinate> = mediated
            .artifacts
            .iter()
            .map(|a| a.coordinate.clone())
            .collect();
        let paths = self
            .parallel(&coordinates, |c| self.client.fetch_artifact(c))
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            target: "brood::resolve",
            scope = %request.scope,
            roots = request.roots.len(),
            vertices = graph.vertex_count(),
            artifacts = paths.len(),
            conflicts = mediated.report.conflicts().len(),
            "resolved"
        );

        Ok(ResolvedGraph::new(request.scope, mediated, paths))
    }

    /// Builds the raw graph for `request` without mediating it
    pub fn expand(&self, request: &ResolveRequest) -> Result<DependencyGraph, ResolveError> {
        self.check_cancelled()?;

        for root in &request.roots {
            check_satisfiable(root)?;
        }

        let root_keys: HashSet<ArtifactKey> = request.roots.iter().map(|r| r.key()).collect();
        let mut listings: HashMap<ArtifactKey, Vec<Version>> = HashMap::new();
        self.fetch_listings(range_keys(request.roots.iter(), &listings), &mut listings)?;

        let mut graph = DependencyGraph::new();
        let mut level: Vec<Pending> = Vec::new();

        for root in &request.roots {
            let version = pick_version(root, &listings, None)?;
            let edge = DependencyEdge::from_declaration(root, version);
            let coordinate = edge.coordinate();
            let (vertex, is_new) = graph.add_root(edge);
            if is_new {
                let mut exclusions = request.exclusions.clone();
                exclusions.extend(root.exclusions.iter().cloned());
                level.push(Pending {
                    vertex,
                    coordinate: coordinate.clone(),
                    exclusions,
                    path: vec![coordinate],
                });
            }
        }

        let mut depth = 1;
        while !level.is_empty() {
            self.check_cancelled()?;

            let coordinates: Vec<Coordinate> = level.iter().map(|p| p.coordinate.clone()).collect();
            let descriptors = self.parallel(&coordinates, |c| self.client.fetch_descriptor(c));

            let mut accepted: Vec<(usize, DependencyDeclaration)> = Vec::new();
            for (i, descriptor) in descriptors.into_iter().enumerate() {
                let descriptor = descriptor?;
                for decl in descriptor.dependencies {
                    if decl.optional && !root_keys.contains(&decl.key()) {
                        continue;
                    }
                    if !decl.scope.is_transitive() {
                        continue;
                    }
                    if decl.is_excluded_by(&level[i].exclusions) {
                        tracing::trace!(
                            target: "brood::resolve",
                            dependency = %decl.key(),
                            parent = %coordinates[i],
                            "excluded on path"
                        );
                        continue;
                    }
                    check_satisfiable(&decl)?;
                    accepted.push((i, decl));
                }
            }

            self.fetch_listings(range_keys(accepted.iter().map(|(_, d)| d), &listings), &mut listings)?;

            let mut next = Vec::new();
            for (i, decl) in accepted {
                let parent = &level[i];
                let version = pick_version(&decl, &listings, Some(&coordinates[i]))?;
                let edge = DependencyEdge::from_declaration(&decl, version);
                let coordinate = edge.coordinate();

                let (vertex, is_new) = graph.add_edge(parent.vertex, edge, depth + 1, &parent.path);
                if is_new {
                    let mut exclusions = parent.exclusions.clone();
                    exclusions.extend(decl.exclusions.iter().cloned());
                    let mut path = parent.path.clone();
                    path.push(coordinate.clone());
                    next.push(Pending {
                        vertex,
                        coordinate,
                        exclusions,
                        path,
                    });
                }
            }

            tracing::debug!(
                target: "brood::resolve",
                depth,
                expanded = level.len(),
                discovered = next.len(),
                "expanded level"
            );

            level = next;
            depth += 1;
        }

        Ok(graph)
    }

    fn fetch_listings(
        &self,
        keys: Vec<ArtifactKey>,
        listings: &mut HashMap<ArtifactKey, Vec<Version>>,
    ) -> Result<(), ResolveError> {
        if keys.is_empty() {
            return Ok(());
        }
        let fetched = self.parallel(&keys, |k| self.client.fetch_versions(k));
        for (key, versions) in keys.into_iter().zip(fetched) {
            listings.insert(key, versions?);
        }
        Ok(())
    }
}

/// Keys of range requirements whose listing is not known yet, first-seen order
fn range_keys<'a>(
    decls: impl Iterator<Item = &'a DependencyDeclaration>,
    known: &HashMap<ArtifactKey, Vec<Version>>,
) -> Vec<ArtifactKey> {
    let mut keys = Vec::new();
    for decl in decls.filter(|d| d.version.is_range()) {
        let key = decl.key();
        if !known.contains_key(&key) && !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

fn check_satisfiable(decl: &DependencyDeclaration) -> Result<(), ResolveError> {
    if decl.version.is_satisfiable() {
        Ok(())
    } else {
        Err(ResolveError::InvalidRequirement {
            key: decl.key().to_string(),
            reason: format!("'{}' cannot match any version", decl.version),
        })
    }
}

/// Exact requirements are taken verbatim; ranges pick the highest available
/// version inside the range
fn pick_version(
    decl: &DependencyDeclaration,
    listings: &HashMap<ArtifactKey, Vec<Version>>,
    requested_by: Option<&Coordinate>,
) -> Result<Version, ResolveError> {
    match &decl.version {
        VersionRequirement::Exact(version) => Ok(version.clone()),
        VersionRequirement::Ranges(_) => {
            let key = decl.key();
            let available = listings.get(&key).map(Vec::as_slice).unwrap_or(&[]);
            decl.version
                .select_highest(available)
                .cloned()
                .ok_or_else(|| ResolveError::UnresolvableCoordinate {
                    coordinate: format!("{}:{}", key, decl.version),
                    reason: match requested_by {
                        Some(by) => format!("no published version matches (required by {})", by),
                        None => "no published version matches".into(),
                    },
                })
        }
    }
}
