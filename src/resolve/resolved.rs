//! Resolution result

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::conflict::{ConflictReport, MediatedGraph};
use crate::domain::{ArtifactKey, Coordinate, Scope};

/// One entry of a resolved graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub coordinate: Coordinate,
    /// Location of the artifact file in the local cache
    pub path: PathBuf,
    /// Effective scope as seen by the consuming scope
    pub scope: Scope,
}

/// Immutable, ordered result of one resolution. Dependencies always come
/// before their dependents.
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    consumer: Scope,
    artifacts: Vec<ResolvedArtifact>,
    index: HashMap<ArtifactKey, usize>,
    dependencies: Vec<Vec<usize>>,
    report: ConflictReport,
}

impl ResolvedGraph {
    /// Pairs a mediated graph with the fetched artifact files, in order
    pub(crate) fn new(consumer: Scope, mediated: MediatedGraph, paths: Vec<PathBuf>) -> Self {
        let artifacts: Vec<ResolvedArtifact> = mediated
            .artifacts
            .into_iter()
            .zip(paths)
            .map(|(a, path)| ResolvedArtifact {
                coordinate: a.coordinate,
                path,
                scope: a.scope,
            })
            .collect();

        let index = artifacts
            .iter()
            .enumerate()
            .map(|(i, a)| (a.coordinate.key().clone(), i))
            .collect();

        let mut dependencies = vec![Vec::new(); artifacts.len()];
        for (from, to) in mediated.edges {
            if let Some(deps) = dependencies.get_mut(from) {
                deps.push(to);
            }
        }

        Self {
            consumer,
            artifacts,
            index,
            dependencies,
            report: mediated.report,
        }
    }

    /// The scope this graph was resolved for
    pub fn scope(&self) -> Scope {
        self.consumer
    }

    pub fn artifacts(&self) -> &[ResolvedArtifact] {
        &self.artifacts
    }

    /// Artifact files in dependency order
    pub fn classpath(&self) -> Vec<&Path> {
        self.artifacts.iter().map(|a| a.path.as_path()).collect()
    }

    pub fn coordinates(&self) -> Vec<&Coordinate> {
        self.artifacts.iter().map(|a| &a.coordinate).collect()
    }

    pub fn get(&self, key: &ArtifactKey) -> Option<&ResolvedArtifact> {
        self.index.get(key).map(|i| &self.artifacts[*i])
    }

    pub fn position(&self, key: &ArtifactKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Direct dependencies of `key` that are part of this graph
    pub fn dependencies_of(&self, key: &ArtifactKey) -> Vec<&ResolvedArtifact> {
        self.index
            .get(key)
            .map(|i| {
                self.dependencies[*i]
                    .iter()
                    .map(|j| &self.artifacts[*j])
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn conflicts(&self) -> &ConflictReport {
        &self.report
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::conflict::MediatedArtifact;

    fn mediated() -> MediatedGraph {
        MediatedGraph {
            artifacts: vec![
                MediatedArtifact {
                    coordinate: "g:lib:1.0".parse().unwrap(),
                    scope: Scope::Compile,
                },
                MediatedArtifact {
                    coordinate: "g:app:2.0".parse().unwrap(),
                    scope: Scope::Runtime,
                },
            ],
            edges: vec![(1, 0)],
            report: ConflictReport::default(),
        }
    }

    #[test]
    fn exposes_ordered_classpath() {
        let graph = ResolvedGraph::new(
            Scope::Runtime,
            mediated(),
            vec![PathBuf::from("/r/lib.jar"), PathBuf::from("/r/app.jar")],
        );

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.scope(), Scope::Runtime);
        assert_eq!(
            graph.classpath(),
            vec![Path::new("/r/lib.jar"), Path::new("/r/app.jar")]
        );

        let app: ArtifactKey = "g:app".parse().unwrap();
        let deps = graph.dependencies_of(&app);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].coordinate.to_string(), "g:lib:1.0");
        assert_eq!(graph.position(&app), Some(1));
        assert!(graph.dependencies_of(&"g:lib".parse().unwrap()).is_empty());
        assert!(graph.get(&"x:y".parse().unwrap()).is_none());
    }
}
