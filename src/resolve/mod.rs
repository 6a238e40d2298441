//! Dependency resolution
//!
//! Expansion ([`Resolver`]) builds a raw [`DependencyGraph`] from the
//! repositories; mediation ([`ConflictResolver`]) turns it into an ordered,
//! conflict-free [`ResolvedGraph`]. [`ResolutionCache`] memoizes results by
//! [`Fingerprint`].

mod cache;
mod conflict;
mod fingerprint;
mod graph;
mod resolved;
mod resolver;

use thiserror::Error;

use crate::domain::Coordinate;
use crate::repository::RepositoryError;

pub use cache::ResolutionCache;
pub use conflict::{
    ConflictReason, ConflictReport, ConflictResolver, MediatedArtifact, MediatedGraph,
    RejectedVersion, VersionConflict,
};
pub use fingerprint::Fingerprint;
pub use graph::{Candidate, DependencyEdge, DependencyGraph, DependencyNode};
pub use resolved::{ResolvedArtifact, ResolvedGraph};
pub use resolver::{ResolveRequest, Resolver};

fn format_path(path: &[Coordinate]) -> String {
    path.iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Resolution failure. Cloneable so one cached failure can reach every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Cannot resolve {coordinate}: {reason}")]
    UnresolvableCoordinate { coordinate: String, reason: String },

    #[error("Dependency cycle: {}", format_path(.0))]
    CyclicDependency(Vec<Coordinate>),

    #[error("Repository unavailable: {0}")]
    RepositoryUnavailable(String),

    #[error("Invalid version requirement for {key}: {reason}")]
    InvalidRequirement { key: String, reason: String },

    #[error("Resolution cancelled")]
    Cancelled,

    #[error("Resolution aborted: {0}")]
    Aborted(String),
}

impl ResolveError {
    /// True for failures worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, ResolveError::RepositoryUnavailable(_))
    }
}

impl From<RepositoryError> for ResolveError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::ArtifactNotFound(what) => ResolveError::UnresolvableCoordinate {
                coordinate: what,
                reason: "not found in any repository".into(),
            },
            RepositoryError::InvalidDescriptor { what, reason } => {
                ResolveError::UnresolvableCoordinate {
                    coordinate: what,
                    reason: format!("invalid metadata: {}", reason),
                }
            }
            e @ RepositoryError::RepositoryUnavailable { .. } => {
                ResolveError::RepositoryUnavailable(e.to_string())
            }
            e @ RepositoryError::Io(_) => ResolveError::RepositoryUnavailable(e.to_string()),
            RepositoryError::Cancelled => ResolveError::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_errors_map_to_resolution_errors() {
        let missing: ResolveError = RepositoryError::ArtifactNotFound("g:n:1".into()).into();
        assert!(matches!(missing, ResolveError::UnresolvableCoordinate { .. }));
        assert!(!missing.is_transient());

        let down: ResolveError = RepositoryError::RepositoryUnavailable {
            what: "g:n:1".into(),
            reason: "timeout".into(),
        }
        .into();
        assert!(down.is_transient());

        let cancelled: ResolveError = RepositoryError::Cancelled.into();
        assert_eq!(cancelled, ResolveError::Cancelled);
    }

    #[test]
    fn cycle_message_lists_path() {
        let err = ResolveError::CyclicDependency(vec![
            "g:a:1".parse().unwrap(),
            "g:b:1".parse().unwrap(),
            "g:a:1".parse().unwrap(),
        ]);
        assert_eq!(err.to_string(), "Dependency cycle: g:a:1 -> g:b:1 -> g:a:1");
    }
}
