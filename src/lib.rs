//! Brood - execution core of a project build tool
//!
//! Turns a declared graph of build tasks and a declared set of artifact
//! dependencies into a deterministic build: the [`task`] engine runs tasks in
//! prerequisite order with skip and cancel semantics, and the [`resolve`]
//! engine expands direct dependencies into a conflict-free, ordered classpath
//! fetched through the [`repository`] layer.

pub mod cancel;
pub mod config;
pub mod domain;
pub mod repository;
pub mod resolve;
pub mod session;
pub mod task;

pub use cancel::CancellationFlag;
pub use config::{BuildConfig, ConfigError};
pub use domain::{ArtifactKey, Coordinate, DependencyDeclaration, Exclusion, Scope, Version, VersionRequirement};
pub use repository::{RepositoryClient, RepositoryEndpoint, RepositoryError};
pub use resolve::{ResolveError, ResolveRequest, ResolvedArtifact, ResolvedGraph};
pub use session::{BuildSession, ProjectDeclaration};
pub use task::{FnTask, RunReport, Task, TaskContext, TaskError, TaskRegistry, TaskResult};
