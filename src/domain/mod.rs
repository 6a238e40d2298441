//! Domain models for the build core
//!
//! Plain data types shared by the resolver and the task engine, without any
//! I/O concerns.

mod coordinate;
mod descriptor;
mod scope;
mod version;

pub use coordinate::{ArtifactKey, Coordinate, CoordinateError, Exclusion, DEFAULT_EXTENSION};
pub use descriptor::{DependencyDeclaration, Descriptor, VersionListing};
pub use scope::{Scope, ScopeError, ScopeSet};
pub use version::{Bound, Interval, Version, VersionError, VersionRequirement};
