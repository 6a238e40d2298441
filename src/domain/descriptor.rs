//! Dependency declarations and artifact descriptors
//!
//! A descriptor lists the direct dependencies of one exact coordinate. It is
//! stored next to the artifact as `name-version.deps.json`:
//!
//! ```json
//! {
//!   "dependencies": [
//!     { "group": "org.example", "name": "util", "version": "[1.0,2.0)",
//!       "scope": "runtime", "optional": false,
//!       "exclusions": [{ "group": "org.slf4j", "name": "*" }] }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::coordinate::{ArtifactKey, Coordinate, Exclusion, DEFAULT_EXTENSION};
use super::scope::Scope;
use super::version::{Version, VersionRequirement};

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A declared dependency: a key with a version requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDeclaration {
    pub group: String,
    pub name: String,
    pub version: VersionRequirement,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusions: Vec<Exclusion>,
}

impl DependencyDeclaration {
    pub fn new(key: ArtifactKey, version: VersionRequirement, scope: Scope) -> Self {
        Self {
            group: key.group().to_string(),
            name: key.name().to_string(),
            version,
            scope,
            optional: false,
            classifier: None,
            extension: default_extension(),
            exclusions: Vec::new(),
        }
    }

    /// Declares an exact coordinate
    pub fn of(coordinate: &Coordinate, scope: Scope) -> Self {
        let mut decl = Self::new(
            coordinate.key().clone(),
            VersionRequirement::exact(coordinate.version().clone()),
            scope,
        );
        decl.classifier = coordinate.classifier().map(str::to_string);
        decl.extension = coordinate.extension().to_string();
        decl
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn exclude(mut self, exclusion: Exclusion) -> Self {
        self.exclusions.push(exclusion);
        self
    }

    pub fn key(&self) -> ArtifactKey {
        ArtifactKey::new(&self.group, &self.name)
    }

    /// Builds the concrete coordinate once a version has been chosen
    pub fn coordinate(&self, version: Version) -> Coordinate {
        let mut c = Coordinate::new(self.key(), version).with_extension(&self.extension);
        if let Some(classifier) = &self.classifier {
            c = c.with_classifier(classifier);
        }
        c
    }

    pub fn is_excluded_by(&self, exclusions: &[Exclusion]) -> bool {
        let key = self.key();
        exclusions.iter().any(|e| e.matches(&key))
    }
}

/// Direct dependencies of one published coordinate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(default)]
    pub dependencies: Vec<DependencyDeclaration>,
}

impl Descriptor {
    pub fn new(dependencies: Vec<DependencyDeclaration>) -> Self {
        Self { dependencies }
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}

/// Published versions of one artifact key, as stored in `versions.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionListing {
    pub versions: Vec<Version>,
}

impl VersionListing {
    /// Sorted ascending and deduplicated
    pub fn sorted(mut self) -> Vec<Version> {
        self.versions.sort();
        self.versions.dedup();
        self.versions
    }
}
