//! Artifact coordinates
//!
//! Format:
//! - `group:name:version` (extension defaults to `jar`)
//! - `group:name:extension:version`
//! - `group:name:extension:classifier:version`
//!
//! Conflict mediation works on [`ArtifactKey`] (group + name); fetching needs
//! the full [`Coordinate`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::version::{Version, VersionError};

pub const DEFAULT_EXTENSION: &str = "jar";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinateError {
    #[error("Invalid coordinate format: expected 'group:name[:extension[:classifier]]:version', got '{0}'")]
    InvalidFormat(String),

    #[error("Invalid artifact key: expected 'group:name', got '{0}'")]
    InvalidKey(String),

    #[error("Invalid version in '{coordinate}': {source}")]
    InvalidVersion {
        coordinate: String,
        source: VersionError,
    },
}

fn valid_segment(s: &str) -> bool {
    !s.is_empty() && !s.contains(['/', '\\', ':']) && !s.chars().any(char::is_whitespace)
}

/// Identity of an artifact for conflict purposes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactKey {
    group: String,
    name: String,
}

impl ArtifactKey {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory of this artifact inside a repository tree
    pub fn directory(&self) -> String {
        format!("{}/{}", self.group.replace('.', "/"), self.name)
    }

    /// Location of the version listing inside a repository tree
    pub fn versions_path(&self) -> String {
        format!("{}/versions.json", self.directory())
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

impl FromStr for ArtifactKey {
    type Err = CoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split(':').collect::<Vec<_>>().as_slice() {
            [g, n] if valid_segment(g) && valid_segment(n) => Ok(Self::new(*g, *n)),
            _ => Err(CoordinateError::InvalidKey(s.to_string())),
        }
    }
}

impl TryFrom<String> for ArtifactKey {
    type Error = CoordinateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArtifactKey> for String {
    fn from(key: ArtifactKey) -> Self {
        key.to_string()
    }
}

/// Fully qualified artifact coordinate. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Coordinate {
    key: ArtifactKey,
    version: Version,
    classifier: Option<String>,
    extension: String,
}

impl Coordinate {
    /// Creates a `jar` coordinate without classifier
    pub fn new(key: ArtifactKey, version: Version) -> Self {
        Self {
            key,
            version,
            classifier: None,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Same artifact at another version
    pub fn at_version(&self, version: Version) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }

    pub fn key(&self) -> &ArtifactKey {
        &self.key
    }

    pub fn group(&self) -> &str {
        self.key.group()
    }

    pub fn name(&self) -> &str {
        self.key.name()
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    fn file_stem(&self) -> String {
        format!("{}-{}", self.key.name(), self.version)
    }

    fn version_directory(&self) -> String {
        format!("{}/{}", self.key.directory(), self.version)
    }

    /// Location of the artifact file inside a repository tree
    pub fn artifact_path(&self) -> String {
        match &self.classifier {
            Some(c) => format!(
                "{}/{}-{}.{}",
                self.version_directory(),
                self.file_stem(),
                c,
                self.extension
            ),
            None => format!(
                "{}/{}.{}",
                self.version_directory(),
                self.file_stem(),
                self.extension
            ),
        }
    }

    /// Location of the dependency descriptor inside a repository tree
    pub fn descriptor_path(&self) -> String {
        format!("{}/{}.deps.json", self.version_directory(), self.file_stem())
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.classifier, self.extension.as_str()) {
            (None, DEFAULT_EXTENSION) => write!(f, "{}:{}", self.key, self.version),
            (None, ext) => write!(f, "{}:{}:{}", self.key, ext, self.version),
            (Some(c), ext) => write!(f, "{}:{}:{}:{}", self.key, ext, c, self.version),
        }
    }
}

impl FromStr for Coordinate {
    type Err = CoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parts: Vec<&str> = s.split(':').collect();
        let invalid = || CoordinateError::InvalidFormat(s.to_string());

        let (g, n, ext, classifier, v) = match parts.as_slice() {
            [g, n, v] => (*g, *n, DEFAULT_EXTENSION, None, *v),
            [g, n, e, v] => (*g, *n, *e, None, *v),
            [g, n, e, c, v] => (*g, *n, *e, Some(*c), *v),
            _ => return Err(invalid()),
        };

        if ![g, n, ext].iter().all(|p| valid_segment(p)) || classifier.is_some_and(|c| !valid_segment(c)) {
            return Err(invalid());
        }

        let version = Version::parse(v).map_err(|source| CoordinateError::InvalidVersion {
            coordinate: s.to_string(),
            source,
        })?;

        Ok(Self {
            key: ArtifactKey::new(g, n),
            version,
            classifier: classifier.map(str::to_string),
            extension: ext.to_string(),
        })
    }
}

impl TryFrom<String> for Coordinate {
    type Error = CoordinateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Coordinate> for String {
    fn from(c: Coordinate) -> Self {
        c.to_string()
    }
}

/// Exclusion pattern; `*` matches any group or name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Exclusion {
    pub group: String,
    pub name: String,
}

impl Exclusion {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }

    pub fn matches(&self, key: &ArtifactKey) -> bool {
        (self.group == "*" || self.group == key.group())
            && (self.name == "*" || self.name == key.name())
    }
}

impl From<&ArtifactKey> for Exclusion {
    fn from(key: &ArtifactKey) -> Self {
        Self::new(key.group(), key.name())
    }
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_form() {
        let c: Coordinate = "org.example:core:1.2.3".parse().unwrap();
        assert_eq!(c.group(), "org.example");
        assert_eq!(c.name(), "core");
        assert_eq!(c.version().as_str(), "1.2.3");
        assert_eq!(c.extension(), "jar");
        assert_eq!(c.classifier(), None);
        assert_eq!(c.to_string(), "org.example:core:1.2.3");
    }

    #[test]
    fn parses_extension_and_classifier() {
        let c: Coordinate = "org.example:core:jar:sources:1.0".parse().unwrap();
        assert_eq!(c.classifier(), Some("sources"));
        assert_eq!(c.to_string(), "org.example:core:jar:sources:1.0");

        let pom: Coordinate = "org.example:bom:pom:2.0".parse().unwrap();
        assert_eq!(pom.extension(), "pom");
        assert_eq!(pom.to_string(), "org.example:bom:pom:2.0");
    }

    #[test]
    fn rejects_invalid_format() {
        assert!("core".parse::<Coordinate>().is_err());
        assert!("g:n".parse::<Coordinate>().is_err());
        assert!("g::1.0".parse::<Coordinate>().is_err());
        assert!("g:n: ".parse::<Coordinate>().is_err());
        assert!("g/x:n:1.0".parse::<Coordinate>().is_err());
        assert!("a:b:c:d:e:f".parse::<Coordinate>().is_err());
    }

    #[test]
    fn repository_layout_paths() {
        let c: Coordinate = "org.example:core:1.0".parse().unwrap();
        assert_eq!(c.artifact_path(), "org/example/core/1.0/core-1.0.jar");
        assert_eq!(c.descriptor_path(), "org/example/core/1.0/core-1.0.deps.json");
        assert_eq!(c.key().versions_path(), "org/example/core/versions.json");

        let sources = c.clone().with_classifier("sources");
        assert_eq!(sources.artifact_path(), "org/example/core/1.0/core-1.0-sources.jar");
    }

    #[test]
    fn identity_for_conflicts_ignores_version() {
        let a: Coordinate = "g:n:1.0".parse().unwrap();
        let b: Coordinate = "g:n:2.0".parse().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.key(), b.key());
        assert_eq!(a.at_version(b.version().clone()), b);
    }

    #[test]
    fn exclusion_wildcards() {
        let key = ArtifactKey::new("org.slf4j", "slf4j-api");
        assert!(Exclusion::new("org.slf4j", "slf4j-api").matches(&key));
        assert!(Exclusion::new("org.slf4j", "*").matches(&key));
        assert!(Exclusion::new("*", "*").matches(&key));
        assert!(!Exclusion::new("org.slf4j", "other").matches(&key));
    }

    #[test]
    fn artifact_key_parse() {
        let key: ArtifactKey = "g:n".parse().unwrap();
        assert_eq!(key, ArtifactKey::new("g", "n"));
        assert!("g:n:1".parse::<ArtifactKey>().is_err());
    }

    #[test]
    fn serde_roundtrip_coordinate() {
        let coordinate: Coordinate = "g:n:zip:dist:1.0".parse().unwrap();
        let json = serde_json::to_string(&coordinate).unwrap();
        assert_eq!(json, "\"g:n:zip:dist:1.0\"");
        let parsed: Coordinate = serde_json::from_str(&json).unwrap();
        assert_eq!(coordinate, parsed);
    }
}
