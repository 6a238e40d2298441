//! Repository endpoints
//!
//! An endpoint serves files of a repository tree by relative path. Transports
//! other than the local file system are supplied by the application.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::config::{ConfigError, RepositoryConfig};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EndpointError {
    /// The endpoint answered authoritatively that the file does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transient failure; another attempt may succeed
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

/// A source of repository files
pub trait RepositoryEndpoint: Send + Sync {
    /// Stable identity, used in fingerprints and cache side-files
    fn id(&self) -> &str;

    /// Fetches the bytes stored at `relative_path`
    fn get(&self, relative_path: &str) -> Result<Vec<u8>, EndpointError>;
}

/// Serves a repository tree from a local directory
#[derive(Debug, Clone)]
pub struct DirectoryEndpoint {
    id: String,
    root: PathBuf,
}

impl DirectoryEndpoint {
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
        }
    }

    /// Builds an endpoint from a `file://` URL or a plain path
    pub fn from_config(config: &RepositoryConfig) -> Result<Self, ConfigError> {
        let url = config.url.trim();
        let root = if let Some(path) = url.strip_prefix("file://") {
            PathBuf::from(path)
        } else if url.contains("://") {
            return Err(ConfigError::Invalid(format!(
                "repository '{}': no built-in transport for '{}'",
                config.id, url
            )));
        } else {
            PathBuf::from(url)
        };
        Ok(Self::new(&config.id, root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl RepositoryEndpoint for DirectoryEndpoint {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, relative_path: &str) -> Result<Vec<u8>, EndpointError> {
        let relative = Path::new(relative_path);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(EndpointError::NotFound(relative_path.to_string()));
        }

        match fs::read(self.root.join(relative)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(EndpointError::NotFound(relative_path.to_string()))
            }
            Err(e) => Err(EndpointError::Unavailable(format!("{}: {}", relative_path, e))),
        }
    }
}
