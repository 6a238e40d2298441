//! Build configuration
//!
//! One [`BuildConfig`] is constructed when a build session starts and passed
//! by reference to every component; nothing looks configuration up globally.
//! It is usually read from a TOML file:
//!
//! ```toml
//! offline = false
//! fetch_workers = 8
//! metadata_max_age_secs = 86400
//! skip = ["test"]
//!
//! [retry]
//! attempts = 3
//! backoff_ms = 200
//!
//! [[repositories]]
//! id = "central-mirror"
//! url = "file:///srv/maven"
//!
//! [properties]
//! "test.enabled" = "true"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Credentials handed to repository endpoints that need them
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One remote repository, in priority order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Stable identity, part of resolution fingerprints
    pub id: String,

    /// Base location (`file://` URL or plain path for the built-in endpoint)
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

/// Retry policy applied by the build session to transient repository failures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub attempts: u32,

    /// Pause between attempts in milliseconds
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_ms: 200,
        }
    }
}

impl RetryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Configuration for one build invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Local artifact cache; defaults to the user cache directory
    pub local_repository: Option<PathBuf>,

    /// Never contact remote endpoints
    pub offline: bool,

    /// Parallel metadata/artifact fetches during resolution
    pub fetch_workers: usize,

    /// Age after which cached version listings are fetched again
    pub metadata_max_age_secs: u64,

    /// Retry policy for transient repository failures
    pub retry: RetryConfig,

    /// Tasks that are recorded as skipped instead of being run
    pub skip: Vec<String>,

    /// Remote repositories in priority order
    pub repositories: Vec<RepositoryConfig>,

    /// Free-form project properties visible to tasks
    pub properties: BTreeMap<String, String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            local_repository: None,
            offline: false,
            fetch_workers: 8,
            metadata_max_age_secs: 24 * 60 * 60,
            retry: RetryConfig::default(),
            skip: vec![],
            repositories: vec![],
            properties: BTreeMap::new(),
        }
    }
}

impl BuildConfig {
    /// Loads configuration from a TOML file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read build config: {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to load build config: {}", path.display()))
    }

    /// Parses and validates configuration text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_workers == 0 {
            return Err(ConfigError::Invalid("fetch_workers must be at least 1".into()));
        }
        if self.retry.attempts == 0 {
            return Err(ConfigError::Invalid("retry.attempts must be at least 1".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for repo in &self.repositories {
            if repo.id.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "repository '{}' has an empty id",
                    repo.url
                )));
            }
            if !seen.insert(repo.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate repository id '{}'",
                    repo.id
                )));
            }
        }
        Ok(())
    }

    /// Saves the configuration as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize build config")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write build config: {}", path.display()))
    }

    /// Returns the default local repository under the user cache directory
    pub fn default_local_repository() -> PathBuf {
        ProjectDirs::from("dev", "brood", "brood")
            .map(|dirs| dirs.cache_dir().join("repository"))
            .unwrap_or_else(|| PathBuf::from(".brood").join("repository"))
    }

    /// Returns the effective local repository directory
    pub fn local_repository_dir(&self) -> PathBuf {
        self.local_repository
            .clone()
            .unwrap_or_else(Self::default_local_repository)
    }

    pub fn metadata_max_age(&self) -> Duration {
        Duration::from_secs(self.metadata_max_age_secs)
    }

    /// Returns a project property
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Reads a boolean property (`true`/`yes`/`1`, case-insensitive)
    pub fn flag(&self, key: &str) -> bool {
        self.property(key)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"))
            .unwrap_or(false)
    }

    /// Returns true if the named task is configured to be skipped
    pub fn is_skipped(&self, task: &str) -> bool {
        self.skip.iter().any(|s| s == task)
    }
}
