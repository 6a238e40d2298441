//! Repository client
//!
//! Looks in the local cache first, then asks endpoints in priority order and
//! stops at the first success. Fetched bytes are persisted to the cache before
//! being handed out. The client never retries; that is the session's call.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use super::endpoint::{DirectoryEndpoint, EndpointError, RepositoryEndpoint};
use super::local::{CachedEntry, LocalCache};
use crate::cancel::CancellationFlag;
use crate::config::{BuildConfig, ConfigError, RepositoryConfig};
use crate::domain::{ArtifactKey, Coordinate, Descriptor, Version, VersionListing};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    /// Every endpoint answered not-found
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    /// At least one endpoint failed transiently and none succeeded
    #[error("Repository unavailable while fetching {what}: {reason}")]
    RepositoryUnavailable { what: String, reason: String },

    #[error("Invalid descriptor for {what}: {reason}")]
    InvalidDescriptor { what: String, reason: String },

    #[error("Local cache error: {0}")]
    Io(String),

    #[error("Fetch cancelled")]
    Cancelled,
}

impl From<anyhow::Error> for RepositoryError {
    fn from(e: anyhow::Error) -> Self {
        RepositoryError::Io(format!("{:#}", e))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Freshness {
    /// Immutable content; any cached copy is good
    Forever,
    /// Mutable metadata; refetch once older than the configured age
    MaxAge,
}

/// Fetches versions, descriptors and artifacts from ranked endpoints
#[derive(Clone)]
pub struct RepositoryClient {
    endpoints: Vec<Arc<dyn RepositoryEndpoint>>,
    cache: LocalCache,
    offline: bool,
    metadata_max_age: Duration,
    cancel: CancellationFlag,
}

impl fmt::Debug for RepositoryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryClient")
            .field("endpoints", &self.endpoint_ids())
            .field("cache", &self.cache.root())
            .field("offline", &self.offline)
            .finish()
    }
}

impl RepositoryClient {
    pub fn new(cache: LocalCache, endpoints: Vec<Arc<dyn RepositoryEndpoint>>) -> Self {
        Self {
            endpoints,
            cache,
            offline: false,
            metadata_max_age: Duration::from_secs(24 * 60 * 60),
            cancel: CancellationFlag::new(),
        }
    }

    /// Builds a client for the configured repositories using the built-in
    /// directory transport
    pub fn from_config(config: &BuildConfig) -> Result<Self, ConfigError> {
        Self::connect(config, |repository| {
            let endpoint = DirectoryEndpoint::from_config(repository)?;
            Ok(Arc::new(endpoint) as Arc<dyn RepositoryEndpoint>)
        })
    }

    /// Builds a client by handing each configured repository, credentials
    /// included, to `connect` in priority order
    pub fn connect<F>(config: &BuildConfig, mut connect: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&RepositoryConfig) -> Result<Arc<dyn RepositoryEndpoint>, ConfigError>,
    {
        let endpoints = config
            .repositories
            .iter()
            .map(&mut connect)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::with_config(config, endpoints))
    }

    /// Builds a client for application-supplied endpoints, taking cache
    /// location and freshness settings from the configuration
    pub fn with_config(config: &BuildConfig, endpoints: Vec<Arc<dyn RepositoryEndpoint>>) -> Self {
        Self::new(LocalCache::new(config.local_repository_dir()), endpoints)
            .offline(config.offline)
            .metadata_max_age(config.metadata_max_age())
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn metadata_max_age(mut self, max_age: Duration) -> Self {
        self.metadata_max_age = max_age;
        self
    }

    pub fn cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Endpoint identities in priority order
    pub fn endpoint_ids(&self) -> Vec<String> {
        self.endpoints.iter().map(|e| e.id().to_string()).collect()
    }

    pub fn cancellation_flag(&self) -> &CancellationFlag {
        &self.cancel
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Published versions of `key`, sorted ascending
    pub fn fetch_versions(&self, key: &ArtifactKey) -> Result<Vec<Version>, RepositoryError> {
        let what = key.to_string();
        let path = self.fetch(&key.versions_path(), &what, Freshness::MaxAge)?;
        let bytes = fs::read(&path).map_err(|e| RepositoryError::Io(e.to_string()))?;

        let listing: VersionListing =
            serde_json::from_slice(&bytes).map_err(|e| RepositoryError::InvalidDescriptor {
                what,
                reason: e.to_string(),
            })?;
        Ok(listing.sorted())
    }

    /// Direct dependency declarations of one exact coordinate
    pub fn fetch_descriptor(&self, coordinate: &Coordinate) -> Result<Descriptor, RepositoryError> {
        let what = coordinate.to_string();
        let path = self.fetch(&coordinate.descriptor_path(), &what, Freshness::Forever)?;
        let bytes = fs::read(&path).map_err(|e| RepositoryError::Io(e.to_string()))?;

        Descriptor::from_json(&bytes).map_err(|e| RepositoryError::InvalidDescriptor {
            what,
            reason: e.to_string(),
        })
    }

    /// Local path of the artifact file, fetching it if needed
    pub fn fetch_artifact(&self, coordinate: &Coordinate) -> Result<PathBuf, RepositoryError> {
        self.fetch(
            &coordinate.artifact_path(),
            &coordinate.to_string(),
            Freshness::Forever,
        )
    }

    fn fresh(&self, entry: &CachedEntry, freshness: Freshness) -> bool {
        match (freshness, &entry.meta) {
            (Freshness::Forever, _) => true,
            (Freshness::MaxAge, _) if self.offline => true,
            // Seeded by hand; never refreshed
            (Freshness::MaxAge, None) => true,
            (Freshness::MaxAge, Some(meta)) => !meta.is_older_than(self.metadata_max_age, Utc::now()),
        }
    }

    fn fetch(&self, relative: &str, what: &str, freshness: Freshness) -> Result<PathBuf, RepositoryError> {
        if let Some(entry) = self.cache.lookup(relative)? {
            if self.fresh(&entry, freshness) {
                return Ok(entry.path);
            }
        }

        if self.offline {
            return Err(RepositoryError::ArtifactNotFound(format!("{} (offline)", what)));
        }

        let _lock = self.cache.lock(relative)?;

        // Another fetcher may have finished while we waited for the lock
        let stale = match self.cache.lookup(relative)? {
            Some(entry) if self.fresh(&entry, freshness) => return Ok(entry.path),
            other => other,
        };

        let mut transient: Option<String> = None;

        for endpoint in &self.endpoints {
            if self.cancel.is_cancelled() {
                return Err(RepositoryError::Cancelled);
            }

            match endpoint.get(relative) {
                Ok(bytes) => {
                    let path = self.cache.store(relative, &bytes, endpoint.id())?;
                    tracing::debug!(
                        target: "brood::repository",
                        endpoint = endpoint.id(),
                        path = relative,
                        size = bytes.len(),
                        "fetched"
                    );
                    return Ok(path);
                }
                Err(EndpointError::NotFound(_)) => {
                    tracing::trace!(
                        target: "brood::repository",
                        endpoint = endpoint.id(),
                        path = relative,
                        "not found"
                    );
                }
                Err(EndpointError::Unavailable(reason)) => {
                    tracing::warn!(
                        target: "brood::repository",
                        endpoint = endpoint.id(),
                        path = relative,
                        %reason,
                        "endpoint unavailable"
                    );
                    transient.get_or_insert(format!("{}: {}", endpoint.id(), reason));
                }
            }
        }

        if let Some(entry) = stale {
            tracing::debug!(
                target: "brood::repository",
                path = relative,
                "refresh failed, using cached copy"
            );
            return Ok(entry.path);
        }

        match transient {
            Some(reason) => Err(RepositoryError::RepositoryUnavailable {
                what: what.to_string(),
                reason,
            }),
            None => Err(RepositoryError::ArtifactNotFound(what.to_string())),
        }
    }
}
