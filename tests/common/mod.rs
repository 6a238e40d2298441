//! Shared fixtures: an in-memory repository and session builders

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use brood::domain::{Descriptor, VersionListing};
use brood::repository::EndpointError;
use brood::{
    BuildConfig, BuildSession, Coordinate, DependencyDeclaration, ProjectDeclaration,
    RepositoryClient, RepositoryEndpoint, Scope, TaskRegistry,
};
use parking_lot::Mutex;
use tempfile::TempDir;

/// Repository held in memory, recording every request it serves
#[derive(Default)]
pub struct MemoryRepository {
    files: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
    failures: AtomicUsize,
}

impl MemoryRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Publishes `coordinate` with the given direct dependencies
    pub fn publish(&self, coordinate: &str, dependencies: Vec<DependencyDeclaration>) {
        let coordinate: Coordinate = coordinate.parse().unwrap();
        let mut files = self.files.lock();

        let descriptor = Descriptor::new(dependencies).to_json().unwrap();
        files.insert(coordinate.descriptor_path(), descriptor);
        files.insert(coordinate.artifact_path(), coordinate.to_string().into_bytes());

        let listing_path = coordinate.key().versions_path();
        let mut listing: VersionListing = files
            .get(&listing_path)
            .map(|b| serde_json::from_slice(b).unwrap())
            .unwrap_or_default();
        listing.versions.push(coordinate.version().clone());
        files.insert(listing_path, serde_json::to_vec(&listing).unwrap());
    }

    /// The next `count` requests fail as unavailable
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

impl RepositoryEndpoint for MemoryRepository {
    fn id(&self) -> &str {
        "memory"
    }

    fn get(&self, relative_path: &str) -> Result<Vec<u8>, EndpointError> {
        self.requests.lock().push(relative_path.to_string());
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(EndpointError::Unavailable("connection reset".into()));
        }
        self.files
            .lock()
            .get(relative_path)
            .cloned()
            .ok_or_else(|| EndpointError::NotFound(relative_path.to_string()))
    }
}

pub fn dep(key: &str, requirement: &str) -> DependencyDeclaration {
    dep_in(key, requirement, Scope::Compile)
}

pub fn dep_in(key: &str, requirement: &str, scope: Scope) -> DependencyDeclaration {
    DependencyDeclaration::new(key.parse().unwrap(), requirement.parse().unwrap(), scope)
}

pub fn config(dir: &TempDir) -> BuildConfig {
    BuildConfig {
        local_repository: Some(dir.path().join("local")),
        fetch_workers: 4,
        ..BuildConfig::default()
    }
}

pub fn session_with(
    config: BuildConfig,
    repository: &Arc<MemoryRepository>,
    registry: TaskRegistry,
    project: ProjectDeclaration,
) -> BuildSession {
    let endpoint: Arc<dyn RepositoryEndpoint> = repository.clone();
    let client = RepositoryClient::with_config(&config, vec![endpoint]);
    BuildSession::with_client(config, Arc::new(registry), project, client)
}

pub fn session(dir: &TempDir, repository: &Arc<MemoryRepository>, roots: Vec<DependencyDeclaration>) -> BuildSession {
    session_with(
        config(dir),
        repository,
        TaskRegistry::new(),
        ProjectDeclaration::new(roots),
    )
}

/// `group:name:version` of every resolved artifact, in order
pub fn resolved(session: &BuildSession, scope: Scope) -> Vec<String> {
    session
        .resolve(scope)
        .unwrap()
        .coordinates()
        .into_iter()
        .map(|c| c.to_string())
        .collect()
}
