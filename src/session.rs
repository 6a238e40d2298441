//! Build session
//!
//! Per-invocation state: the configuration, the task registry, resolved
//! dependency graphs, task records and outputs, and the cancellation flag.
//! Dropped at the end of the build; nothing here outlives it except the local
//! repository on disk.

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use crate::cancel::CancellationFlag;
use crate::config::{BuildConfig, ConfigError, RepositoryConfig};
use crate::domain::{DependencyDeclaration, Exclusion, Scope};
use crate::repository::{RepositoryClient, RepositoryEndpoint};
use crate::resolve::{Fingerprint, ResolutionCache, ResolveError, ResolveRequest, ResolvedGraph, Resolver};
use crate::task::{RunReport, TaskError, TaskGraphExecutor, TaskRecord, TaskRegistry, TaskValue};

/// The project's direct dependencies, as handed over by the project loader
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectDeclaration {
    pub dependencies: Vec<DependencyDeclaration>,
    pub exclusions: Vec<Exclusion>,
}

impl ProjectDeclaration {
    pub fn new(dependencies: Vec<DependencyDeclaration>) -> Self {
        Self {
            dependencies,
            exclusions: Vec::new(),
        }
    }

    pub fn exclude(mut self, exclusion: Exclusion) -> Self {
        self.exclusions.push(exclusion);
        self
    }
}

pub struct BuildSession {
    config: BuildConfig,
    registry: Arc<TaskRegistry>,
    project: ProjectDeclaration,
    resolver: Resolver,
    cache: ResolutionCache,
    cancel: CancellationFlag,
    records: Mutex<IndexMap<String, TaskRecord>>,
    outputs: Mutex<HashMap<String, TaskValue>>,
}

impl std::fmt::Debug for BuildSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildSession")
            .field("registry", &self.registry)
            .field("client", self.resolver.client())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl BuildSession {
    /// Opens a session resolving against the configured repositories
    pub fn new(
        config: BuildConfig,
        registry: Arc<TaskRegistry>,
        project: ProjectDeclaration,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = RepositoryClient::from_config(&config)?;
        Ok(Self::with_client(config, registry, project, client))
    }

    /// Opens a session whose endpoints are built by `connect` from the
    /// configured repositories, credentials included
    pub fn connect<F>(
        config: BuildConfig,
        registry: Arc<TaskRegistry>,
        project: ProjectDeclaration,
        connect: F,
    ) -> Result<Self, ConfigError>
    where
        F: FnMut(&RepositoryConfig) -> Result<Arc<dyn RepositoryEndpoint>, ConfigError>,
    {
        config.validate()?;
        let client = RepositoryClient::connect(&config, connect)?;
        Ok(Self::with_client(config, registry, project, client))
    }

    /// Opens a session over an application-built client. The client is tied
    /// to the session's cancellation flag.
    pub fn with_client(
        config: BuildConfig,
        registry: Arc<TaskRegistry>,
        project: ProjectDeclaration,
        client: RepositoryClient,
    ) -> Self {
        let cancel = CancellationFlag::new();
        let resolver = Resolver::new(client.cancellation(cancel.clone()), config.fetch_workers);
        Self {
            config,
            registry,
            project,
            resolver,
            cache: ResolutionCache::new(),
            cancel,
            records: Mutex::new(IndexMap::new()),
            outputs: Mutex::new(HashMap::new()),
        }
    }

    /// Shares a resolution cache with other sessions
    pub fn with_cache(mut self, cache: ResolutionCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn project(&self) -> &ProjectDeclaration {
        &self.project
    }

    pub fn resolution_cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn resolve_request(&self, scope: Scope) -> ResolveRequest {
        ResolveRequest::new(self.project.dependencies.clone(), scope)
            .with_exclusions(self.project.exclusions.clone())
    }

    /// Resolves the project's dependencies for `scope`. Results are cached by
    /// fingerprint; transient repository failures are retried per the
    /// configured retry policy. A cancellation that belongs to another session
    /// sharing the cache is not this session's failure and is retried at once.
    pub fn resolve(&self, scope: Scope) -> Result<Arc<ResolvedGraph>, ResolveError> {
        let request = self.resolve_request(scope);
        let fingerprint = Fingerprint::of(&request, &self.resolver.client().endpoint_ids());
        let attempts = self.config.retry.attempts.max(1);

        let mut attempt = 1;
        loop {
            let result = self
                .cache
                .get_or_resolve(fingerprint, || self.resolver.resolve(&request));
            match result {
                Err(e) if e.is_transient() && attempt < attempts && !self.is_cancelled() => {
                    tracing::warn!(
                        target: "brood::resolve",
                        scope = %scope,
                        attempt,
                        attempts,
                        error = %e,
                        "resolution failed, retrying"
                    );
                    thread::sleep(self.config.retry.backoff());
                    attempt += 1;
                }
                // Another session sharing the cache was cancelled while this
                // one waited on its result
                Err(ResolveError::Cancelled) if !self.is_cancelled() => {
                    tracing::debug!(
                        target: "brood::resolve",
                        scope = %scope,
                        "shared resolution was cancelled, resolving again"
                    );
                }
                result => return result,
            }
        }
    }

    /// Runs the requested tasks and their prerequisites
    pub fn run(&self, requested: &[&str]) -> Result<RunReport, TaskError> {
        TaskGraphExecutor::new(self).run(requested)
    }

    /// Cancels the build: tasks not started yet are skipped and pending
    /// repository requests stop
    pub fn cancel(&self, reason: impl Into<String>) {
        self.cancel.cancel(reason);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_reason(&self) -> Option<String> {
        self.cancel.reason()
    }

    pub fn cancellation_flag(&self) -> &CancellationFlag {
        &self.cancel
    }

    pub fn record(&self, task: &str) -> Option<TaskRecord> {
        self.records.lock().get(task).cloned()
    }

    /// Every task record of this session, in first-touched order
    pub fn records(&self) -> Vec<TaskRecord> {
        self.records.lock().values().cloned().collect()
    }

    pub(crate) fn set_record(&self, record: TaskRecord) {
        self.records.lock().insert(record.name.clone(), record);
    }

    pub(crate) fn output(&self, task: &str) -> Option<TaskValue> {
        self.outputs.lock().get(task).cloned()
    }

    pub(crate) fn set_output(&self, task: &str, value: TaskValue) {
        if !value.is_none() {
            self.outputs.lock().insert(task.to_string(), value);
        }
    }
}
