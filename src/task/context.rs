use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::BuildConfig;
use crate::domain::Scope;
use crate::resolve::{ResolveError, ResolvedGraph};
use crate::session::{BuildSession, ProjectDeclaration};

/// What a task sees of its build session
#[derive(Clone, Copy)]
pub struct TaskContext<'a> {
    session: &'a BuildSession,
    task: &'a str,
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(session: &'a BuildSession, task: &'a str) -> Self {
        Self { session, task }
    }

    /// Canonical name of the task being planned or run
    pub fn task_name(&self) -> &str {
        self.task
    }

    pub fn config(&self) -> &BuildConfig {
        self.session.config()
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.session.config().property(key)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.session.config().flag(key)
    }

    pub fn project(&self) -> &ProjectDeclaration {
        self.session.project()
    }

    /// The project's dependencies as seen by `scope`
    pub fn resolve(&self, scope: Scope) -> Result<Arc<ResolvedGraph>, ResolveError> {
        self.session.resolve(scope)
    }

    /// Artifact files for `scope`, dependencies first
    pub fn classpath(&self, scope: Scope) -> Result<Vec<PathBuf>, ResolveError> {
        Ok(self
            .resolve(scope)?
            .classpath()
            .into_iter()
            .map(PathBuf::from)
            .collect())
    }

    /// Value produced by a task that completed earlier in this session
    pub fn output<T: Any + Send + Sync>(&self, task: &str) -> Option<Arc<T>> {
        let (canonical, _) = self.session.registry().lookup(task).ok()?;
        self.session.output(&canonical)?.get::<T>()
    }

    pub fn is_cancelled(&self) -> bool {
        self.session.is_cancelled()
    }
}

impl std::fmt::Debug for TaskContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext").field("task", &self.task).finish()
    }
}
