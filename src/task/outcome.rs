//! Task results and per-run records

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::TaskError;

/// Value produced by a completed task, readable by its dependents
#[derive(Clone, Default)]
pub struct TaskValue(Option<Arc<dyn Any + Send + Sync>>);

impl TaskValue {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// Returns the value if it has type `T`
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.0.clone().and_then(|v| v.downcast::<T>().ok())
    }
}

impl fmt::Debug for TaskValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(_) => f.write_str("TaskValue(..)"),
            None => f.write_str("TaskValue(none)"),
        }
    }
}

/// What a task action reports back
#[derive(Debug)]
pub enum TaskResult {
    Completed(TaskValue),
    /// Nothing to do; dependents still run
    Skipped(String),
    /// Stop the build; every task not started yet is skipped
    Cancelled(String),
    Failed(anyhow::Error),
}

impl TaskResult {
    pub fn done() -> Self {
        TaskResult::Completed(TaskValue::none())
    }

    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        TaskResult::Completed(TaskValue::new(value))
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        TaskResult::Skipped(reason.into())
    }

    pub fn cancel(reason: impl Into<String>) -> Self {
        TaskResult::Cancelled(reason.into())
    }

    pub fn fail(error: impl Into<anyhow::Error>) -> Self {
        TaskResult::Failed(error.into())
    }
}

impl<T: Any + Send + Sync> From<anyhow::Result<T>> for TaskResult {
    fn from(result: anyhow::Result<T>) -> Self {
        match result {
            Ok(value) => TaskResult::value(value),
            Err(e) => TaskResult::Failed(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Skipped,
    Failed,
}

impl TaskState {
    /// Completed, skipped or failed
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Skipped | TaskState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// The task itself reported nothing to do
    Requested(String),
    /// Listed in the configured skip list
    Configured,
    /// The build was cancelled before the task started
    Cancelled(String),
    /// A prerequisite failed
    PrerequisiteFailed(String),
}

impl SkipReason {
    /// Whether dependents of a task skipped for this reason are blocked too
    pub fn blocks_dependents(&self) -> bool {
        matches!(self, SkipReason::PrerequisiteFailed(_) | SkipReason::Cancelled(_))
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Requested(reason) => write!(f, "{}", reason),
            SkipReason::Configured => f.write_str("skipped by configuration"),
            SkipReason::Cancelled(reason) => write!(f, "build cancelled: {}", reason),
            SkipReason::PrerequisiteFailed(task) => write!(f, "prerequisite '{}' failed", task),
        }
    }
}

/// State of one task within a build session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRecord {
    pub name: String,
    pub state: TaskState,
    pub elapsed: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskRecord {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: TaskState::Pending,
            elapsed: Duration::ZERO,
            skip_reason: None,
            error: None,
        }
    }

    pub fn running(name: impl Into<String>) -> Self {
        Self {
            state: TaskState::Running,
            ..Self::pending(name)
        }
    }

    pub fn completed(name: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            state: TaskState::Completed,
            elapsed,
            ..Self::pending(name)
        }
    }

    pub fn skipped(name: impl Into<String>, reason: SkipReason, elapsed: Duration) -> Self {
        Self {
            state: TaskState::Skipped,
            elapsed,
            skip_reason: Some(reason),
            ..Self::pending(name)
        }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            state: TaskState::Failed,
            elapsed,
            error: Some(error.into()),
            ..Self::pending(name)
        }
    }

    /// True if dependents of this task must not run
    pub fn blocks_dependents(&self) -> bool {
        match self.state {
            TaskState::Failed => true,
            TaskState::Skipped => self
                .skip_reason
                .as_ref()
                .is_some_and(SkipReason::blocks_dependents),
            _ => false,
        }
    }
}

/// Records of one `run` call, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    records: Vec<TaskRecord>,
}

impl RunReport {
    pub fn new(records: Vec<TaskRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[TaskRecord] {
        &self.records
    }

    pub fn get(&self, name: &str) -> Option<&TaskRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn state_of(&self, name: &str) -> Option<TaskState> {
        self.get(name).map(|r| r.state)
    }

    /// Names of tasks that completed, in order
    pub fn completed(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.state == TaskState::Completed)
            .map(|r| r.name.as_str())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskRecord> {
        self.records.iter().filter(|r| r.state == TaskState::Failed)
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Turns the first failure into an error
    pub fn into_result(self) -> Result<Self, TaskError> {
        let failure = self
            .failures()
            .next()
            .map(|r| (r.name.clone(), r.error.clone().unwrap_or_default()));
        match failure {
            Some((task, message)) => Err(TaskError::TaskFailed { task, message }),
            None => Ok(self),
        }
    }
}
