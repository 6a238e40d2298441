//! Task orchestration
//!
//! A [`TaskRegistry`] maps task names to implementations. The
//! [`TaskGraphExecutor`] plans a run depth-first from the requested names,
//! then runs each planned task at most once per build session, in dependency
//! order, recording the outcome of every task.

mod context;
mod executor;
mod graph;
mod outcome;
mod registry;

use thiserror::Error;

pub use context::TaskContext;
pub use executor::TaskGraphExecutor;
pub use graph::TaskGraph;
pub use outcome::{RunReport, SkipReason, TaskRecord, TaskResult, TaskState, TaskValue};
pub use registry::{FnTask, Task, TaskName, TaskRegistry};

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{}'?)", s),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("Unknown task '{name}'{}", did_you_mean(.suggestion))]
    UnknownTask {
        name: String,
        suggestion: Option<String>,
    },

    #[error("Task '{task}' has no phase '{phase}'; available: {}", .available.join(", "))]
    UnknownPhase {
        task: String,
        phase: String,
        available: Vec<String>,
    },

    #[error("Task cycle: {}", .0.join(" -> "))]
    TaskCycle(Vec<String>),

    #[error("Task '{task}' failed: {message}")]
    TaskFailed { task: String, message: String },

    #[error("{0}")]
    Registry(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        let unknown = TaskError::UnknownTask {
            name: "compiel".into(),
            suggestion: Some("compile".into()),
        };
        assert_eq!(unknown.to_string(), "Unknown task 'compiel' (did you mean 'compile'?)");

        let cycle = TaskError::TaskCycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(cycle.to_string(), "Task cycle: a -> b -> a");

        let phase = TaskError::UnknownPhase {
            task: "jar".into(),
            phase: "doc".into(),
            available: vec!["source".into(), "jar".into()],
        };
        assert_eq!(phase.to_string(), "Task 'jar' has no phase 'doc'; available: source, jar");
    }
}
