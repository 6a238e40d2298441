//! Task registry
//!
//! Tasks are named `task` or `task:phase`. A task registered as `jar:source`
//! is the `source` phase of task `jar`; a plain `compile` is the `compile`
//! phase of task `compile`. A bare reference resolves to the default phase:
//! the only phase if there is one, else the phase named like the task, else
//! the one marked with [`TaskRegistry::set_default_phase`].

use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::context::TaskContext;
use super::outcome::TaskResult;
use super::TaskError;

/// A unit of build work
pub trait Task: Send + Sync {
    /// `task` or `task:phase`
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Tasks that must finish first. Evaluated when the build is planned, so
    /// the answer may depend on configuration.
    fn prerequisites(&self, _ctx: &TaskContext<'_>) -> Vec<String> {
        Vec::new()
    }

    fn action(&self, ctx: &TaskContext<'_>) -> TaskResult;
}

type ActionFn = dyn Fn(&TaskContext<'_>) -> TaskResult + Send + Sync;
type PrerequisitesFn = dyn Fn(&TaskContext<'_>) -> Vec<String> + Send + Sync;

/// A [`Task`] built from closures
pub struct FnTask {
    name: String,
    description: String,
    prerequisites: Vec<String>,
    dynamic: Option<Box<PrerequisitesFn>>,
    action: Box<ActionFn>,
}

impl FnTask {
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&TaskContext<'_>) -> TaskResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            prerequisites: Vec::new(),
            dynamic: None,
            action: Box::new(action),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a fixed prerequisite
    pub fn after(mut self, prerequisite: impl Into<String>) -> Self {
        self.prerequisites.push(prerequisite.into());
        self
    }

    /// Adds prerequisites computed at planning time
    pub fn after_with<F>(mut self, prerequisites: F) -> Self
    where
        F: Fn(&TaskContext<'_>) -> Vec<String> + Send + Sync + 'static,
    {
        self.dynamic = Some(Box::new(prerequisites));
        self
    }
}

impl fmt::Debug for FnTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask")
            .field("name", &self.name)
            .field("prerequisites", &self.prerequisites)
            .finish()
    }
}

impl Task for FnTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn prerequisites(&self, ctx: &TaskContext<'_>) -> Vec<String> {
        let mut all = self.prerequisites.clone();
        if let Some(dynamic) = &self.dynamic {
            all.extend(dynamic(ctx));
        }
        all
    }

    fn action(&self, ctx: &TaskContext<'_>) -> TaskResult {
        (self.action)(ctx)
    }
}

fn valid_part(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Parsed `task[:phase]` reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskName {
    pub task: String,
    pub phase: Option<String>,
}

impl TaskName {
    /// Canonical record name for a phase of a task
    pub fn canonical(task: &str, phase: &str) -> String {
        if task == phase {
            task.to_string()
        } else {
            format!("{}:{}", task, phase)
        }
    }
}

impl FromStr for TaskName {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || TaskError::Registry(format!("invalid task name '{}'", s));
        match s.split_once(':') {
            None if valid_part(s) => Ok(Self {
                task: s.to_string(),
                phase: None,
            }),
            Some((task, phase)) if valid_part(task) && valid_part(phase) => Ok(Self {
                task: task.to_string(),
                phase: Some(phase.to_string()),
            }),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.phase {
            Some(phase) => write!(f, "{}:{}", self.task, phase),
            None => f.write_str(&self.task),
        }
    }
}

#[derive(Default)]
struct TaskEntry {
    phases: IndexMap<String, Arc<dyn Task>>,
    default_phase: Option<String>,
}

impl TaskEntry {
    fn default_phase(&self, task: &str) -> Option<&str> {
        if self.phases.len() == 1 {
            return self.phases.keys().next().map(String::as_str);
        }
        if let Some((phase, _)) = self.phases.get_key_value(task) {
            return Some(phase.as_str());
        }
        self.default_phase.as_deref()
    }
}

/// Task name to phases to implementation. Populated before a session starts,
/// read-only afterwards.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: IndexMap<String, TaskEntry>,
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task: impl Task + 'static) -> Result<(), TaskError> {
        self.register_arc(Arc::new(task))
    }

    pub fn register_arc(&mut self, task: Arc<dyn Task>) -> Result<(), TaskError> {
        let name: TaskName = task.name().parse()?;
        let phase = name.phase.clone().unwrap_or_else(|| name.task.clone());
        let entry = self.tasks.entry(name.task.clone()).or_default();

        if entry.phases.contains_key(&phase) {
            return Err(TaskError::Registry(format!(
                "task '{}' is registered twice",
                TaskName::canonical(&name.task, &phase)
            )));
        }
        entry.phases.insert(phase, task);
        Ok(())
    }

    /// Marks the phase a bare reference to `task` runs
    pub fn set_default_phase(&mut self, task: &str, phase: &str) -> Result<(), TaskError> {
        let entry = self.tasks.get_mut(task).ok_or_else(|| TaskError::UnknownTask {
            name: task.to_string(),
            suggestion: None,
        })?;
        if !entry.phases.contains_key(phase) {
            return Err(TaskError::UnknownPhase {
                task: task.to_string(),
                phase: phase.to_string(),
                available: entry.phases.keys().cloned().collect(),
            });
        }
        entry.default_phase = Some(phase.to_string());
        Ok(())
    }

    /// Resolves a reference to its canonical name and implementation
    pub fn lookup(&self, reference: &str) -> Result<(String, Arc<dyn Task>), TaskError> {
        let name: TaskName = reference.parse().map_err(|_| TaskError::UnknownTask {
            name: reference.to_string(),
            suggestion: None,
        })?;

        let entry = self.tasks.get(&name.task).ok_or_else(|| TaskError::UnknownTask {
            name: name.task.clone(),
            suggestion: self.suggest(&name.task),
        })?;

        let phase = match &name.phase {
            Some(phase) => phase.as_str(),
            None => entry.default_phase(&name.task).ok_or_else(|| TaskError::UnknownPhase {
                task: name.task.clone(),
                phase: "(default)".to_string(),
                available: entry.phases.keys().cloned().collect(),
            })?,
        };

        let task = entry.phases.get(phase).ok_or_else(|| TaskError::UnknownPhase {
            task: name.task.clone(),
            phase: phase.to_string(),
            available: entry.phases.keys().cloned().collect(),
        })?;

        Ok((TaskName::canonical(&name.task, phase), task.clone()))
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.lookup(reference).is_ok()
    }

    /// Canonical names of every registered phase, in registration order
    pub fn names(&self) -> Vec<String> {
        self.tasks
            .iter()
            .flat_map(|(task, entry)| entry.phases.keys().map(move |p| TaskName::canonical(task, p)))
            .collect()
    }

    /// Phases of one task
    pub fn phases(&self, task: &str) -> Vec<String> {
        self.tasks
            .get(task)
            .map(|e| e.phases.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.tasks.values().map(|e| e.phases.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// The registered task name closest to a misspelled one
    pub fn suggest(&self, name: &str) -> Option<String> {
        let limit = (name.chars().count() / 3).max(2);
        self.tasks
            .keys()
            .map(|candidate| (strsim::levenshtein(name, candidate), candidate))
            .filter(|(d, _)| *d <= limit)
            .min_by_key(|(d, _)| *d)
            .map(|(_, c)| c.clone())
    }
}
