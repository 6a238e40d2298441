//! Task graph executor
//!
//! Planning walks prerequisites depth-first with white/gray/black colouring
//! and fails before anything runs if a name is unknown or the graph has a
//! cycle. Execution follows the post-order of that walk on the calling
//! thread, one task at a time.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use super::context::TaskContext;
use super::graph::TaskGraph;
use super::outcome::{RunReport, SkipReason, TaskRecord, TaskResult};
use super::registry::Task;
use super::TaskError;
use crate::session::BuildSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Gray,
    Black,
}

/// Tasks to run, dependencies first
struct Plan {
    order: Vec<(String, Arc<dyn Task>)>,
    graph: TaskGraph,
}

pub struct TaskGraphExecutor<'a> {
    session: &'a BuildSession,
}

impl<'a> TaskGraphExecutor<'a> {
    pub fn new(session: &'a BuildSession) -> Self {
        Self { session }
    }

    /// Runs `requested` and everything they need. Tasks that already finished
    /// in this session are not run again; their earlier records are reported.
    pub fn run(&self, requested: &[&str]) -> Result<RunReport, TaskError> {
        let plan = self.plan(requested)?;
        tracing::debug!(
            target: "brood::task",
            requested = ?requested,
            planned = plan.order.len(),
            "planned run"
        );

        let mut records = Vec::with_capacity(plan.order.len());
        for (name, task) in &plan.order {
            let record = match self.session.record(name) {
                Some(done) if done.state.is_finished() => done,
                _ => {
                    let record = self.execute(name, task.as_ref(), &plan.graph);
                    self.session.set_record(record.clone());
                    record
                }
            };
            records.push(record);
        }
        Ok(RunReport::new(records))
    }

    fn plan(&self, requested: &[&str]) -> Result<Plan, TaskError> {
        let mut plan = Plan {
            order: Vec::new(),
            graph: TaskGraph::new(),
        };
        let mut marks: HashMap<String, Mark> = HashMap::new();
        let mut stack: Vec<String> = Vec::new();

        for reference in requested {
            let (name, task) = self.session.registry().lookup(reference)?;
            plan.graph.add_task(&name);
            self.visit(name, task, &mut marks, &mut stack, &mut plan)?;
        }
        Ok(plan)
    }

    fn visit(
        &self,
        name: String,
        task: Arc<dyn Task>,
        marks: &mut HashMap<String, Mark>,
        stack: &mut Vec<String>,
        plan: &mut Plan,
    ) -> Result<(), TaskError> {
        match marks.get(&name) {
            Some(Mark::Black) => return Ok(()),
            Some(Mark::Gray) => {
                let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                let mut cycle = stack[start..].to_vec();
                cycle.push(name);
                return Err(TaskError::TaskCycle(cycle));
            }
            None => {}
        }

        marks.insert(name.clone(), Mark::Gray);
        stack.push(name.clone());

        let prerequisites = task.prerequisites(&TaskContext::new(self.session, &name));
        for reference in prerequisites {
            let (dep, dep_task) = self.session.registry().lookup(&reference)?;
            plan.graph.add_dependency(&name, &dep);
            self.visit(dep, dep_task, marks, stack, plan)?;
        }

        stack.pop();
        marks.insert(name.clone(), Mark::Black);
        plan.order.push((name, task));
        Ok(())
    }

    fn execute(&self, name: &str, task: &dyn Task, graph: &TaskGraph) -> TaskRecord {
        let start = Instant::now();

        if self.session.is_cancelled() {
            let reason = self.session.cancel_reason().unwrap_or_default();
            tracing::debug!(target: "brood::task", task = name, "skipped, build cancelled");
            return TaskRecord::skipped(name, SkipReason::Cancelled(reason), start.elapsed());
        }

        let blocked = graph.dependencies(name).into_iter().find(|dep| {
            self.session
                .record(dep)
                .is_some_and(|r| r.blocks_dependents())
        });
        if let Some(dep) = blocked {
            tracing::warn!(target: "brood::task", task = name, prerequisite = dep, "skipped, prerequisite failed");
            return TaskRecord::skipped(
                name,
                SkipReason::PrerequisiteFailed(dep.to_string()),
                start.elapsed(),
            );
        }

        if self.session.config().is_skipped(name) {
            tracing::info!(target: "brood::task", task = name, "skipped by configuration");
            return TaskRecord::skipped(name, SkipReason::Configured, start.elapsed());
        }

        self.session.set_record(TaskRecord::running(name));
        tracing::info!(target: "brood::task", task = name, "running");

        let ctx = TaskContext::new(self.session, name);
        let result = panic::catch_unwind(AssertUnwindSafe(|| task.action(&ctx)))
            .unwrap_or_else(|payload| {
                TaskResult::Failed(anyhow::anyhow!("task panicked: {}", panic_message(&*payload)))
            });
        let elapsed = start.elapsed();

        match result {
            TaskResult::Completed(value) => {
                tracing::info!(target: "brood::task", task = name, elapsed_ms = elapsed.as_millis() as u64, "completed");
                self.session.set_output(name, value);
                TaskRecord::completed(name, elapsed)
            }
            TaskResult::Skipped(reason) => {
                tracing::info!(target: "brood::task", task = name, reason = %reason, "skipped");
                TaskRecord::skipped(name, SkipReason::Requested(reason), elapsed)
            }
            TaskResult::Cancelled(reason) => {
                tracing::warn!(target: "brood::task", task = name, reason = %reason, "cancelled the build");
                self.session.cancel(reason.clone());
                TaskRecord::skipped(name, SkipReason::Cancelled(reason), elapsed)
            }
            TaskResult::Failed(error) => {
                let message = format!("{:#}", error);
                tracing::error!(target: "brood::task", task = name, error = %message, "failed");
                TaskRecord::failed(name, message, elapsed)
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
