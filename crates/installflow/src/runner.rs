//! Sequential flow runner.

use crate::callback::{FlowCallback, PreTask};
use async_trait::async_trait;
use indexmap::IndexMap;
use installflow_core::{FlowError, Outcome, StepFailure, StepSpec};
use std::fmt::{self, Debug};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{info, warn};

/// A unit of work executed against the target organization.
///
/// Installation tasks perform their action and return `Err` when it fails.
/// Preflight tasks report findings through [`FlowCoordinator::report`] and
/// return `Err` only when the check itself could not run.
#[async_trait]
pub trait Task: Send + Sync + Debug {
    fn spec(&self) -> &StepSpec;

    async fn execute(&self, coordinator: &mut FlowCoordinator) -> Result<(), StepFailure>;
}

/// Per-run state shared by the runner, its tasks, and the callback.
#[derive(Debug)]
pub struct FlowCoordinator {
    preflight_results: IndexMap<String, Vec<Outcome>>,
    started_at: Instant,
}

impl Default for FlowCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowCoordinator {
    /// Creates an empty coordinator.
    pub fn new() -> Self {
        Self {
            preflight_results: IndexMap::new(),
            started_at: Instant::now(),
        }
    }

    /// Appends a finding for the step at `path`.
    pub fn report(&mut self, path: impl Into<String>, outcome: Outcome) {
        self.preflight_results
            .entry(path.into())
            .or_default()
            .push(outcome);
    }

    /// Findings per step path, in the order they were reported.
    pub fn preflight_results(&self) -> &IndexMap<String, Vec<Outcome>> {
        &self.preflight_results
    }

    /// Time since the flow started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// What a task's execution produced, as handed to `post_task`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    failure: Option<StepFailure>,
}

impl TaskResult {
    pub fn ok() -> Self {
        Self { failure: None }
    }

    pub fn failed(failure: StepFailure) -> Self {
        Self {
            failure: Some(failure),
        }
    }

    /// The condition the task raised, if any.
    pub fn failure(&self) -> Option<&StepFailure> {
        self.failure.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }
}

impl From<Result<(), StepFailure>> for TaskResult {
    fn from(result: Result<(), StepFailure>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(failure) => Self::failed(failure),
        }
    }
}

/// How a flow ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    /// Every task ran and succeeded.
    Completed,
    /// A task failed; no later task was started.
    Failed { step: StepSpec, failure: StepFailure },
    /// The callback aborted the flow before a task (or at teardown).
    Canceled,
}

/// Runs tasks strictly one after another, invoking the callback hooks.
pub struct FlowRunner {
    tasks: Vec<Box<dyn Task>>,
    task_timeout: Option<Duration>,
}

impl fmt::Debug for FlowRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowRunner")
            .field(
                "tasks",
                &self.tasks.iter().map(|t| t.spec()).collect::<Vec<_>>(),
            )
            .field("task_timeout", &self.task_timeout)
            .finish()
    }
}

impl FlowRunner {
    /// Creates a new runner builder.
    pub fn builder() -> FlowRunnerBuilder {
        FlowRunnerBuilder::new()
    }

    /// Returns the number of tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Executes the flow against `callback`.
    ///
    /// `post_task` runs after every started task, even a failed one. The flow
    /// stops after the first failure or when `pre_task` answers
    /// [`PreTask::Abort`]; `post_flow` runs only when every task succeeded.
    /// Errors returned by the hooks are propagated as-is.
    pub async fn execute(
        &self,
        callback: &mut dyn FlowCallback,
    ) -> Result<FlowOutcome, FlowError> {
        let run = callback.context().run();
        let mut coordinator = FlowCoordinator::new();
        callback.pre_flow(&coordinator).await?;

        for task in &self.tasks {
            let spec = task.spec();
            if callback.pre_task(Some(spec)).await? == PreTask::Abort {
                info!(run = %run, step = %spec, "Flow aborted before step");
                return Ok(FlowOutcome::Canceled);
            }

            let result = self.execute_task(task.as_ref(), &mut coordinator).await;
            callback.post_task(spec, &result).await?;

            if let Some(failure) = result.failure {
                warn!(run = %run, step = %spec, error = %failure, "Step failed");
                return Ok(FlowOutcome::Failed {
                    step: spec.clone(),
                    failure,
                });
            }
            info!(run = %run, step = %spec, "Step completed successfully");
        }

        if callback.pre_task(None).await? == PreTask::Abort {
            info!(run = %run, "Flow aborted at teardown");
            return Ok(FlowOutcome::Canceled);
        }
        callback.post_flow(&coordinator).await?;
        info!(run = %run, elapsed = ?coordinator.elapsed(), "Flow completed");
        Ok(FlowOutcome::Completed)
    }

    async fn execute_task(&self, task: &dyn Task, coordinator: &mut FlowCoordinator) -> TaskResult {
        let Some(limit) = self.task_timeout else {
            return task.execute(coordinator).await.into();
        };
        match timeout(limit, task.execute(coordinator)).await {
            Ok(result) => result.into(),
            Err(_) => TaskResult::failed(StepFailure::new(format!(
                "Step timed out after {:?}",
                limit
            ))),
        }
    }
}

/// Builder for constructing [`FlowRunner`] instances.
#[derive(Default)]
pub struct FlowRunnerBuilder {
    tasks: Vec<Box<dyn Task>>,
    task_timeout: Option<Duration>,
}

impl FlowRunnerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a task; tasks run in insertion order.
    pub fn add_task<T: Task + 'static>(mut self, task: T) -> Self {
        self.tasks.push(Box::new(task));
        self
    }

    /// Appends already boxed tasks in iteration order.
    pub fn add_boxed(mut self, tasks: impl IntoIterator<Item = Box<dyn Task>>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    /// Limits how long a single task may run. A task exceeding it fails.
    pub fn task_timeout(mut self, limit: Option<Duration>) -> Self {
        self.task_timeout = limit;
        self
    }

    /// Builds the runner. A zero task timeout is rejected.
    pub fn build(self) -> Result<FlowRunner, FlowError> {
        if self.task_timeout == Some(Duration::ZERO) {
            return Err(FlowError::Configuration(
                "Task timeout must be greater than zero".to_string(),
            ));
        }
        Ok(FlowRunner {
            tasks: self.tasks,
            task_timeout: self.task_timeout,
        })
    }
}
