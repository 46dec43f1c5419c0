//! Background execution of job and preflight runs.

use crate::callback::{JobFlowCallback, PreflightFlowCallback};
use crate::cancel::CancellationSignal;
use crate::config::FlowConfig;
use crate::runner::{FlowOutcome, FlowRunner, Task};
use installflow_core::{
    CancellationStore, FlowError, Job, JobStatus, Plan, PreflightResult, PreflightStatus,
    RunStore, User,
};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Supplies the executable tasks for a plan.
///
/// This is the seam to the step-execution engine: it knows how each step
/// acts on the target organization.
pub trait FlowFactory: Send + Sync {
    /// Tasks that install `plan`, in plan order.
    fn install_tasks(&self, plan: &Plan, user: &User) -> Vec<Box<dyn Task>>;

    /// Read-only checks validating `plan` against the user's organization.
    fn preflight_tasks(&self, plan: &Plan, user: &User) -> Vec<Box<dyn Task>>;
}

/// Runs flows to completion and records their terminal status.
pub struct Worker {
    store: Arc<dyn RunStore>,
    cancellation: CancellationSignal,
    factory: Arc<dyn FlowFactory>,
    config: FlowConfig,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("cancellation", &self.cancellation)
            .field("config", &self.config)
            .finish()
    }
}

impl Worker {
    /// Creates a worker whose cancellation keys follow `config`.
    pub fn new(
        store: Arc<dyn RunStore>,
        cancellation_store: Arc<dyn CancellationStore>,
        factory: Arc<dyn FlowFactory>,
        config: FlowConfig,
    ) -> Self {
        let cancellation = CancellationSignal::new(cancellation_store, &config);
        Self {
            store,
            cancellation,
            factory,
            config,
        }
    }

    /// The store holding this worker's runs.
    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    /// The signal request handlers use to cancel jobs run by this worker.
    pub fn cancellation(&self) -> &CancellationSignal {
        &self.cancellation
    }

    /// Settings the worker was built with.
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Creates a job for `plan` and runs it.
    pub async fn start_job(
        &self,
        plan: &Plan,
        user: &User,
    ) -> Result<(Job, FlowOutcome), FlowError> {
        let job = self.store.create_job(plan, user).await?;
        let outcome = self.run_job(&job, plan, user).await?;
        Ok((job, outcome))
    }

    /// Runs an existing job and sets its status from the outcome.
    ///
    /// A cancellation flag left set for the job is not cleared here; that
    /// belongs to whoever requested it. If a hook fails with a store error the
    /// job is marked failed and the error is returned.
    pub async fn run_job(
        &self,
        job: &Job,
        plan: &Plan,
        user: &User,
    ) -> Result<FlowOutcome, FlowError> {
        let mut callback =
            JobFlowCallback::for_job(job, plan, self.store.clone(), self.cancellation.clone())?;
        let runner = self.runner(self.factory.install_tasks(plan, user))?;

        info!(run = %job.run_ref(), plan = %plan.id, tasks = runner.task_count(), "Running job");
        let outcome = match runner.execute(&mut callback).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(run = %job.run_ref(), error = %e, "Job aborted by store error");
                if let Err(status_err) = self
                    .store
                    .set_job_status(job.id, JobStatus::Failed)
                    .await
                {
                    warn!(run = %job.run_ref(), error = %status_err, "Could not mark job failed");
                }
                return Err(e);
            }
        };

        let status = match outcome {
            FlowOutcome::Completed => JobStatus::Complete,
            FlowOutcome::Failed { .. } => JobStatus::Failed,
            FlowOutcome::Canceled => JobStatus::Canceled,
        };
        self.store.set_job_status(job.id, status).await?;
        info!(run = %job.run_ref(), status = ?status, "Job finished");
        Ok(outcome)
    }

    /// Creates a preflight for `plan` and runs it.
    pub async fn start_preflight(
        &self,
        plan: &Plan,
        user: &User,
    ) -> Result<(PreflightResult, FlowOutcome), FlowError> {
        let preflight = self.store.create_preflight(plan, user).await?;
        let outcome = self.run_preflight(&preflight, plan, user).await?;
        Ok((preflight, outcome))
    }

    /// Runs an existing preflight and sets its status from the outcome.
    ///
    /// Any outcome other than completion marks the preflight failed.
    pub async fn run_preflight(
        &self,
        preflight: &PreflightResult,
        plan: &Plan,
        user: &User,
    ) -> Result<FlowOutcome, FlowError> {
        let mut callback =
            PreflightFlowCallback::for_preflight(preflight, plan, self.store.clone())?;
        let runner = self.runner(self.factory.preflight_tasks(plan, user))?;

        info!(
            run = %preflight.run_ref(),
            plan = %plan.id,
            tasks = runner.task_count(),
            "Running preflight"
        );
        let outcome = match runner.execute(&mut callback).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(run = %preflight.run_ref(), error = %e, "Preflight aborted by store error");
                if let Err(status_err) = self
                    .store
                    .set_preflight_status(preflight.id, PreflightStatus::Failed)
                    .await
                {
                    warn!(
                        run = %preflight.run_ref(),
                        error = %status_err,
                        "Could not mark preflight failed"
                    );
                }
                return Err(e);
            }
        };

        let status = match outcome {
            FlowOutcome::Completed => PreflightStatus::Complete,
            FlowOutcome::Failed { .. } | FlowOutcome::Canceled => PreflightStatus::Failed,
        };
        self.store.set_preflight_status(preflight.id, status).await?;
        info!(run = %preflight.run_ref(), status = ?status, "Preflight finished");
        Ok(outcome)
    }

    fn runner(&self, tasks: Vec<Box<dyn Task>>) -> Result<FlowRunner, FlowError> {
        FlowRunner::builder()
            .add_boxed(tasks)
            .task_timeout(self.config.task_timeout)
            .build()
    }
}
