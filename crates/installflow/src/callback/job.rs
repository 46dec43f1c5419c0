use super::{CallbackState, FlowCallback, PreTask, RunContext};
use crate::cancel::CancellationSignal;
use crate::runner::{FlowCoordinator, TaskResult};
use async_trait::async_trait;
use installflow_core::{
    FlowError, Job, Outcome, Plan, ResultKey, ResultMap, RunStore, StepId, StepSpec,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Callback for installation runs.
///
/// Checks the run's cancellation flag before every task and records one
/// `ok` or `error` outcome per task as soon as it finishes. Tasks never
/// started are left out of the results.
pub struct JobFlowCallback {
    context: RunContext,
    store: Arc<dyn RunStore>,
    cancellation: CancellationSignal,
    current_key: Option<StepId>,
    state: CallbackState,
}

impl fmt::Debug for JobFlowCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobFlowCallback")
            .field("run", &self.context.run())
            .field("current_key", &self.current_key)
            .field("state", &self.state)
            .finish()
    }
}

impl JobFlowCallback {
    pub fn new(
        context: RunContext,
        store: Arc<dyn RunStore>,
        cancellation: CancellationSignal,
    ) -> Self {
        Self {
            context,
            store,
            cancellation,
            current_key: None,
            state: CallbackState::Idle,
        }
    }

    /// Builds the callback for `job`, which must have been created for `plan`.
    pub fn for_job(
        job: &Job,
        plan: &Plan,
        store: Arc<dyn RunStore>,
        cancellation: CancellationSignal,
    ) -> Result<Self, FlowError> {
        if job.plan_id != plan.id {
            return Err(FlowError::Configuration(format!(
                "job {} belongs to plan {}, not {}",
                job.id, job.plan_id, plan.id
            )));
        }
        let context = RunContext::new(job.run_ref(), plan.steps.clone());
        Ok(Self::new(context, store, cancellation))
    }

    /// The step currently in focus, if any.
    pub fn current_key(&self) -> Option<StepId> {
        self.current_key
    }

    pub fn state(&self) -> CallbackState {
        self.state
    }
}

#[async_trait]
impl FlowCallback for JobFlowCallback {
    fn context(&self) -> &RunContext {
        &self.context
    }

    async fn pre_flow(&mut self, _coordinator: &FlowCoordinator) -> Result<(), FlowError> {
        self.current_key = None;
        self.state = CallbackState::InProgress;
        Ok(())
    }

    async fn pre_task(&mut self, step: Option<&StepSpec>) -> Result<PreTask, FlowError> {
        self.current_key = step.and_then(|s| self.context.step_id_for_num(s.step_num()));

        let run = self.context.run();
        if self.cancellation.is_requested(run.id).await? {
            info!(run = %run, step = ?self.current_key, "Cancellation observed, stopping flow");
            self.state = CallbackState::Aborted;
            return Ok(PreTask::Abort);
        }
        Ok(PreTask::Proceed)
    }

    async fn post_task(&mut self, step: &StepSpec, result: &TaskResult) -> Result<(), FlowError> {
        let Some(step_id) = self.context.step_id_for_num(step.step_num()) else {
            warn!(
                run = %self.context.run(),
                step = %step,
                "No persisted step for task, result dropped"
            );
            return Ok(());
        };

        let outcome = match result.failure() {
            Some(failure) => Outcome::error(failure.to_string()),
            None => Outcome::ok(),
        };
        debug!(
            run = %self.context.run(),
            step = %step_id,
            status = %outcome.status,
            "Recording step outcome"
        );

        let mut entry = ResultMap::new();
        entry.insert(ResultKey::Step(step_id), outcome);
        self.store.merge_results(self.context.run(), entry).await?;
        Ok(())
    }

    async fn post_flow(&mut self, _coordinator: &FlowCoordinator) -> Result<(), FlowError> {
        self.state = CallbackState::Completed;
        Ok(())
    }
}
