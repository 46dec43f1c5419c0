//! Flow hooks and step-identifier resolution.
//!
//! A [`FlowRunner`](crate::FlowRunner) drives one [`FlowCallback`] per run:
//!
//! ```text
//! pre_flow
//! for each task:  pre_task(Some(spec)) -> Proceed | Abort
//!                 <task runs>
//!                 post_task(spec, result)
//! pre_task(None)
//! post_flow
//! ```
//!
//! The two variants share this shape but aggregate results differently; see
//! [`JobFlowCallback`] and [`PreflightFlowCallback`].

mod job;
mod preflight;

pub use job::JobFlowCallback;
pub use preflight::PreflightFlowCallback;

use crate::runner::{FlowCoordinator, TaskResult};
use async_trait::async_trait;
use installflow_core::{FlowError, RunRef, Step, StepId, StepSpec};

/// Answer of [`FlowCallback::pre_task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreTask {
    /// Run the task.
    Proceed,
    /// Stop the flow before the task. Nothing is recorded for it.
    Abort,
}

/// Lifecycle of a callback instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallbackState {
    #[default]
    Idle,
    InProgress,
    Completed,
    Aborted,
}

/// The run a callback serves and the ordered steps of its plan.
#[derive(Debug, Clone)]
pub struct RunContext {
    run: RunRef,
    steps: Vec<Step>,
}

impl RunContext {
    pub fn new(run: RunRef, steps: impl Into<Vec<Step>>) -> Self {
        Self {
            run,
            steps: steps.into(),
        }
    }

    pub fn run(&self) -> RunRef {
        self.run
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Resolves a `step_num` token to the persisted step id.
    ///
    /// `None` means no step is in focus: the token is absent, unknown, or the
    /// run has no steps. Duplicate tokens resolve to the first in plan order.
    pub fn step_id_for_num(&self, step_num: Option<&str>) -> Option<StepId> {
        let step_num = step_num?;
        self.steps
            .iter()
            .find(|step| step.step_num == step_num)
            .map(|step| step.id)
    }

    /// Resolves a step path to the persisted step id, first match wins.
    pub fn step_id_for_path(&self, path: &str) -> Option<StepId> {
        self.steps
            .iter()
            .find(|step| step.path == path)
            .map(|step| step.id)
    }
}

/// Hooks invoked by the flow runner around each task and the whole flow.
///
/// Errors returned from a hook are infrastructure failures (store or cache
/// unreachable) and stop the runner. Task failures arrive in
/// [`TaskResult`] and must not be returned as errors.
#[async_trait]
pub trait FlowCallback: Send {
    fn context(&self) -> &RunContext;

    async fn pre_flow(&mut self, _coordinator: &FlowCoordinator) -> Result<(), FlowError> {
        Ok(())
    }

    /// Called before each task, and once with `None` after the last one.
    async fn pre_task(&mut self, _step: Option<&StepSpec>) -> Result<PreTask, FlowError> {
        Ok(PreTask::Proceed)
    }

    /// Called after every task that ran, including failed ones.
    async fn post_task(
        &mut self,
        _step: &StepSpec,
        _result: &TaskResult,
    ) -> Result<(), FlowError> {
        Ok(())
    }

    async fn post_flow(&mut self, _coordinator: &FlowCoordinator) -> Result<(), FlowError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use installflow_core::RunId;

    fn context(steps: Vec<Step>) -> RunContext {
        RunContext::new(RunRef::job(RunId::new(1)), steps)
    }

    #[test]
    fn test_unknown_token_has_no_step() {
        let ctx = context(vec![Step::new(10, "1", "a"), Step::new(11, "2", "b")]);
        assert_eq!(ctx.step_id_for_num(Some("anything")), None);
        assert_eq!(ctx.step_id_for_num(None), None);
        assert_eq!(ctx.step_id_for_path("c"), None);
    }

    #[test]
    fn test_empty_steps_have_no_step() {
        let ctx = context(Vec::new());
        assert_eq!(ctx.step_id_for_num(Some("anything")), None);
        assert_eq!(ctx.step_id_for_path("anything"), None);
    }

    #[test]
    fn test_resolves_by_num_and_path() {
        let ctx = context(vec![Step::new(10, "1", "a"), Step::new(11, "2", "b")]);
        assert_eq!(ctx.step_id_for_num(Some("2")), Some(StepId::new(11)));
        assert_eq!(ctx.step_id_for_path("a"), Some(StepId::new(10)));
    }

    #[test]
    fn test_duplicates_resolve_to_first_in_plan_order() {
        let ctx = context(vec![
            Step::new(20, "1", "dup"),
            Step::new(5, "1", "dup"),
        ]);
        assert_eq!(ctx.step_id_for_num(Some("1")), Some(StepId::new(20)));
        assert_eq!(ctx.step_id_for_path("dup"), Some(StepId::new(20)));
    }
}
