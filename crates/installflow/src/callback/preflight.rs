use super::{CallbackState, FlowCallback, RunContext};
use crate::runner::{FlowCoordinator, TaskResult};
use async_trait::async_trait;
use installflow_core::{
    FlowError, Outcome, Plan, PreflightResult, ResultKey, ResultMap, RunStore, StepSpec,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Callback for read-only validation runs.
///
/// Findings are addressed by step path and collected by the coordinator while
/// the flow runs; `post_flow` remaps them to step ids in a single write. A
/// task that raises is an infrastructure failure, recorded under the `"plan"`
/// key rather than against the step. Preflights cannot be cancelled.
pub struct PreflightFlowCallback {
    context: RunContext,
    store: Arc<dyn RunStore>,
    state: CallbackState,
}

impl fmt::Debug for PreflightFlowCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreflightFlowCallback")
            .field("run", &self.context.run())
            .field("state", &self.state)
            .finish()
    }
}

impl PreflightFlowCallback {
    pub fn new(context: RunContext, store: Arc<dyn RunStore>) -> Self {
        Self {
            context,
            store,
            state: CallbackState::Idle,
        }
    }

    /// Builds the callback for `preflight`, which must have been created for `plan`.
    pub fn for_preflight(
        preflight: &PreflightResult,
        plan: &Plan,
        store: Arc<dyn RunStore>,
    ) -> Result<Self, FlowError> {
        if preflight.plan_id != plan.id {
            return Err(FlowError::Configuration(format!(
                "preflight {} belongs to plan {}, not {}",
                preflight.id, preflight.plan_id, plan.id
            )));
        }
        let context = RunContext::new(preflight.run_ref(), plan.steps.clone());
        Ok(Self::new(context, store))
    }

    pub fn state(&self) -> CallbackState {
        self.state
    }
}

#[async_trait]
impl FlowCallback for PreflightFlowCallback {
    fn context(&self) -> &RunContext {
        &self.context
    }

    async fn pre_flow(&mut self, _coordinator: &FlowCoordinator) -> Result<(), FlowError> {
        self.state = CallbackState::InProgress;
        Ok(())
    }

    async fn post_task(&mut self, step: &StepSpec, result: &TaskResult) -> Result<(), FlowError> {
        let Some(failure) = result.failure() else {
            return Ok(());
        };
        warn!(run = %self.context.run(), step = %step, error = %failure, "Preflight check raised");

        let mut entry = ResultMap::new();
        entry.insert(ResultKey::Plan, Outcome::error(failure.to_string()));
        self.store.merge_results(self.context.run(), entry).await?;
        Ok(())
    }

    async fn post_flow(&mut self, coordinator: &FlowCoordinator) -> Result<(), FlowError> {
        let mut results = ResultMap::new();
        for (path, findings) in coordinator.preflight_results() {
            let Some(step_id) = self.context.step_id_for_path(path) else {
                debug!(run = %self.context.run(), path = %path, "Finding for unknown step dropped");
                continue;
            };
            // Only the first finding per step is kept.
            if let Some(first) = findings.first() {
                results.insert(ResultKey::Step(step_id), first.clone());
            }
        }

        debug!(run = %self.context.run(), steps = results.len(), "Writing preflight results");
        self.store.merge_results(self.context.run(), results).await?;
        self.state = CallbackState::Completed;
        Ok(())
    }
}
