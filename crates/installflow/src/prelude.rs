//! Commonly used types and traits

pub use crate::callback::{FlowCallback, JobFlowCallback, PreTask, PreflightFlowCallback};
pub use crate::cancel::{CancellationSignal, MemoryCancellationStore};
pub use crate::config::FlowConfig;
pub use crate::runner::{FlowCoordinator, FlowOutcome, FlowRunner, Task, TaskResult};
pub use crate::store::MemoryRunStore;
pub use crate::worker::{FlowFactory, Worker};
pub use installflow_core::{
    FlowError, Outcome, Plan, PlanId, ResultKey, RunStore, Step, StepFailure, StepId, StepSpec,
    User,
};
