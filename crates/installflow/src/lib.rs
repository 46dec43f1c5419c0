//! Installation and preflight flows with per-step result tracking.
//!
//! A [`FlowRunner`] executes a plan's tasks one at a time and reports to a
//! [`FlowCallback`]. Two callbacks ship with the crate:
//!
//! - [`JobFlowCallback`] installs: it records an `ok`/`error` outcome per
//!   step as soon as the step finishes and stops before the next step once a
//!   cancellation is requested through the [`CancellationSignal`].
//! - [`PreflightFlowCallback`] validates: it collects findings reported by
//!   the checks and writes the first finding per step when the flow ends.
//!
//! # Example
//!
//! ```rust
//! use installflow::prelude::*;
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! struct Deploy(StepSpec);
//!
//! #[async_trait]
//! impl Task for Deploy {
//!     fn spec(&self) -> &StepSpec {
//!         &self.0
//!     }
//!
//!     async fn execute(&self, _coordinator: &mut FlowCoordinator) -> Result<(), StepFailure> {
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), FlowError> {
//! let plan = Plan::new(PlanId::new(1), "Starter pack").with_step(Step::new(1, "1", "deploy"));
//! let user = User::new("user-1", "00D000000000001");
//!
//! let store = Arc::new(MemoryRunStore::new());
//! let signal = CancellationSignal::new(
//!     Arc::new(MemoryCancellationStore::new()),
//!     &FlowConfig::default(),
//! );
//! let job = store.create_job(&plan, &user).await?;
//!
//! let mut callback = JobFlowCallback::for_job(&job, &plan, store.clone(), signal)?;
//! let runner = FlowRunner::builder()
//!     .add_task(Deploy(plan.steps[0].spec()))
//!     .build()?;
//!
//! assert_eq!(runner.execute(&mut callback).await?, FlowOutcome::Completed);
//! let job = store.job(job.id).await?.expect("job exists");
//! assert_eq!(job.results[&ResultKey::Step(StepId::new(1))], Outcome::ok());
//! # Ok(())
//! # }
//! ```

mod callback;
mod cancel;
mod config;
mod queue;
mod runner;
mod store;
mod worker;

pub mod prelude;

pub use installflow_core::*;

pub use callback::{
    CallbackState, FlowCallback, JobFlowCallback, PreTask, PreflightFlowCallback, RunContext,
};
pub use cancel::{CancellationSignal, MemoryCancellationStore};
pub use config::{ConfigError, FlowConfig, DEFAULT_CANCEL_KEY_PREFIX};
pub use queue::{PreflightQueue, PreflightRequest};
pub use runner::{FlowCoordinator, FlowOutcome, FlowRunner, FlowRunnerBuilder, Task, TaskResult};
pub use store::MemoryRunStore;
pub use worker::{FlowFactory, Worker};
