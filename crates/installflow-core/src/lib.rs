//! Core types and traits for installflow.
//!
//! This crate has no runtime dependencies. It defines the shapes shared by the
//! flow callbacks and whatever backs them.
//!
//! # Core Types
//!
//! - [`Plan`] / [`Step`] - What a flow runs, with stable step identifiers
//! - [`StepSpec`] - Runtime view of a step handed to the flow hooks
//! - [`Outcome`] / [`ResultMap`] - Persisted per-step (or per-flow) results
//! - [`Job`] / [`PreflightResult`] - Run records owning a result map
//! - [`FlowError`] / [`StepFailure`] - Error taxonomy
//!
//! # Store Traits
//!
//! - [`RunStore`] - Run records and the incremental results merge
//! - [`CancellationStore`] - Keyed boolean flags polled between steps

mod error;
mod outcome;
mod run;
mod step;
mod traits;

pub use error::{FlowError, StepFailure};
pub use outcome::{
    has_errors, Outcome, OutcomeStatus, ResultKey, ResultKeyError, ResultMap, PLAN_KEY,
};
pub use run::{
    Job, JobStatus, OrgId, PreflightResult, PreflightStatus, RunId, RunKind, RunRef, User, UserId,
};
pub use step::{Plan, PlanId, Step, StepId, StepSpec};
pub use traits::{CancellationStore, RunStore};
