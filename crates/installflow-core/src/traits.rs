//! Storage seams the flow callbacks write through.

use crate::error::FlowError;
use crate::outcome::ResultMap;
use crate::run::{Job, JobStatus, PreflightResult, PreflightStatus, RunId, RunRef, User, UserId};
use crate::step::{Plan, PlanId};
use async_trait::async_trait;
use std::time::Duration;

/// Persistence for run records.
///
/// Implementations must make each call atomic for a single run; callers never
/// hold a lock across calls.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Creates a started job for `plan` on behalf of `user`.
    async fn create_job(&self, plan: &Plan, user: &User) -> Result<Job, FlowError>;

    /// Creates a started preflight for `plan` on behalf of `user`.
    async fn create_preflight(&self, plan: &Plan, user: &User)
        -> Result<PreflightResult, FlowError>;

    async fn job(&self, id: RunId) -> Result<Option<Job>, FlowError>;

    async fn preflight(&self, id: RunId) -> Result<Option<PreflightResult>, FlowError>;

    /// Merges `entries` into the run's results and returns the merged map.
    ///
    /// Existing keys not present in `entries` are preserved; keys present in
    /// both are overwritten.
    async fn merge_results(&self, run: RunRef, entries: ResultMap)
        -> Result<ResultMap, FlowError>;

    async fn set_job_status(&self, id: RunId, status: JobStatus) -> Result<(), FlowError>;

    async fn set_preflight_status(
        &self,
        id: RunId,
        status: PreflightStatus,
    ) -> Result<(), FlowError>;

    /// Returns the newest preflight `user` ran for `plan`.
    ///
    /// With `valid_and_complete`, only completed preflights without error
    /// findings are considered.
    async fn most_recent_preflight(
        &self,
        user: &UserId,
        plan: PlanId,
        valid_and_complete: bool,
    ) -> Result<Option<PreflightResult>, FlowError>;
}

/// Shared low-latency key-value store holding boolean cancellation flags.
#[async_trait]
pub trait CancellationStore: Send + Sync {
    /// Returns `true` if the flag is set. A missing key means `false`.
    async fn get_flag(&self, key: &str) -> Result<bool, FlowError>;

    /// Sets the flag, expiring it after `ttl` when given.
    async fn set_flag(&self, key: &str, ttl: Option<Duration>) -> Result<(), FlowError>;

    async fn delete_flag(&self, key: &str) -> Result<(), FlowError>;
}
