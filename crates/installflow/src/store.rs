//! In-memory [`RunStore`].

use async_trait::async_trait;
use chrono::Utc;
use installflow_core::{
    FlowError, Job, JobStatus, Plan, PlanId, PreflightResult, PreflightStatus, ResultMap, RunId,
    RunKind, RunRef, RunStore, User, UserId,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Tables {
    next_id: u64,
    jobs: HashMap<RunId, Job>,
    preflights: HashMap<RunId, PreflightResult>,
}

impl Tables {
    fn allocate(&mut self) -> RunId {
        self.next_id += 1;
        RunId::new(self.next_id)
    }
}

/// Run records held in process memory behind a single async lock.
///
/// Every operation takes the lock once, so a results merge is atomic with
/// respect to concurrent readers.
#[derive(Default)]
pub struct MemoryRunStore {
    tables: RwLock<Tables>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn create_job(&self, plan: &Plan, user: &User) -> Result<Job, FlowError> {
        let mut tables = self.tables.write().await;
        let job = Job {
            id: tables.allocate(),
            plan_id: plan.id,
            user: user.id.clone(),
            org_id: user.org_id.clone(),
            status: JobStatus::Started,
            results: ResultMap::new(),
            created_at: Utc::now(),
        };
        tables.jobs.insert(job.id, job.clone());
        debug!(run = %job.run_ref(), plan = %plan.id, "Created job");
        Ok(job)
    }

    async fn create_preflight(
        &self,
        plan: &Plan,
        user: &User,
    ) -> Result<PreflightResult, FlowError> {
        let mut tables = self.tables.write().await;
        let preflight = PreflightResult {
            id: tables.allocate(),
            plan_id: plan.id,
            user: user.id.clone(),
            org_id: user.org_id.clone(),
            status: PreflightStatus::Started,
            results: ResultMap::new(),
            created_at: Utc::now(),
        };
        tables.preflights.insert(preflight.id, preflight.clone());
        debug!(run = %preflight.run_ref(), plan = %plan.id, "Created preflight");
        Ok(preflight)
    }

    async fn job(&self, id: RunId) -> Result<Option<Job>, FlowError> {
        Ok(self.tables.read().await.jobs.get(&id).cloned())
    }

    async fn preflight(&self, id: RunId) -> Result<Option<PreflightResult>, FlowError> {
        Ok(self.tables.read().await.preflights.get(&id).cloned())
    }

    async fn merge_results(
        &self,
        run: RunRef,
        entries: ResultMap,
    ) -> Result<ResultMap, FlowError> {
        let mut tables = self.tables.write().await;
        let results = match run.kind {
            RunKind::Job => tables.jobs.get_mut(&run.id).map(|job| &mut job.results),
            RunKind::Preflight => tables
                .preflights
                .get_mut(&run.id)
                .map(|preflight| &mut preflight.results),
        }
        .ok_or(FlowError::RunNotFound(run))?;

        results.extend(entries);
        Ok(results.clone())
    }

    async fn set_job_status(&self, id: RunId, status: JobStatus) -> Result<(), FlowError> {
        let mut tables = self.tables.write().await;
        let job = tables
            .jobs
            .get_mut(&id)
            .ok_or(FlowError::RunNotFound(RunRef::job(id)))?;
        job.status = status;
        Ok(())
    }

    async fn set_preflight_status(
        &self,
        id: RunId,
        status: PreflightStatus,
    ) -> Result<(), FlowError> {
        let mut tables = self.tables.write().await;
        let preflight = tables
            .preflights
            .get_mut(&id)
            .ok_or(FlowError::RunNotFound(RunRef::preflight(id)))?;
        preflight.status = status;
        Ok(())
    }

    async fn most_recent_preflight(
        &self,
        user: &UserId,
        plan: PlanId,
        valid_and_complete: bool,
    ) -> Result<Option<PreflightResult>, FlowError> {
        let tables = self.tables.read().await;
        Ok(tables
            .preflights
            .values()
            .filter(|p| &p.user == user && p.plan_id == plan)
            .filter(|p| !valid_and_complete || p.is_valid())
            .max_by_key(|p| (p.created_at, p.id))
            .cloned())
    }
}
