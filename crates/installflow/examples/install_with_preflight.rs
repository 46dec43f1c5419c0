//! Preflight a plan, then install it, cancelling halfway through.
//!
//! Run with `RUST_LOG` unset to see the worker's info logs.

use async_trait::async_trait;
use installflow::prelude::*;
use installflow::{MemoryCancellationStore, PreflightQueue, RunId};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct DeployStep {
    spec: StepSpec,
}

#[async_trait]
impl Task for DeployStep {
    fn spec(&self) -> &StepSpec {
        &self.spec
    }

    async fn execute(&self, _coordinator: &mut FlowCoordinator) -> Result<(), StepFailure> {
        println!("Deploying {}...", self.spec.name);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(())
    }
}

// Validates the target org and reports a finding per affected step.
#[derive(Debug)]
struct OrgChecks {
    spec: StepSpec,
}

#[async_trait]
impl Task for OrgChecks {
    fn spec(&self) -> &StepSpec {
        &self.spec
    }

    async fn execute(&self, coordinator: &mut FlowCoordinator) -> Result<(), StepFailure> {
        coordinator.report("package.deploy", Outcome::warn("A newer version is available"));
        coordinator.report("docs.install", Outcome::optional(""));
        Ok(())
    }
}

struct StarterPack;

impl FlowFactory for StarterPack {
    fn install_tasks(&self, plan: &Plan, _user: &User) -> Vec<Box<dyn Task>> {
        plan.steps()
            .iter()
            .map(|step| Box::new(DeployStep { spec: step.spec() }) as Box<dyn Task>)
            .collect()
    }

    fn preflight_tasks(&self, _plan: &Plan, _user: &User) -> Vec<Box<dyn Task>> {
        vec![Box::new(OrgChecks {
            spec: StepSpec::at_path("org_checks"),
        })]
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = FlowConfig::from_env()?;
    let worker = Arc::new(Worker::new(
        Arc::new(MemoryRunStore::new()),
        Arc::new(MemoryCancellationStore::new()),
        Arc::new(StarterPack),
        config,
    ));

    let plan = Arc::new(
        Plan::new(PlanId::new(1), "Starter pack")
            .with_step(Step::new(1, "1", "dependencies.install").with_name("Dependencies"))
            .with_step(Step::new(2, "2", "package.deploy").with_name("Package"))
            .with_step(Step::new(3, "3", "docs.install").with_name("Docs")),
    );
    let user = User::new("user-1", "00D000000000001");

    let (queue, consumer) = PreflightQueue::spawn(worker.clone());
    queue.submit(user.clone(), plan.clone())?;
    drop(queue);
    consumer.await?;

    if let Some(preflight) = worker
        .store()
        .most_recent_preflight(&user.id, plan.id, false)
        .await?
    {
        println!(
            "Preflight: {}",
            serde_json::to_string_pretty(&preflight.results)?
        );
    }

    let job = worker.store().create_job(&plan, &user).await?;
    let signal = worker.cancellation().clone();
    let job_id: RunId = job.id;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(75)).await;
        if let Err(e) = signal.request(job_id).await {
            eprintln!("Could not cancel: {}", e);
        }
    });

    let outcome = worker.run_job(&job, &plan, &user).await?;
    println!("Job ended: {:?}", outcome);
    if let Some(job) = worker.store().job(job.id).await? {
        println!("Job results: {}", serde_json::to_string_pretty(&job.results)?);
    }
    worker.cancellation().clear(job.id).await?;

    Ok(())
}
