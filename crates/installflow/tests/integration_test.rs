use async_trait::async_trait;
use installflow::prelude::*;
use installflow::{
    JobStatus, MemoryCancellationStore, PreflightQueue, PreflightStatus, ResultMap, RunId,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug)]
struct Install {
    spec: StepSpec,
    fail_with: Option<&'static str>,
    cancel: Option<(CancellationSignal, RunId)>,
}

impl Install {
    fn ok(step: &Step) -> Self {
        Self {
            spec: step.spec(),
            fail_with: None,
            cancel: None,
        }
    }

    fn failing(step: &Step, message: &'static str) -> Self {
        Self {
            fail_with: Some(message),
            ..Self::ok(step)
        }
    }

    /// Simulates a user cancelling the job while this step is running.
    fn cancelling(step: &Step, signal: CancellationSignal, run: RunId) -> Self {
        Self {
            cancel: Some((signal, run)),
            ..Self::ok(step)
        }
    }
}

#[async_trait]
impl Task for Install {
    fn spec(&self) -> &StepSpec {
        &self.spec
    }

    async fn execute(&self, _coordinator: &mut FlowCoordinator) -> Result<(), StepFailure> {
        if let Some((signal, run)) = &self.cancel {
            signal
                .request(*run)
                .await
                .map_err(|e| StepFailure::new(e.to_string()))?;
        }
        match self.fail_with {
            Some(message) => Err(StepFailure::new(message)),
            None => Ok(()),
        }
    }
}

#[derive(Debug)]
struct Check {
    spec: StepSpec,
    findings: Vec<(String, Outcome)>,
    raise: Option<&'static str>,
}

#[async_trait]
impl Task for Check {
    fn spec(&self) -> &StepSpec {
        &self.spec
    }

    async fn execute(&self, coordinator: &mut FlowCoordinator) -> Result<(), StepFailure> {
        for (path, outcome) in &self.findings {
            coordinator.report(path.clone(), outcome.clone());
        }
        match self.raise {
            Some(message) => Err(StepFailure::new(message)),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
struct ScriptedFactory {
    install: Mutex<Vec<Box<dyn Task>>>,
    preflight: Mutex<Vec<Box<dyn Task>>>,
}

impl ScriptedFactory {
    fn set_install(&self, tasks: Vec<Box<dyn Task>>) {
        *self.install.lock().unwrap() = tasks;
    }

    fn set_preflight(&self, tasks: Vec<Box<dyn Task>>) {
        *self.preflight.lock().unwrap() = tasks;
    }
}

impl FlowFactory for ScriptedFactory {
    fn install_tasks(&self, _plan: &Plan, _user: &User) -> Vec<Box<dyn Task>> {
        std::mem::take(&mut *self.install.lock().unwrap())
    }

    fn preflight_tasks(&self, _plan: &Plan, _user: &User) -> Vec<Box<dyn Task>> {
        std::mem::take(&mut *self.preflight.lock().unwrap())
    }
}

struct Harness {
    worker: Arc<Worker>,
    factory: Arc<ScriptedFactory>,
    plan: Plan,
    user: User,
}

fn harness(config: FlowConfig) -> Harness {
    let factory = Arc::new(ScriptedFactory::default());
    let worker = Arc::new(Worker::new(
        Arc::new(MemoryRunStore::new()),
        Arc::new(MemoryCancellationStore::new()),
        factory.clone(),
        config,
    ));
    let plan = Plan::new(PlanId::new(1), "Starter pack")
        .with_step(Step::new(11, "1", "dependencies.install"))
        .with_step(Step::new(12, "2", "package.deploy"))
        .with_step(Step::new(13, "3", "post.configure"));
    Harness {
        worker,
        factory,
        plan,
        user: User::new("user-1", "00Dxxxxxxxxxxxxxxx"),
    }
}

fn all_ok(plan: &Plan) -> Vec<Box<dyn Task>> {
    plan.steps()
        .iter()
        .map(|s| Box::new(Install::ok(s)) as Box<dyn Task>)
        .collect()
}

fn step_key(id: u64) -> ResultKey {
    ResultKey::Step(StepId::new(id))
}

#[tokio::test]
async fn test_job_records_every_step() {
    let h = harness(FlowConfig::default());
    h.factory.set_install(all_ok(&h.plan));

    let (job, outcome) = h.worker.start_job(&h.plan, &h.user).await.unwrap();
    assert_eq!(outcome, FlowOutcome::Completed);

    let job = h.worker.store().job(job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Complete);
    let expected: ResultMap = [11, 12, 13]
        .into_iter()
        .map(|id| (step_key(id), Outcome::ok()))
        .collect();
    assert_eq!(job.results, expected);
}

#[tokio::test]
async fn test_job_failure_leaves_later_steps_absent() {
    let h = harness(FlowConfig::default());
    let steps = h.plan.steps();
    h.factory.set_install(vec![
        Box::new(Install::ok(&steps[0])),
        Box::new(Install::failing(&steps[1], "Package install failed")),
        Box::new(Install::ok(&steps[2])),
    ]);

    let (job, outcome) = h.worker.start_job(&h.plan, &h.user).await.unwrap();
    assert!(matches!(outcome, FlowOutcome::Failed { .. }));

    let job = h.worker.store().job(job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.results.len(), 2);
    assert_eq!(job.results[&step_key(11)], Outcome::ok());
    assert_eq!(
        job.results[&step_key(12)],
        Outcome::error("Package install failed")
    );
    assert!(!job.results.contains_key(&step_key(13)));
}

#[tokio::test]
async fn test_job_cancelled_between_steps() {
    let h = harness(FlowConfig::default());
    let steps = h.plan.steps();
    let job = h
        .worker
        .store()
        .create_job(&h.plan, &h.user)
        .await
        .unwrap();
    let signal = h.worker.cancellation().clone();
    h.factory.set_install(vec![
        Box::new(Install::cancelling(&steps[0], signal.clone(), job.id)),
        Box::new(Install::ok(&steps[1])),
        Box::new(Install::ok(&steps[2])),
    ]);

    let outcome = h.worker.run_job(&job, &h.plan, &h.user).await.unwrap();
    assert_eq!(outcome, FlowOutcome::Canceled);

    let stored = h.worker.store().job(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Canceled);
    let expected: ResultMap = [(step_key(11), Outcome::ok())].into_iter().collect();
    assert_eq!(stored.results, expected);

    // The requester owns the flag.
    assert!(signal.is_requested(job.id).await.unwrap());
    signal.clear(job.id).await.unwrap();
    assert!(!signal.is_requested(job.id).await.unwrap());
}

#[tokio::test]
async fn test_cancel_during_last_step_keeps_every_result() {
    let h = harness(FlowConfig::default());
    let steps = h.plan.steps();
    let job = h
        .worker
        .store()
        .create_job(&h.plan, &h.user)
        .await
        .unwrap();
    let signal = h.worker.cancellation().clone();
    h.factory.set_install(vec![
        Box::new(Install::ok(&steps[0])),
        Box::new(Install::ok(&steps[1])),
        Box::new(Install::cancelling(&steps[2], signal.clone(), job.id)),
    ]);

    // The flag is seen at teardown, after every step has recorded its result.
    let outcome = h.worker.run_job(&job, &h.plan, &h.user).await.unwrap();
    assert_eq!(outcome, FlowOutcome::Canceled);

    let stored = h.worker.store().job(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Canceled);
    let expected: ResultMap = [11, 12, 13]
        .into_iter()
        .map(|id| (step_key(id), Outcome::ok()))
        .collect();
    assert_eq!(stored.results, expected);
}

#[tokio::test]
async fn test_cancellation_is_scoped_to_its_job() {
    let h = harness(FlowConfig::default());
    let other = h
        .worker
        .store()
        .create_job(&h.plan, &h.user)
        .await
        .unwrap();
    h.worker.cancellation().request(other.id).await.unwrap();
    h.factory.set_install(all_ok(&h.plan));

    let (_, outcome) = h.worker.start_job(&h.plan, &h.user).await.unwrap();
    assert_eq!(outcome, FlowOutcome::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_job_step_timeout_is_recorded() {
    #[derive(Debug)]
    struct Slow(StepSpec);

    #[async_trait]
    impl Task for Slow {
        fn spec(&self) -> &StepSpec {
            &self.0
        }

        async fn execute(&self, _coordinator: &mut FlowCoordinator) -> Result<(), StepFailure> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(())
        }
    }

    let h = harness(FlowConfig::default().with_task_timeout(Duration::from_secs(30)));
    h.factory.set_install(vec![Box::new(Slow(h.plan.steps()[0].spec()))]);

    let (job, _) = h.worker.start_job(&h.plan, &h.user).await.unwrap();
    let job = h.worker.store().job(job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.results[&step_key(11)],
        Outcome::error("Step timed out after 30s")
    );
}

fn check(path: &str, findings: Vec<(&str, Outcome)>) -> Check {
    Check {
        spec: StepSpec::at_path(path),
        findings: findings
            .into_iter()
            .map(|(p, o)| (p.to_string(), o))
            .collect(),
        raise: None,
    }
}

#[tokio::test]
async fn test_preflight_keeps_first_finding_per_step() {
    let h = harness(FlowConfig::default());
    h.factory.set_preflight(vec![
        Box::new(check(
            "org_checks",
            vec![
                ("dependencies.install", Outcome::warn("m1")),
                ("dependencies.install", Outcome::error("m2")),
                ("post.configure", Outcome::skip("already configured")),
                ("retired.step", Outcome::error("ignored")),
            ],
        )),
        Box::new(check("empty_check", Vec::new())),
    ]);

    let (preflight, outcome) = h.worker.start_preflight(&h.plan, &h.user).await.unwrap();
    assert_eq!(outcome, FlowOutcome::Completed);

    let stored = h
        .worker
        .store()
        .preflight(preflight.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PreflightStatus::Complete);
    let expected: ResultMap = [
        (step_key(11), Outcome::warn("m1")),
        (step_key(13), Outcome::skip("already configured")),
    ]
    .into_iter()
    .collect();
    assert_eq!(stored.results, expected);
    assert!(stored.is_valid());
}

#[tokio::test]
async fn test_preflight_raise_is_flow_level() {
    let h = harness(FlowConfig::default());
    let mut raising = check("org_access", Vec::new());
    raising.raise = Some("Org is locked");
    h.factory.set_preflight(vec![
        Box::new(check(
            "org_checks",
            vec![("package.deploy", Outcome::warn("old version"))],
        )),
        Box::new(raising),
    ]);

    let (preflight, outcome) = h.worker.start_preflight(&h.plan, &h.user).await.unwrap();
    assert!(matches!(outcome, FlowOutcome::Failed { .. }));

    let stored = h
        .worker
        .store()
        .preflight(preflight.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PreflightStatus::Failed);
    let expected: ResultMap = [(ResultKey::Plan, Outcome::error("Org is locked"))]
        .into_iter()
        .collect();
    assert_eq!(stored.results, expected);
    assert!(!stored.is_valid());
}

#[tokio::test]
async fn test_preflight_queue_runs_in_background() {
    let h = harness(FlowConfig::default());
    h.factory.set_preflight(vec![Box::new(check(
        "org_checks",
        vec![("package.deploy", Outcome::optional(""))],
    ))]);
    let plan = Arc::new(h.plan.clone());
    let store = h.worker.store().clone();

    assert!(store
        .most_recent_preflight(&h.user.id, plan.id, false)
        .await
        .unwrap()
        .is_none());

    let (queue, handle) = PreflightQueue::spawn(h.worker.clone());
    queue.submit(h.user.clone(), plan.clone()).unwrap();
    drop(queue);
    handle.await.unwrap();

    let latest = store
        .most_recent_preflight(&h.user.id, plan.id, true)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.status, PreflightStatus::Complete);
    assert_eq!(latest.results[&step_key(12)], Outcome::optional(""));
}

#[tokio::test]
async fn test_preflight_queue_full() {
    let h = harness(FlowConfig::default().with_queue_capacity(1));
    let plan = Arc::new(h.plan.clone());

    let (queue, _handle) = PreflightQueue::spawn(h.worker.clone());
    queue.submit(h.user.clone(), plan.clone()).unwrap();
    let err = queue.submit(h.user.clone(), plan).unwrap_err();
    assert!(matches!(err, FlowError::QueueFull));
}
