//! Fire-and-forget preflight submission.

use crate::worker::Worker;
use installflow_core::{FlowError, Plan, User};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A queued request to validate `plan` for `user`.
#[derive(Debug, Clone)]
pub struct PreflightRequest {
    pub user: User,
    pub plan: Arc<Plan>,
}

/// Handle for submitting preflights to a background consumer.
///
/// Submissions return as soon as the request is queued. Until the consumer
/// finishes the run, [`RunStore::most_recent_preflight`] does not see it.
///
/// [`RunStore::most_recent_preflight`]: installflow_core::RunStore::most_recent_preflight
#[derive(Debug, Clone)]
pub struct PreflightQueue {
    tx: mpsc::Sender<PreflightRequest>,
}

impl PreflightQueue {
    /// Spawns the consumer task on the current runtime.
    ///
    /// The consumer runs one preflight at a time and exits once every
    /// `PreflightQueue` handle is dropped.
    pub fn spawn(worker: Arc<Worker>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<PreflightRequest>(worker.config().queue_capacity.max(1));
        let handle = tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                debug!(user = %request.user.id, plan = %request.plan.id, "Dequeued preflight");
                match worker.start_preflight(&request.plan, &request.user).await {
                    Ok((preflight, outcome)) => {
                        info!(run = %preflight.run_ref(), outcome = ?outcome, "Preflight done");
                    }
                    Err(e) => {
                        warn!(
                            user = %request.user.id,
                            plan = %request.plan.id,
                            error = %e,
                            "Preflight could not run"
                        );
                    }
                }
            }
            debug!("Preflight queue closed");
        });
        (Self { tx }, handle)
    }

    /// Queues a preflight without waiting for it to run.
    ///
    /// Fails with [`FlowError::QueueFull`] when the queue is at capacity and
    /// [`FlowError::QueueClosed`] once the consumer has stopped.
    pub fn submit(&self, user: User, plan: Arc<Plan>) -> Result<(), FlowError> {
        self.tx
            .try_send(PreflightRequest { user, plan })
            .map_err(|e| match e {
                TrySendError::Full(_) => FlowError::QueueFull,
                TrySendError::Closed(_) => FlowError::QueueClosed,
            })
    }
}
