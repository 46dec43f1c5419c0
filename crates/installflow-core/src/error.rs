//! Error types.

use crate::run::RunRef;
use thiserror::Error;

/// A task raised during execution.
///
/// The message is what gets persisted as the outcome message, so `Display`
/// renders it verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct StepFailure {
    message: String,
}

impl StepFailure {
    /// Creates a failure carrying `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the raised message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for StepFailure {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StepFailure {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Infrastructure errors raised by the flow hooks and their collaborators.
///
/// Step failures are not represented here: they become outcome records.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FlowError {
    /// The run store rejected a read or write.
    #[error("Run store error: {0}")]
    Store(String),

    /// The cancellation store could not be reached.
    #[error("Cancellation store error: {0}")]
    Cancellation(String),

    /// A referenced run record does not exist.
    #[error("Run not found: {0}")]
    RunNotFound(RunRef),

    /// The flow configuration is invalid.
    #[error("Invalid flow configuration: {0}")]
    Configuration(String),

    /// The background queue no longer accepts submissions.
    #[error("Queue closed")]
    QueueClosed,

    /// The background queue is at capacity.
    #[error("Queue full")]
    QueueFull,
}
