//! Outcome records and the per-run result map.

use crate::step::StepId;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Status of a single outcome record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Ok,
    Error,
    Warn,
    Optional,
    Skip,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeStatus::Ok => "ok",
            OutcomeStatus::Error => "error",
            OutcomeStatus::Warn => "warn",
            OutcomeStatus::Optional => "optional",
            OutcomeStatus::Skip => "skip",
        };
        f.write_str(s)
    }
}

/// `{status, message}` as persisted per step (or per flow under `"plan"`).
///
/// `message` is omitted from the serialized form when absent, which is the
/// case for plain `ok` outcomes.
///
/// # Examples
///
/// ```
/// use installflow_core::Outcome;
///
/// let json = serde_json::to_string(&Outcome::ok()).unwrap();
/// assert_eq!(json, r#"{"status":"ok"}"#);
///
/// let json = serde_json::to_string(&Outcome::error("boom")).unwrap();
/// assert_eq!(json, r#"{"status":"error","message":"boom"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Outcome {
    /// A successful step with no message.
    pub fn ok() -> Self {
        Self {
            status: OutcomeStatus::Ok,
            message: None,
        }
    }

    /// A failed step or a blocking preflight finding.
    pub fn error(message: impl Into<String>) -> Self {
        Self::with_message(OutcomeStatus::Error, message)
    }

    /// A non-blocking preflight finding.
    pub fn warn(message: impl Into<String>) -> Self {
        Self::with_message(OutcomeStatus::Warn, message)
    }

    /// Marks the step optional for this org.
    pub fn optional(message: impl Into<String>) -> Self {
        Self::with_message(OutcomeStatus::Optional, message)
    }

    /// Marks the step to be skipped.
    pub fn skip(message: impl Into<String>) -> Self {
        Self::with_message(OutcomeStatus::Skip, message)
    }

    /// Creates an outcome with `status` and `message`.
    pub fn with_message(status: OutcomeStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
        }
    }

    /// Returns `true` for error outcomes.
    pub fn is_error(&self) -> bool {
        self.status == OutcomeStatus::Error
    }
}

/// Literal key used for flow-level outcomes.
pub const PLAN_KEY: &str = "plan";

/// Key of the result map: a persisted step or the flow as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResultKey {
    Step(StepId),
    Plan,
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultKey::Step(id) => write!(f, "{}", id),
            ResultKey::Plan => f.write_str(PLAN_KEY),
        }
    }
}

impl From<StepId> for ResultKey {
    fn from(id: StepId) -> Self {
        ResultKey::Step(id)
    }
}

/// Error returned when a string is neither a step id nor `"plan"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid result key: {0:?}")]
pub struct ResultKeyError(pub String);

impl FromStr for ResultKey {
    type Err = ResultKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == PLAN_KEY {
            return Ok(ResultKey::Plan);
        }
        s.parse::<u64>()
            .map(|id| ResultKey::Step(StepId::new(id)))
            .map_err(|_| ResultKeyError(s.to_string()))
    }
}

impl Serialize for ResultKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResultKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// The `results` field of a run record.
pub type ResultMap = BTreeMap<ResultKey, Outcome>;

/// Returns `true` if any entry in `results` is an error.
pub fn has_errors(results: &ResultMap) -> bool {
    results.values().any(Outcome::is_error)
}
