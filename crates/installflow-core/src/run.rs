//! Flow run records: installation jobs and preflight results.

use crate::outcome::{has_errors, ResultMap};
use crate::step::PlanId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary key of a run record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(u64);

impl RunId {
    /// Creates a new RunId.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which table a run lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Job,
    Preflight,
}

/// Fully qualified reference to a run record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunRef {
    pub kind: RunKind,
    pub id: RunId,
}

impl RunRef {
    /// Refers to the job `id`.
    pub fn job(id: RunId) -> Self {
        Self {
            kind: RunKind::Job,
            id,
        }
    }

    /// Refers to the preflight `id`.
    pub fn preflight(id: RunId) -> Self {
        Self {
            kind: RunKind::Preflight,
            id,
        }
    }
}

impl fmt::Display for RunRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RunKind::Job => write!(f, "job:{}", self.id),
            RunKind::Preflight => write!(f, "preflight:{}", self.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the target organization a flow runs against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(String);

impl OrgId {
    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The actor requesting a run, together with the organization they act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub org_id: OrgId,
}

impl User {
    /// Creates a user belonging to `org_id`.
    pub fn new(id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            org_id: OrgId::new(org_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Started,
    Complete,
    Failed,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreflightStatus {
    Started,
    Complete,
    Failed,
}

/// An installation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: RunId,
    pub plan_id: PlanId,
    pub user: UserId,
    pub org_id: OrgId,
    pub status: JobStatus,
    pub results: ResultMap,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// The reference used for result writes and logs.
    pub fn run_ref(&self) -> RunRef {
        RunRef::job(self.id)
    }
}

/// A read-only validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreflightResult {
    pub id: RunId,
    pub plan_id: PlanId,
    pub user: UserId,
    pub org_id: OrgId,
    pub status: PreflightStatus,
    pub results: ResultMap,
    pub created_at: DateTime<Utc>,
}

impl PreflightResult {
    pub fn run_ref(&self) -> RunRef {
        RunRef::preflight(self.id)
    }

    /// A preflight is valid once it completed without any error finding.
    pub fn is_valid(&self) -> bool {
        self.status == PreflightStatus::Complete && !has_errors(&self.results)
    }
}
