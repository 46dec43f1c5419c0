//! Plan and step model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Persisted primary key of a [`Step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(u64);

impl StepId {
    /// Creates a new StepId.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for StepId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Persisted primary key of a [`Plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(u64);

impl PlanId {
    /// Creates a new PlanId.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One unit of work within a plan.
///
/// `step_num` is assigned by the plan author and stays stable across plan
/// versions; job runs use it to correlate a running task with this record.
/// Preflight findings address the step by `path` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub step_num: String,
    pub path: String,
    pub name: String,
}

impl Step {
    /// Creates a step; the name defaults to the path.
    pub fn new(id: u64, step_num: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            id: StepId::new(id),
            step_num: step_num.into(),
            name: path.clone(),
            path,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builds the runtime specification the runner hands to the hooks.
    pub fn spec(&self) -> StepSpec {
        StepSpec {
            step_num: Some(self.step_num.clone()),
            path: self.path.clone(),
            name: self.name.clone(),
        }
    }
}

/// An installable plan: an ordered sequence of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub title: String,
    pub steps: Vec<Step>,
}

impl Plan {
    /// Creates a plan with no steps.
    pub fn new(id: PlanId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            steps: Vec::new(),
        }
    }

    /// Appends a step, keeping plan order.
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// The steps in plan order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

/// Runtime view of a step as seen by the flow hooks.
///
/// `step_num` may be absent when the executing engine does not carry the
/// author-assigned token; such a spec never resolves to a persisted step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepSpec {
    pub step_num: Option<String>,
    pub path: String,
    pub name: String,
}

impl StepSpec {
    /// A spec addressed by step number.
    pub fn new(step_num: impl Into<String>) -> Self {
        Self {
            step_num: Some(step_num.into()),
            ..Self::default()
        }
    }

    /// A spec addressed only by path.
    pub fn at_path(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            step_num: None,
            name: path.clone(),
            path,
        }
    }

    /// The step number token, if the spec has one.
    pub fn step_num(&self) -> Option<&str> {
        self.step_num.as_deref()
    }
}

impl fmt::Display for StepSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.step_num {
            Some(num) => write!(f, "{} ({})", num, self.name),
            None => write!(f, "{}", self.path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_spec_from_step() {
        let step = Step::new(7, "1.0", "install_pkg").with_name("Install package");
        let spec = step.spec();
        assert_eq!(spec.step_num(), Some("1.0"));
        assert_eq!(spec.path, "install_pkg");
        assert_eq!(spec.to_string(), "1.0 (Install package)");
    }

    #[test]
    fn test_spec_at_path() {
        let spec = StepSpec::at_path("checks.org_type");
        assert_eq!(spec.step_num(), None);
        assert_eq!(spec.to_string(), "checks.org_type");
    }

    #[test]
    fn test_plan_keeps_order() {
        let plan = Plan::new(PlanId::new(1), "Install")
            .with_step(Step::new(3, "1", "a"))
            .with_step(Step::new(1, "2", "b"));
        let ids: Vec<_> = plan.steps().iter().map(|s| s.id.get()).collect();
        assert_eq!(ids, vec![3, 1]);
    }
}
