//! Step status and the resolved, dispatch-ready form of a step.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use crate::expression::Expression;

/// Lifecycle status of a single step during dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal step transition from {from:?} to {to:?}")]
pub struct IllegalTransition {
    pub from: StepStatus,
    pub to: StepStatus,
}

impl StepStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running)
    }

    /// A step moves `pending -> running -> {completed|failed|skipped}`
    /// exactly once; no backwards transitions.
    #[must_use]
    pub fn can_transition_to(self, next: StepStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Skipped)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

/// A step input after preparation-time resolution: either a concrete
/// value, or a reference deferred to dispatch time because it names a
/// step that had not yet completed.
#[derive(Debug, Clone)]
pub enum ResolvedInput {
    Value(Value),
    Deferred(Expression),
}

impl ResolvedInput {
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Deferred(_) => None,
        }
    }
}

/// A step whose static inputs have been resolved, ready to be executed
/// by the dispatcher once its dependencies are satisfied.
#[derive(Debug, Clone)]
pub struct ResolvedStep {
    pub id: String,
    pub service: String,
    pub action: String,
    pub inputs: HashMap<String, ResolvedInput>,
    pub depends_on: Vec<String>,
    pub status: StepStatus,
    pub outputs: HashMap<String, Value>,
    pub error: Option<String>,
}

impl ResolvedStep {
    /// Attempt the transition, returning an error if it violates the
    /// one-way lifecycle.
    pub fn transition(&mut self, next: StepStatus) -> Result<(), IllegalTransition> {
        if !self.status.can_transition_to(next) {
            return Err(IllegalTransition { from: self.status, to: next });
        }
        self.status = next;
        Ok(())
    }
}

/// `areDependenciesMet`: true iff every dependency id is present among
/// `all_steps` with status `Completed`. An empty dependency list is
/// always met; a dependency naming a step absent from `all_steps` is
/// never met.
#[must_use]
pub fn dependencies_met(deps: &[String], all_steps: &HashMap<String, ResolvedStep>) -> bool {
    deps.iter().all(|dep| matches!(all_steps.get(dep), Some(step) if step.status == StepStatus::Completed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_with_status(id: &str, status: StepStatus) -> ResolvedStep {
        ResolvedStep {
            id: id.to_string(),
            service: "svc".to_string(),
            action: "fn".to_string(),
            inputs: HashMap::new(),
            depends_on: vec![],
            status,
            outputs: HashMap::new(),
            error: None,
        }
    }

    #[test]
    fn empty_dependency_list_is_always_met() {
        let steps = HashMap::new();
        assert!(dependencies_met(&[], &steps));
    }

    #[test]
    fn pending_dependency_is_not_met() {
        let mut steps = HashMap::new();
        steps.insert("step1".to_string(), step_with_status("step1", StepStatus::Pending));
        assert!(!dependencies_met(&["step1".to_string()], &steps));
    }

    #[test]
    fn completed_dependency_is_met() {
        let mut steps = HashMap::new();
        steps.insert("step1".to_string(), step_with_status("step1", StepStatus::Completed));
        assert!(dependencies_met(&["step1".to_string()], &steps));
    }

    #[test]
    fn missing_dependency_step_is_never_met() {
        let steps = HashMap::new();
        assert!(!dependencies_met(&["missing_step".to_string()], &steps));
    }

    #[test]
    fn forward_transitions_are_allowed() {
        let mut step = step_with_status("s", StepStatus::Pending);
        assert!(step.transition(StepStatus::Running).is_ok());
        assert!(step.transition(StepStatus::Completed).is_ok());
    }

    #[test]
    fn backwards_transitions_are_rejected() {
        let mut step = step_with_status("s", StepStatus::Completed);
        assert!(step.transition(StepStatus::Running).is_err());
    }
}
