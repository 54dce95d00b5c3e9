//! Typed failure classes for the pipeline.
//!
//! Errors travel as `anyhow::Error` through the orchestration layers and are
//! recovered with `downcast_ref` where a boundary needs to know the class:
//!
//! - [`PlanningError`] / [`EmptyPlanError`]: the planner produced an
//!   unparsable or empty plan. Fatal to the whole run.
//! - [`GenerationError`]: the coder produced unparsable or out-of-scope
//!   output. Fatal to the current task only.
//! - [`ModelError`]: backend transport/quota failure. Fatal to whichever
//!   task's agent triggered it.
//!
//! Test failure is never an error: it is data (`TestResult`) and the expected
//! driver of revision.

use std::fmt;

/// Planner produced output that cannot be turned into a well-formed project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanningError {
    pub reason: String,
}

impl PlanningError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PlanningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "planning failed: {}", self.reason)
    }
}

impl std::error::Error for PlanningError {}

/// Planner returned zero tasks for a non-trivial request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmptyPlanError;

impl fmt::Display for EmptyPlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "planner produced zero tasks for a non-trivial request")
    }
}

impl std::error::Error for EmptyPlanError {}

/// Coder produced output that cannot be turned into a file-content mapping,
/// or a mapping that violates the task's scope or revision contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationError {
    pub reason: String,
}

impl GenerationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code generation failed: {}", self.reason)
    }
}

impl std::error::Error for GenerationError {}

/// Language-model backend failed at the transport level (spawn, timeout,
/// nonzero exit). A non-conforming completion is never a `ModelError`; that
/// is a parse failure of the calling agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelError {
    pub reason: String,
}

impl ModelError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model backend failure: {}", self.reason)
    }
}

impl std::error::Error for ModelError {}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn errors_survive_anyhow_downcast() {
        let err: anyhow::Error = PlanningError::new("bad json").into();
        let planning = err.downcast_ref::<PlanningError>().expect("downcast");
        assert_eq!(planning.reason, "bad json");

        let err: anyhow::Error = GenerationError::new("not a mapping").into();
        assert!(err.downcast_ref::<GenerationError>().is_some());
        assert!(err.downcast_ref::<ModelError>().is_none());
    }

    #[test]
    fn errors_survive_context_wrapping() {
        let err = anyhow!(ModelError::new("quota exceeded")).context("plan query");
        assert!(err.downcast_ref::<ModelError>().is_some());
    }
}
