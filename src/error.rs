//! Structured error/warning surface shared by every core component.
//!
//! Mirrors spec.md §7: every fallible entry point returns a `CoreError`
//! drawn from the five listed error kinds, and every component that can
//! produce soft warnings alongside a usable result returns [`Outcome`]
//! rather than a bare value.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("input invalid: {0}")]
    InputInvalid(String),

    #[error("solver reached its time limit without a feasible plan")]
    SolverTimeoutNoPlan,

    #[error("solver reported the model as infeasible")]
    SolverInfeasible,

    #[error("materialisation mismatch: {0}")]
    MaterialisationMismatch(String),

    #[error("store operation failed: {0}")]
    TransientIo(String),

    #[error("plan has ADR violations and cannot be confirmed")]
    AdrViolation,

    #[error("a job is already running for this schedule")]
    JobAlreadyRunning,

    #[error("job {0} not found")]
    JobNotFound(String),
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::TransientIo(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::TransientIo(format!("json: {e}"))
    }
}

/// A non-fatal warning attached to an otherwise successful [`Outcome`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Warning {
    pub component: &'static str,
    pub message: String,
}

impl Warning {
    pub fn new(component: &'static str, message: impl Into<String>) -> Self {
        Self {
            component,
            message: message.into(),
        }
    }
}

/// Result object carrying `{success, warnings, error?}` per spec.md §7.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Outcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(value: T, warnings: Vec<Warning>) -> Self {
        Self { value, warnings }
    }

    pub fn push_warning(&mut self, component: &'static str, message: impl Into<String>) {
        self.warnings.push(Warning::new(component, message));
    }
}
