use std::time::Duration;

use thiserror::Error;

use super::validation::ValidationError;

/// Engine-level failures.
///
/// Task failures never show up here; they are captured in the task's result.
/// Everything except `Validation` and `Decompose` indicates a defect in the
/// engine itself.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Scheduler invariant violated: {0}")]
    SchedulerInvariant(String),

    #[error("Invalid status transition for task '{task_id}': {from} -> {to}")]
    InvalidTransition {
        task_id: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("Concurrency gate closed unexpectedly")]
    GateClosed,

    #[error("Nested plan depth {depth} exceeds limit {max_depth}")]
    DepthExceeded { depth: usize, max_depth: usize },

    #[error("Decomposition failed: {0}")]
    Decompose(String),
}

impl PlanError {
    /// True for errors caused by the caller's input rather than an engine bug.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Decompose(_) | Self::DepthExceeded { .. }
        )
    }
}

/// Failure of a single task's unit of work.
///
/// Returned by `TaskExecutor` implementations and recorded on the task; it
/// never aborts the plan.
#[derive(Error, Debug)]
pub enum TaskExecutionError {
    #[error("Task execution failed: {0}")]
    Failed(String),

    #[error("Task timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Task cancelled")]
    Cancelled,

    #[error("Task panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskExecutionError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Timeout(_) | Self::Other(_))
    }
}

impl From<std::io::Error> for TaskExecutionError {
    fn from(err: std::io::Error) -> Self {
        Self::Failed(err.to_string())
    }
}
