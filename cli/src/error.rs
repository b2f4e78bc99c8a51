use goalrun_core::api::{PlanError, PlanStatus, ValidationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),
    #[error("invalid plan: {0}")]
    Validation(#[from] ValidationError),
    #[error("plan error: {0}")]
    Plan(PlanError),
    #[error("command failed: {0}")]
    Command(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl From<PlanError> for CliError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::Validation(v) => Self::Validation(v),
            other => Self::Plan(other),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Anyhow(err.into())
    }
}

pub fn exit_code_for_error(e: &CliError) -> i32 {
    // 11: config error
    // 12: plan rejected before execution
    // 50: internal/uncategorized
    match e {
        CliError::Config(_) | CliError::Command(_) => 11,
        CliError::Validation(_) => 12,
        CliError::Plan(pe) if pe.is_user_error() => 12,
        CliError::Plan(_) => 50,
        CliError::Io(_) => 50,
        CliError::Anyhow(_) => 50,
    }
}

pub fn exit_code_for_status(status: PlanStatus) -> i32 {
    match status {
        PlanStatus::Succeeded | PlanStatus::GoalMet => 0,
        PlanStatus::PartialSuccess => 1,
        PlanStatus::Failed => 2,
        PlanStatus::TimedOut => 3,
        PlanStatus::Cancelled => 4,
    }
}
