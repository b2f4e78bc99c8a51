use serde::{Deserialize, Serialize};

use super::config::Strategy;
use super::goal::GoalState;
use super::task::{Task, TaskStatus};
use super::timeline::Timeline;

/// What a `TaskExecutor` hands back for a successful unit of work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    pub output: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(default)]
    pub retries_used: u32,
}

impl TaskOutput {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Result of executing a single task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Task identifier
    pub task_id: String,

    pub success: bool,

    /// Captured output (may be truncated by the executor)
    #[serde(default)]
    pub output: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Error message (if any)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Execution duration in milliseconds
    pub duration_ms: u64,

    /// Number of retries used
    #[serde(default)]
    pub retries_used: u32,
}

impl TaskResult {
    pub fn succeeded(task_id: impl Into<String>, output: TaskOutput, duration_ms: u64) -> Self {
        Self {
            task_id: task_id.into(),
            success: true,
            output: output.output,
            data: output.data,
            error: None,
            duration_ms,
            retries_used: output.retries_used,
        }
    }

    pub fn failed(task_id: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            task_id: task_id.into(),
            success: false,
            output: String::new(),
            data: None,
            error: Some(error.into()),
            duration_ms,
            retries_used: 0,
        }
    }
}

/// Terminal status of a whole plan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Every task succeeded.
    Succeeded,
    /// Some tasks failed or were skipped, at least one succeeded.
    PartialSuccess,
    Failed,
    TimedOut,
    Cancelled,
    /// A goal condition was met and the run stopped early.
    GoalMet,
}

impl PlanStatus {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Succeeded | Self::GoalMet)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::PartialSuccess => "partial_success",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
            Self::GoalMet => "goal_met",
        }
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate numbers for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanMetrics {
    pub tasks_per_sec: f64,
    pub avg_latency_ms: f64,
    /// Mean efficiency over the measured levels; 1.0 is ideal speedup.
    pub parallel_efficiency: f64,
    /// Succeeded / total tasks.
    pub success_rate: f64,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub peak_concurrency: usize,
    pub total_duration_ms: u64,
}

/// Everything a caller gets back from one engine run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResult {
    pub run_id: String,
    pub goal: String,
    pub status: PlanStatus,
    /// Final task records, in declaration order.
    pub tasks: Vec<Task>,
    pub metrics: PlanMetrics,
    pub timeline: Timeline,
    pub goal_state: GoalState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_condition: Option<String>,
    pub early_terminated: bool,
    /// Strategy in effect when the run ended.
    pub final_strategy: Strategy,
    /// Dependency levels as task ids.
    pub levels: Vec<Vec<String>>,
}

impl PlanResult {
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.task(id).map(|t| t.status)
    }

    pub fn failed_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.status == TaskStatus::Failed)
    }

    /// Results of every task that finished, success or not.
    pub fn results(&self) -> Vec<&TaskResult> {
        self.tasks.iter().filter_map(|t| t.result.as_ref()).collect()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
