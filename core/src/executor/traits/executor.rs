use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskExecutionError;
use crate::executor::types::{PlanConfig, Strategy, Task, TaskOutput, TaskResult};

/// What an executor knows about the run it is working for.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub run_id: String,
    /// Goal of the plan this task belongs to.
    pub goal: String,
    /// Nesting depth of the running plan; 0 for a top-level plan.
    pub depth: usize,
    /// Cancelled when the plan is cancelled or times out.
    pub cancel: CancellationToken,
    pub config: Arc<PlanConfig>,
    pub strategy: Strategy,
    /// Results of this task's direct dependencies.
    pub dependency_results: HashMap<String, TaskResult>,
}

impl TaskContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn dependency_output(&self, task_id: &str) -> Option<&str> {
        self.dependency_results
            .get(task_id)
            .map(|r| r.output.as_str())
    }
}

/// Performs a single task's unit of work.
///
/// Implementations may answer directly, call a tool, or run a nested plan
/// through the engine again. They must return promptly once `ctx.cancel`
/// fires. Errors are recorded on the task and never abort the plan.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    fn name(&self) -> &str {
        "executor"
    }

    async fn execute(
        &self,
        ctx: &TaskContext,
        task: &Task,
    ) -> Result<TaskOutput, TaskExecutionError>;
}

