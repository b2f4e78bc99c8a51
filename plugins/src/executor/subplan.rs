use std::sync::Arc;

use async_trait::async_trait;
use goalrun_core::api::{
    ExecutionEngine, Plan, PlanObserver, Task, TaskContext, TaskExecutionError, TaskExecutor,
    TaskOutput, TaskStatus,
};
use serde_json::json;

/// Runs composite tasks as nested plans through the same engine.
///
/// Atomic tasks go straight to the inner executor. A composite task's
/// subtasks become a plan of their own, executed one level deeper with the
/// parent's strategy and limits; the engine refuses to go past `max_depth`.
#[derive(Clone)]
pub struct SubPlanExecutor {
    inner: Arc<dyn TaskExecutor>,
    observers: Vec<Arc<dyn PlanObserver>>,
}

impl SubPlanExecutor {
    pub fn new(inner: Arc<dyn TaskExecutor>) -> Self {
        Self {
            inner,
            observers: Vec::new(),
        }
    }

    /// Observers that also receive the nested plans' events.
    pub fn with_observers(mut self, observers: Vec<Arc<dyn PlanObserver>>) -> Self {
        self.observers = observers;
        self
    }

    fn sub_plan(&self, ctx: &TaskContext, task: &Task) -> Result<Plan, TaskExecutionError> {
        let mut config = (*ctx.config).clone();
        // The parent's deadline and cancellation already cover the nested run.
        config.timeout_ms = None;
        config.goal_check_interval = 0;

        let goal = if task.description.is_empty() {
            task.id.clone()
        } else {
            task.description.clone()
        };

        Plan::builder(goal)
            .strategy(ctx.strategy)
            .config(config)
            .tasks(task.subtasks.iter().map(Task::definition))
            .build()
            .map_err(|e| {
                TaskExecutionError::failed(format!("invalid sub-plan for '{}': {}", task.id, e))
            })
    }
}

#[async_trait]
impl TaskExecutor for SubPlanExecutor {
    fn name(&self) -> &str {
        "subplan"
    }

    async fn execute(
        &self,
        ctx: &TaskContext,
        task: &Task,
    ) -> Result<TaskOutput, TaskExecutionError> {
        if !task.is_composite() {
            return self.inner.execute(ctx, task).await;
        }

        let plan = self.sub_plan(ctx, task)?;
        let engine = ExecutionEngine::builder(Arc::new(self.clone()))
            .observers(self.observers.iter().cloned())
            .depth(ctx.depth + 1)
            .build();

        tracing::debug!(
            task_id = %task.id,
            subtasks = plan.len(),
            depth = ctx.depth + 1,
            "running sub-plan"
        );

        let result = engine
            .execute_with_cancel(plan, ctx.cancel.child_token())
            .await
            .map_err(|e| TaskExecutionError::Other(anyhow::Error::new(e)))?;

        if !result.status.is_success() {
            let failed: Vec<&str> = result.failed_tasks().map(|t| t.id.as_str()).collect();
            return Err(TaskExecutionError::failed(format!(
                "sub-plan {} (failed: [{}])",
                result.status,
                failed.join(", ")
            )));
        }

        let output = result
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Succeeded)
            .filter_map(|t| t.result.as_ref())
            .map(|r| r.output.as_str())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(TaskOutput::text(output).with_data(json!({
            "run_id": result.run_id,
            "status": result.status,
            "succeeded": result.metrics.succeeded,
            "skipped": result.metrics.skipped,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goalrun_core::api::{PlanStatus, TaskOutput};

    struct Echo;

    #[async_trait]
    impl TaskExecutor for Echo {
        async fn execute(
            &self,
            ctx: &TaskContext,
            task: &Task,
        ) -> Result<TaskOutput, TaskExecutionError> {
            if task.id == "bad" {
                return Err(TaskExecutionError::failed("bad leaf"));
            }
            Ok(TaskOutput::text(format!("{}@{}", task.id, ctx.depth)))
        }
    }

    fn engine() -> ExecutionEngine {
        ExecutionEngine::new(Arc::new(SubPlanExecutor::new(Arc::new(Echo))))
    }

    #[tokio::test]
    async fn composite_task_runs_its_subtasks_one_level_down() {
        let parent = Task::new("parent", "build everything")
            .with_subtask(Task::new("x", "x"))
            .with_subtask(Task::new("y", "y").depends_on("x"));
        let plan = Plan::builder("nested")
            .task(Task::new("leaf", "leaf"))
            .task(parent.depends_on("leaf"))
            .build()
            .unwrap();

        let result = engine().execute(plan).await.unwrap();

        assert_eq!(result.status, PlanStatus::Succeeded);
        let parent = result.task("parent").unwrap().result.as_ref().unwrap();
        assert_eq!(parent.output, "x@1\ny@1");
        assert_eq!(parent.data.as_ref().unwrap()["status"], "succeeded");
        assert_eq!(result.task("leaf").unwrap().result.as_ref().unwrap().output, "leaf@0");
    }

    #[tokio::test]
    async fn failing_subtask_fails_the_composite() {
        let plan = Plan::builder("nested failure")
            .task(Task::new("parent", "p").with_subtask(Task::new("bad", "b")))
            .build()
            .unwrap();

        let result = engine().execute(plan).await.unwrap();

        assert_eq!(result.status_of("parent"), Some(TaskStatus::Failed));
        let error = result.task("parent").unwrap().result.as_ref().unwrap().error.clone();
        assert!(error.unwrap().contains("failed: [bad]"));
    }

    #[tokio::test]
    async fn nesting_is_bounded_by_max_depth() {
        let deep = Task::new("l1", "l1")
            .with_subtask(Task::new("l2", "l2").with_subtask(Task::new("l3", "l3")));
        let plan = Plan::builder("deep")
            .max_depth(2)
            .task(deep)
            .build()
            .unwrap();

        // Engine at depth 1 runs l1's sub-plan at depth 2 and l2's at 3.
        let engine = ExecutionEngine::builder(Arc::new(SubPlanExecutor::new(Arc::new(Echo))))
            .depth(1)
            .build();
        let result = engine.execute(plan).await.unwrap();

        assert_eq!(result.status_of("l1"), Some(TaskStatus::Failed));
        let error = result.task("l1").unwrap().result.as_ref().unwrap().error.clone();
        assert!(error.unwrap().contains("l2"), "inner failure is reported");
    }
}
