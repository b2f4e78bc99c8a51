use std::sync::Arc;

use async_trait::async_trait;
use goalrun_core::api::{
    RetryStrategy, Task, TaskContext, TaskExecutionError, TaskExecutor, TaskOutput,
};

/// Wraps an executor and retries failed attempts per a [`RetryStrategy`].
///
/// The number of retries used is reported on the returned output. Waiting
/// between attempts stops early when the plan is cancelled.
pub struct RetryingExecutor {
    inner: Arc<dyn TaskExecutor>,
    strategy: Arc<dyn RetryStrategy>,
}

impl RetryingExecutor {
    pub fn new(inner: Arc<dyn TaskExecutor>, strategy: Arc<dyn RetryStrategy>) -> Self {
        Self { inner, strategy }
    }
}

#[async_trait]
impl TaskExecutor for RetryingExecutor {
    fn name(&self) -> &str {
        "retrying"
    }

    async fn execute(
        &self,
        ctx: &TaskContext,
        task: &Task,
    ) -> Result<TaskOutput, TaskExecutionError> {
        let mut attempt: u32 = 1;
        loop {
            let err = match self.inner.execute(ctx, task).await {
                Ok(mut output) => {
                    output.retries_used = attempt - 1;
                    return Ok(output);
                }
                Err(err) => err,
            };

            let Some(delay) = self.strategy.next_delay(attempt, &err) else {
                return Err(err);
            };

            tracing::debug!(
                task_id = %task.id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                strategy = self.strategy.name(),
                error = %err,
                "retrying task"
            );

            tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(TaskExecutionError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}
