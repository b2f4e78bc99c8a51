#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use goalrun_core::api::{Task, TaskContext, TaskExecutionError, TaskExecutor, TaskOutput};

#[derive(Debug, Clone, Default)]
struct Script {
    delay: Option<Duration>,
    fail: Option<String>,
    output: Option<String>,
    panic: bool,
}

/// Executor whose behavior is scripted per task id.
///
/// Records start order and the highest number of tasks it saw running at
/// once. Sleeps honor cancellation unless `ignore_cancel` is set.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    scripts: HashMap<String, Script>,
    default_delay: Duration,
    ignore_cancel: bool,
    running: AtomicUsize,
    max_seen: AtomicUsize,
    started: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn delay(mut self, id: &str, delay: Duration) -> Self {
        self.scripts.entry(id.to_string()).or_default().delay = Some(delay);
        self
    }

    pub fn fail(mut self, id: &str, message: &str) -> Self {
        self.scripts.entry(id.to_string()).or_default().fail = Some(message.to_string());
        self
    }

    pub fn output(mut self, id: &str, output: &str) -> Self {
        self.scripts.entry(id.to_string()).or_default().output = Some(output.to_string());
        self
    }

    pub fn panic(mut self, id: &str) -> Self {
        self.scripts.entry(id.to_string()).or_default().panic = true;
        self
    }

    pub fn ignore_cancel(mut self) -> Self {
        self.ignore_cancel = true;
        self
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_seen.load(Ordering::SeqCst)
    }
}

struct Running<'a>(&'a AtomicUsize);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TaskExecutor for ScriptedExecutor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(
        &self,
        ctx: &TaskContext,
        task: &Task,
    ) -> Result<TaskOutput, TaskExecutionError> {
        self.started.lock().unwrap().push(task.id.clone());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        let _guard = Running(&self.running);

        let script = self.scripts.get(&task.id).cloned().unwrap_or_default();
        let delay = script.delay.unwrap_or(self.default_delay);

        if self.ignore_cancel {
            tokio::time::sleep(delay).await;
        } else {
            tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(TaskExecutionError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        if script.panic {
            panic!("scripted panic in {}", task.id);
        }
        if let Some(message) = script.fail {
            return Err(TaskExecutionError::failed(message));
        }
        Ok(TaskOutput::text(
            script.output.unwrap_or_else(|| format!("{} done", task.id)),
        ))
    }
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// A, then B and C depending on A.
pub fn fan_out_tasks() -> Vec<Task> {
    vec![
        Task::new("A", "root"),
        Task::new("B", "left").depends_on("A"),
        Task::new("C", "right").depends_on("A"),
    ]
}
