use std::process::Stdio;

use async_trait::async_trait;
use goalrun_core::api::{
    CommandConfig, Task, TaskContext, TaskExecutionError, TaskExecutor, TaskOutput,
};
use serde_json::json;
use tokio::process::Command;

/// Runs a task's `input` (or, failing that, its description) as a shell
/// command.
///
/// Succeeds on exit status 0. Stdout becomes the task output; both streams
/// are cut to the last `capture_bytes`. The child is killed when the plan is
/// cancelled or the task times out.
pub struct CommandExecutor {
    config: CommandConfig,
}

impl CommandExecutor {
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }

    fn command_line<'a>(&self, task: &'a Task) -> Result<&'a str, TaskExecutionError> {
        let line = task.input.as_deref().unwrap_or(&task.description).trim();
        if line.is_empty() {
            return Err(TaskExecutionError::failed(format!(
                "task '{}' has no command to run",
                task.id
            )));
        }
        Ok(line)
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(CommandConfig::default())
    }
}

#[async_trait]
impl TaskExecutor for CommandExecutor {
    fn name(&self) -> &str {
        "command"
    }

    async fn execute(
        &self,
        ctx: &TaskContext,
        task: &Task,
    ) -> Result<TaskOutput, TaskExecutionError> {
        let line = self.command_line(task)?;

        let mut cmd = Command::new(&self.config.shell);
        cmd.arg(&self.config.shell_arg)
            .arg(line)
            .env("GOALRUN_RUN_ID", &ctx.run_id)
            .env("GOALRUN_TASK_ID", &task.id)
            .env("GOALRUN_GOAL", &ctx.goal)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(task_id = %task.id, command = line, "spawning command");
        let child = cmd.spawn()?;

        // Dropping the wait future drops the child, which kills it.
        let output = tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(TaskExecutionError::Cancelled),
            out = child.wait_with_output() => out?,
        };

        let stdout = tail(&output.stdout, self.config.capture_bytes);
        let stderr = tail(&output.stderr, self.config.capture_bytes);
        let code = output.status.code();

        if !output.status.success() {
            let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
            let detail = stderr.trim();
            return Err(TaskExecutionError::failed(if detail.is_empty() {
                format!("command exited with {code}")
            } else {
                format!("command exited with {code}: {detail}")
            }));
        }

        Ok(TaskOutput::text(stdout.trim_end()).with_data(json!({
            "exit_code": code,
            "stderr": stderr,
        })))
    }
}

/// Last `max` bytes of `bytes` as lossy UTF-8.
fn tail(bytes: &[u8], max: usize) -> String {
    let start = bytes.len().saturating_sub(max);
    String::from_utf8_lossy(&bytes[start..]).into_owned()
}
