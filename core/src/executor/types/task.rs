use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::result::TaskResult;

/// Whether a task is a single unit of work or a container for subtasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    Atomic,
    Composite,
}

/// Lifecycle state of a task within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }

    /// Allowed edges of the per-task state machine.
    ///
    /// Pending -> Ready -> Running -> {Succeeded, Failed}; Pending and Ready
    /// may be cut short to Skipped when an ancestor fails or the run halts.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::{Failed, Pending, Ready, Running, Skipped, Succeeded};
        matches!(
            (self, next),
            (Pending, Ready)
                | (Pending, Skipped)
                | (Ready, Running)
                | (Ready, Skipped)
                | (Running, Succeeded)
                | (Running, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional knobs attached to a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Per-task execution timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// A unit of work in a plan.
///
/// The definition fields (`id` through `metadata`) are fixed once the plan is
/// validated. The run fields (`status` onwards) are written only by the engine
/// while the plan executes and are returned inside the `PlanResult`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub kind: TaskKind,

    /// Ids of tasks that must finish before this one starts, in declaration order.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Work handed to the executor (a shell command, a prompt, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<Task>,

    #[serde(default)]
    pub metadata: TaskMetadata,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            kind: TaskKind::Atomic,
            dependencies: Vec::new(),
            input: None,
            subtasks: Vec::new(),
            metadata: TaskMetadata::default(),
            status: TaskStatus::Pending,
            result: None,
            started_at: None,
            ended_at: None,
        }
    }

    pub fn depends_on(mut self, dep: impl Into<String>) -> Self {
        self.dependencies.push(dep.into());
        self
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.metadata.timeout_ms = Some(timeout_ms);
        self
    }

    /// Adds a nested subtask and marks this task composite.
    pub fn with_subtask(mut self, subtask: Task) -> Self {
        self.kind = TaskKind::Composite;
        self.subtasks.push(subtask);
        self
    }

    pub fn is_composite(&self) -> bool {
        self.kind == TaskKind::Composite || !self.subtasks.is_empty()
    }

    /// Copy of the definition with all run fields cleared, subtasks included.
    pub fn definition(&self) -> Task {
        Task {
            id: self.id.clone(),
            description: self.description.clone(),
            kind: self.kind,
            dependencies: self.dependencies.clone(),
            input: self.input.clone(),
            subtasks: self.subtasks.iter().map(Task::definition).collect(),
            metadata: self.metadata.clone(),
            status: TaskStatus::Pending,
            result: None,
            started_at: None,
            ended_at: None,
        }
    }
}
