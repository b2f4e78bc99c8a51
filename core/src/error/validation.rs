use thiserror::Error;

/// Structural problems found while building a task graph or plan.
///
/// Raised before any task runs; a plan that produced one of these is never
/// handed to the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Task ID must not be empty")]
    EmptyTaskId,

    #[error("Duplicate task ID: {0}")]
    DuplicateTaskId(String),

    #[error("Dependency not found: task '{task_id}' depends on '{missing_dep}'")]
    DependencyNotFound {
        task_id: String,
        missing_dep: String,
    },

    #[error("Task '{0}' depends on itself")]
    SelfDependency(String),

    #[error("Circular dependency detected: {}", format_cycle_path(.cycle))]
    CircularDependency { cycle: Vec<String> },

    #[error("Subtask nesting too deep under '{task_id}': depth {depth} exceeds limit {max_depth}")]
    DepthExceeded {
        task_id: String,
        depth: usize,
        max_depth: usize,
    },

    #[error("Task '{task_id}' has {count} subtasks (limit {max_subtasks})")]
    TooManySubtasks {
        task_id: String,
        count: usize,
        max_subtasks: usize,
    },

    #[error("Unknown task in dependency declaration: {0}")]
    UnknownTask(String),

    #[error("Invalid goal condition '{name}': {reason}")]
    InvalidCondition { name: String, reason: String },

    #[error("Invalid plan configuration: {0}")]
    InvalidConfig(String),
}

impl ValidationError {
    /// Task ids taking part in the offending cycle, if this is a cycle error.
    /// A self-dependency is a cycle of one.
    pub fn cycle_members(&self) -> Option<&[String]> {
        match self {
            Self::CircularDependency { cycle } => Some(cycle),
            Self::SelfDependency(id) => Some(std::slice::from_ref(id)),
            _ => None,
        }
    }
}

fn format_cycle_path(cycle: &[String]) -> String {
    match cycle.first() {
        Some(first) => format!("{} -> {}", cycle.join(" -> "), first),
        None => String::new(),
    }
}
