//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `goalrun_core::api` instead of reaching into internal modules.

pub use crate::config::{
    apply_env_overrides, load_default, load_file, AppConfig, CommandConfig, LoggingConfig,
    PlanDefaults,
};
pub use crate::error::{PlanError, TaskExecutionError, ValidationError};
pub use crate::executor::traits::{
    plan_for_goal, DecomposeConstraints, Decomposer, PlanObserver, RetryStrategy, TaskContext,
    TaskExecutor,
};
pub use crate::executor::types::{
    ConditionFn, GoalCondition, GoalState, MatchMode, PlanConfig, PlanMetrics, PlanResult,
    PlanStatus, RetryConfig, Strategy, SuccessCondition, Task, TaskKind, TaskMetadata,
    TaskOutput, TaskResult, TaskStatus, Timeline, TimelineEvent, TimelineEventKind,
};
pub use crate::executor::{
    execute_plan, ExecutionEngine, ExecutionEngineBuilder, Plan, PlanBuilder, ProgressMonitor,
    Schedule, TaskGraph,
};
