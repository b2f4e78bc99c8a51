use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Dispatch strategy for a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One task at a time in topological order.
    Sequential,
    /// Level by level, each level fully concurrent up to `max_parallel`.
    #[default]
    Parallel,
    /// Parallel, falling back to sequential when parallelism does not pay off.
    Adaptive,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Adaptive => "adaptive",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" | "seq" => Ok(Self::Sequential),
            "parallel" | "par" => Ok(Self::Parallel),
            "adaptive" => Ok(Self::Adaptive),
            other => Err(format!("unknown strategy: {other}")),
        }
    }
}

/// Limits and knobs for one plan run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Maximum number of tasks running at once across the whole plan.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Maximum subtask nesting depth.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum subtasks directly under one task.
    #[serde(default = "default_max_subtasks")]
    pub max_subtasks: usize,

    /// Adaptive mode drops to sequential below this parallel efficiency.
    #[serde(default = "default_adaptive_threshold")]
    pub adaptive_threshold: f64,

    /// Consecutive favorable windows needed before adaptive mode goes parallel again.
    #[serde(default = "default_adaptive_upgrade_windows")]
    pub adaptive_upgrade_windows: usize,

    /// Check the goal after every N completed tasks; 0 disables early termination.
    #[serde(default)]
    pub goal_check_interval: usize,

    /// Whole-plan deadline in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// How long in-flight tasks get to wind down after cancellation.
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,

    /// Stop dispatching after the first task failure.
    #[serde(default)]
    pub fail_fast: bool,
}

fn default_max_parallel() -> usize {
    num_cpus::get().max(1)
}

fn default_max_depth() -> usize {
    3
}

fn default_max_subtasks() -> usize {
    16
}

fn default_adaptive_threshold() -> f64 {
    0.5
}

fn default_adaptive_upgrade_windows() -> usize {
    2
}

fn default_cancel_grace_ms() -> u64 {
    5_000
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            max_depth: default_max_depth(),
            max_subtasks: default_max_subtasks(),
            adaptive_threshold: default_adaptive_threshold(),
            adaptive_upgrade_windows: default_adaptive_upgrade_windows(),
            goal_check_interval: 0,
            timeout_ms: None,
            cancel_grace_ms: default_cancel_grace_ms(),
            fail_fast: false,
        }
    }
}

impl PlanConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if self.max_parallel == 0 {
            return Err(ValidationError::InvalidConfig(
                "max_parallel must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.adaptive_threshold) {
            return Err(ValidationError::InvalidConfig(format!(
                "adaptive_threshold must be within [0, 1], got {}",
                self.adaptive_threshold
            )));
        }
        if self.adaptive_upgrade_windows == 0 {
            return Err(ValidationError::InvalidConfig(
                "adaptive_upgrade_windows must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Retry behavior for task executors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// "exponential-backoff" or "linear".
    pub strategy: String,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Total attempts including the first; 1 disables retries.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: default_retry_strategy(),
            base_delay_ms: 100,
            max_delay_ms: 5000,
            max_attempts: 1,
        }
    }
}

fn default_retry_strategy() -> String {
    "exponential-backoff".to_string()
}
