use std::path::{Path, PathBuf};

use async_trait::async_trait;
use goalrun_core::api::{
    DecomposeConstraints, Decomposer, GoalState, Plan, PlanBuilder, PlanConfig, PlanDefaults,
    PlanError, Strategy, Task,
};
use serde::{Deserialize, Serialize};

/// On-disk plan definition, JSON or TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanFile {
    #[serde(default)]
    pub goal: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<PlanConfig>,

    #[serde(default)]
    pub goal_state: GoalState,

    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl PlanFile {
    /// Parse `raw`; TOML when `path` ends in `.toml`, JSON otherwise.
    pub fn parse(path: &Path, raw: &str) -> anyhow::Result<Self> {
        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

        let file = if is_toml {
            toml::from_str(raw)?
        } else {
            serde_json::from_str(raw)?
        };
        Ok(file)
    }

    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("read plan {}: {}", path.display(), e))?;
        Self::parse(path, &raw).map_err(|e| anyhow::anyhow!("parse plan {}: {}", path.display(), e))
    }

    /// Builder for this plan; unset strategy and config come from `defaults`.
    pub fn into_builder(self, fallback_goal: &str, defaults: &PlanDefaults) -> PlanBuilder {
        let goal = if self.goal.trim().is_empty() {
            fallback_goal.to_string()
        } else {
            self.goal
        };

        Plan::builder(goal)
            .strategy(self.strategy.unwrap_or(defaults.strategy))
            .config(self.config.unwrap_or_else(|| defaults.config.clone()))
            .goal_state(self.goal_state)
            .tasks(self.tasks)
    }
}

/// Decomposer that reads a ready-made plan from disk instead of deriving one.
pub struct FileDecomposer {
    path: PathBuf,
    defaults: PlanDefaults,
}

impl FileDecomposer {
    pub fn new(path: impl Into<PathBuf>, defaults: PlanDefaults) -> Self {
        Self {
            path: path.into(),
            defaults,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Decomposer for FileDecomposer {
    fn name(&self) -> &str {
        "file"
    }

    async fn decompose(
        &self,
        goal: &str,
        _constraints: &DecomposeConstraints,
    ) -> Result<PlanBuilder, PlanError> {
        let file = PlanFile::load(&self.path)
            .await
            .map_err(|e| PlanError::Decompose(e.to_string()))?;

        tracing::debug!(path = %self.path.display(), tasks = file.tasks.len(), "loaded plan file");
        Ok(file.into_builder(goal, &self.defaults))
    }
}
