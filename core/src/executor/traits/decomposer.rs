use async_trait::async_trait;

use crate::error::PlanError;
use crate::executor::plan::{Plan, PlanBuilder};
use crate::executor::types::{PlanConfig, Strategy};

/// Limits a decomposer should respect when proposing tasks.
#[derive(Debug, Clone, Default)]
pub struct DecomposeConstraints {
    pub strategy: Option<Strategy>,
    pub config: Option<PlanConfig>,
    pub max_tasks: Option<usize>,
}

/// Turns a free-form goal into a candidate (unvalidated) plan.
#[async_trait]
pub trait Decomposer: Send + Sync {
    fn name(&self) -> &str;

    async fn decompose(
        &self,
        goal: &str,
        constraints: &DecomposeConstraints,
    ) -> Result<PlanBuilder, PlanError>;
}

/// Decompose a goal and validate the proposal.
///
/// Constraint overrides are applied on top of whatever the decomposer chose.
pub async fn plan_for_goal(
    decomposer: &dyn Decomposer,
    goal: &str,
    constraints: &DecomposeConstraints,
) -> Result<Plan, PlanError> {
    let mut builder = decomposer.decompose(goal, constraints).await?;

    if let Some(max) = constraints.max_tasks {
        if builder.task_count() > max {
            return Err(PlanError::Decompose(format!(
                "{} proposed {} tasks, limit is {}",
                decomposer.name(),
                builder.task_count(),
                max
            )));
        }
    }
    if let Some(strategy) = constraints.strategy {
        builder = builder.strategy(strategy);
    }
    if let Some(config) = constraints.config.clone() {
        builder = builder.config(config);
    }

    tracing::debug!(
        decomposer = decomposer.name(),
        tasks = builder.task_count(),
        "validating decomposed plan"
    );
    Ok(builder.build()?)
}
