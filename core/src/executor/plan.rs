use std::time::Duration;

use crate::error::{PlanError, ValidationError};

use super::graph::{GraphLimits, TaskGraph};
use super::scheduler::Schedule;
use super::types::{GoalState, PlanConfig, Strategy, SuccessCondition, Task};

/// A validated plan: task graph, goal, strategy and limits.
///
/// Only `PlanBuilder::build` creates one, so holding a `Plan` means the graph
/// passed validation. The topology cannot change afterwards.
#[derive(Debug, Clone)]
pub struct Plan {
    goal: String,
    graph: TaskGraph,
    strategy: Strategy,
    goal_state: GoalState,
    config: PlanConfig,
}

impl Plan {
    pub fn builder(goal: impl Into<String>) -> PlanBuilder {
        PlanBuilder::new(goal)
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn goal_state(&self) -> &GoalState {
        &self.goal_state
    }

    pub fn config(&self) -> &PlanConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Re-run every validation check. Reads only; repeated calls agree.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.config.validate()?;
        self.goal_state.validate()?;
        let tasks = self.graph.tasks().iter().map(Task::definition).collect();
        TaskGraph::build(tasks, limits(&self.config)).map(|_| ())
    }

    pub fn schedule(&self) -> Result<Schedule, PlanError> {
        Schedule::compute(&self.graph)
    }

    pub(crate) fn into_parts(self) -> (String, TaskGraph, Strategy, GoalState, PlanConfig) {
        (
            self.goal,
            self.graph,
            self.strategy,
            self.goal_state,
            self.config,
        )
    }
}

fn limits(config: &PlanConfig) -> GraphLimits {
    GraphLimits {
        max_depth: config.max_depth,
        max_subtasks: config.max_subtasks,
    }
}

/// Builder-style plan construction; nothing is checked until `build`.
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    goal: String,
    tasks: Vec<Task>,
    edges: Vec<(String, String)>,
    strategy: Strategy,
    goal_state: GoalState,
    config: PlanConfig,
}

impl PlanBuilder {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            tasks: Vec::new(),
            edges: Vec::new(),
            strategy: Strategy::default(),
            goal_state: GoalState::default(),
            config: PlanConfig::default(),
        }
    }

    pub fn task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn tasks(mut self, tasks: impl IntoIterator<Item = Task>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    pub fn add_task(self, id: impl Into<String>, description: impl Into<String>) -> Self {
        self.task(Task::new(id, description))
    }

    /// Declare that `task` waits for `depends_on`.
    pub fn add_dependency(
        mut self,
        task: impl Into<String>,
        depends_on: impl Into<String>,
    ) -> Self {
        self.edges.push((task.into(), depends_on.into()));
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn config(mut self, config: PlanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_parallel(mut self, n: usize) -> Self {
        self.config.max_parallel = n;
        self
    }

    pub fn max_depth(mut self, n: usize) -> Self {
        self.config.max_depth = n;
        self
    }

    pub fn max_subtasks(mut self, n: usize) -> Self {
        self.config.max_subtasks = n;
        self
    }

    pub fn adaptive_threshold(mut self, threshold: f64) -> Self {
        self.config.adaptive_threshold = threshold;
        self
    }

    pub fn goal_check_interval(mut self, n: usize) -> Self {
        self.config.goal_check_interval = n;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn cancel_grace(mut self, grace: Duration) -> Self {
        self.config.cancel_grace_ms = grace.as_millis() as u64;
        self
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.config.fail_fast = fail_fast;
        self
    }

    pub fn goal_state(mut self, goal_state: GoalState) -> Self {
        self.goal_state = goal_state;
        self
    }

    pub fn condition(mut self, name: impl Into<String>, condition: SuccessCondition) -> Self {
        self.goal_state = self.goal_state.with_condition(name, condition);
        self
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn config_mut(&mut self) -> &mut PlanConfig {
        &mut self.config
    }

    /// Validate everything and produce an executable plan.
    pub fn build(self) -> Result<Plan, ValidationError> {
        self.config.validate()?;
        let mut goal_state = self.goal_state;
        goal_state.compile()?;

        let mut tasks: Vec<Task> = self.tasks.iter().map(Task::definition).collect();
        for (task_id, dep) in self.edges {
            let task = tasks
                .iter_mut()
                .find(|t| t.id == task_id)
                .ok_or_else(|| ValidationError::UnknownTask(task_id.clone()))?;
            if !task.dependencies.contains(&dep) {
                task.dependencies.push(dep);
            }
        }

        let graph = TaskGraph::build(tasks, limits(&self.config))?;

        goal_state.satisfied = false;
        goal_state.matched_condition = None;

        Ok(Plan {
            goal: self.goal,
            graph,
            strategy: self.strategy,
            goal_state,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_wires_dependencies() {
        let plan = Plan::builder("ship it")
            .add_task("a", "first")
            .add_task("b", "second")
            .add_dependency("b", "a")
            .add_dependency("b", "a")
            .strategy(Strategy::Sequential)
            .max_parallel(2)
            .build()
            .unwrap();

        assert_eq!(plan.goal(), "ship it");
        assert_eq!(plan.strategy(), Strategy::Sequential);
        assert_eq!(plan.graph().get("b").unwrap().dependencies, vec!["a"]);
        assert_eq!(plan.config().max_parallel, 2);
    }

    #[test]
    fn dependency_on_unknown_task_is_rejected() {
        let err = Plan::builder("g")
            .add_task("a", "a")
            .add_dependency("nope", "a")
            .build()
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownTask("nope".into()));
    }

    #[test]
    fn build_resets_run_fields() {
        let mut task = Task::new("a", "a");
        task.status = crate::executor::types::TaskStatus::Succeeded;
        let plan = Plan::builder("g").task(task).build().unwrap();
        assert_eq!(
            plan.graph().task(0).status,
            crate::executor::types::TaskStatus::Pending
        );
    }

    #[test]
    fn invalid_config_fails_build() {
        let err = Plan::builder("g").max_parallel(0).build().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidConfig(_)));
    }

    #[test]
    fn build_compiles_output_patterns_once() {
        let plan = Plan::builder("g")
            .add_task("a", "a")
            .condition(
                "rows",
                SuccessCondition::output_matches(Some("a".into()), r"rows=\d+"),
            )
            .build()
            .unwrap();

        let condition = &plan.goal_state().conditions[0].condition;
        assert!(matches!(
            condition,
            SuccessCondition::OutputMatches {
                compiled: Some(_),
                ..
            }
        ));
        let results = [crate::executor::types::TaskResult::succeeded(
            "a",
            crate::executor::types::TaskOutput::text("rows=3"),
            0,
        )];
        assert!(crate::executor::goal::is_met(condition, &results));
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn bad_output_pattern_fails_build() {
        let err = Plan::builder("g")
            .add_task("a", "a")
            .condition("bad", SuccessCondition::output_matches(None, "(x"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidCondition { .. }));
    }
}
