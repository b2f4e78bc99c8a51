use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::PlanError;

use super::plan::Plan;
use super::run::{Interrupt, PlanRun, RunSetup};
use super::scheduler::Schedule;
use super::traits::{PlanObserver, TaskExecutor};
use super::types::{PlanResult, TimelineEventKind};

/// Runs validated plans against a task executor.
///
/// The engine holds no per-run state; each call to [`execute`](Self::execute)
/// owns its own run, so one engine can serve concurrent plans and nested
/// sub-plans.
pub struct ExecutionEngine {
    executor: Arc<dyn TaskExecutor>,
    observers: Vec<Arc<dyn PlanObserver>>,
    depth: usize,
}

pub struct ExecutionEngineBuilder {
    executor: Arc<dyn TaskExecutor>,
    observers: Vec<Arc<dyn PlanObserver>>,
    depth: usize,
}

impl ExecutionEngine {
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            executor,
            observers: Vec::new(),
            depth: 0,
        }
    }

    pub fn builder(executor: Arc<dyn TaskExecutor>) -> ExecutionEngineBuilder {
        ExecutionEngineBuilder::new(executor)
    }

    /// Nesting depth of plans run by this engine; 0 for top-level plans.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn executor(&self) -> &Arc<dyn TaskExecutor> {
        &self.executor
    }

    pub fn observers(&self) -> &[Arc<dyn PlanObserver>] {
        &self.observers
    }

    /// Execute a plan to completion.
    pub async fn execute(&self, plan: Plan) -> Result<PlanResult, PlanError> {
        self.execute_with_cancel(plan, CancellationToken::new())
            .await
    }

    /// Execute a plan, stopping early when `cancel` fires.
    ///
    /// Cancellation and plan timeout are reported through the result status,
    /// not as errors. Errors are reserved for defects: a violated scheduling
    /// invariant or a plan nested deeper than its `max_depth`.
    #[tracing::instrument(
        name = "plan.execute",
        skip_all,
        fields(goal = %plan.goal(), strategy = %plan.strategy(), tasks = plan.len(), depth = self.depth)
    )]
    pub async fn execute_with_cancel(
        &self,
        plan: Plan,
        cancel: CancellationToken,
    ) -> Result<PlanResult, PlanError> {
        let max_depth = plan.config().max_depth;
        if self.depth > max_depth {
            return Err(PlanError::DepthExceeded {
                depth: self.depth,
                max_depth,
            });
        }

        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let (goal, graph, strategy, goal_state, config) = plan.into_parts();
        let config = Arc::new(config);

        let schedule = Schedule::compute(&graph)?;
        let levels = schedule.level_ids(&graph);
        let timeout = config.timeout();
        let grace = config.cancel_grace();

        tracing::info!(
            run_id = %run_id,
            levels = levels.len(),
            max_parallel = config.max_parallel,
            "plan start"
        );
        for observer in &self.observers {
            observer.on_plan_start(&run_id, &goal, &levels);
        }

        let run = PlanRun::new(RunSetup {
            run_id: &run_id,
            goal: &goal,
            graph: &graph,
            strategy,
            goal_state,
            config: config.clone(),
            depth: self.depth,
            executor: self.executor.as_ref(),
            observers: &self.observers,
            cancel: cancel.child_token(),
        });

        {
            let drive = run.drive(&schedule);
            tokio::pin!(drive);

            let deadline = async {
                match timeout {
                    Some(limit) => tokio::time::sleep(limit).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::pin!(deadline);

            let interrupt = tokio::select! {
                biased;
                _ = cancel.cancelled() => Some(Interrupt::Cancelled),
                _ = &mut deadline => Some(Interrupt::TimedOut),
                res = &mut drive => {
                    res?;
                    None
                }
            };

            if let Some(reason) = interrupt {
                run.interrupt(reason);
                match tokio::time::timeout(grace, &mut drive).await {
                    Ok(res) => res?,
                    Err(_) => tracing::warn!(
                        run_id = %run_id,
                        grace_ms = grace.as_millis() as u64,
                        "running tasks ignored cancellation; abandoning them"
                    ),
                }
            }
        }

        let finished = run.finish(started.elapsed());

        let result = PlanResult {
            run_id,
            goal,
            status: finished.status,
            matched_condition: finished.goal_state.matched_condition.clone(),
            early_terminated: finished.early_terminated,
            final_strategy: finished.final_strategy,
            tasks: finished.tasks,
            metrics: finished.metrics,
            timeline: finished.timeline,
            goal_state: finished.goal_state,
            levels,
        };

        tracing::info!(
            run_id = %result.run_id,
            status = %result.status,
            succeeded = result.metrics.succeeded,
            failed = result.metrics.failed,
            skipped = result.metrics.skipped,
            switches = result.timeline.of_kind(TimelineEventKind::StrategySwitched).count(),
            duration_ms = result.metrics.total_duration_ms,
            "plan end"
        );
        for observer in &self.observers {
            observer.on_plan_end(&result);
        }

        Ok(result)
    }
}

impl ExecutionEngineBuilder {
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            executor,
            observers: Vec::new(),
            depth: 0,
        }
    }

    pub fn observer(mut self, observer: Arc<dyn PlanObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn observers(mut self, observers: impl IntoIterator<Item = Arc<dyn PlanObserver>>) -> Self {
        self.observers.extend(observers);
        self
    }

    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn build(self) -> ExecutionEngine {
        ExecutionEngine {
            executor: self.executor,
            observers: self.observers,
            depth: self.depth,
        }
    }
}

/// Execute a plan with a bare engine.
///
/// Shorthand for callers that need neither observers nor cancellation.
pub async fn execute_plan(
    plan: Plan,
    executor: Arc<dyn TaskExecutor>,
) -> Result<PlanResult, PlanError> {
    ExecutionEngine::new(executor).execute(plan).await
}
