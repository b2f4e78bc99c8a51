use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde_json::json;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{PlanError, TaskExecutionError};

use super::gate::ConcurrencyGate;
use super::goal;
use super::graph::TaskGraph;
use super::perf::{LevelMeasurement, PerformanceTracker};
use super::scheduler::Schedule;
use super::strategy::{Decision, DispatchMode, StrategySelector};
use super::traits::{PlanObserver, TaskContext, TaskExecutor};
use super::types::{
    GoalState, PlanConfig, PlanMetrics, PlanStatus, Strategy, Task, TaskOutput, TaskResult,
    TaskStatus, Timeline, TimelineEvent, TimelineEventKind,
};

/// Why a run was stopped from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interrupt {
    Cancelled,
    TimedOut,
}

/// Why dispatching stopped before the schedule was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Halt {
    GoalMet,
    FailFast,
    Interrupted,
}

impl Halt {
    fn reason(self) -> &'static str {
        match self {
            Self::GoalMet => "goal met",
            Self::FailFast => "an earlier task failed (fail_fast)",
            Self::Interrupted => "plan interrupted",
        }
    }
}

#[derive(Debug, Default)]
struct TaskRecord {
    status: TaskStatus,
    result: Option<TaskResult>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

/// Mutable run state, guarded by one mutex.
#[derive(Debug)]
struct RunState {
    records: Vec<TaskRecord>,
    timeline: Timeline,
    /// Tasks that reached Succeeded or Failed.
    completed: usize,
    next_goal_check: usize,
    goal: GoalState,
    halt: Option<Halt>,
    interrupt: Option<Interrupt>,
    /// Dispatch mode after the last adaptive switch.
    switched_to: Option<DispatchMode>,
}

impl RunState {
    fn transition(
        &mut self,
        graph: &TaskGraph,
        idx: usize,
        next: TaskStatus,
    ) -> Result<(), PlanError> {
        let record = &mut self.records[idx];
        if !record.status.can_transition_to(next) {
            return Err(PlanError::InvalidTransition {
                task_id: graph.id(idx).to_string(),
                from: record.status.as_str(),
                to: next.as_str(),
            });
        }
        record.status = next;
        Ok(())
    }

    fn push(
        &mut self,
        kind: TimelineEventKind,
        task_id: Option<&str>,
        payload: serde_json::Value,
    ) -> TimelineEvent {
        let event = TimelineEvent::new(kind, task_id, payload);
        self.timeline.push(event.clone());
        event
    }

    fn results(&self) -> Vec<TaskResult> {
        self.records
            .iter()
            .filter_map(|r| r.result.clone())
            .collect()
    }
}

/// Everything a run needs that outlives it.
pub(crate) struct RunSetup<'a> {
    pub run_id: &'a str,
    pub goal: &'a str,
    pub graph: &'a TaskGraph,
    pub strategy: Strategy,
    pub goal_state: GoalState,
    pub config: Arc<PlanConfig>,
    pub depth: usize,
    pub executor: &'a dyn TaskExecutor,
    pub observers: &'a [Arc<dyn PlanObserver>],
    pub cancel: CancellationToken,
}

/// One execution of one plan: the sole writer of its run state.
pub(crate) struct PlanRun<'a> {
    run_id: &'a str,
    goal: &'a str,
    graph: &'a TaskGraph,
    strategy: Strategy,
    config: Arc<PlanConfig>,
    depth: usize,
    executor: &'a dyn TaskExecutor,
    observers: &'a [Arc<dyn PlanObserver>],
    state: Mutex<RunState>,
    tracker: PerformanceTracker,
    gate: ConcurrencyGate,
    /// Handed to tasks; fires on cancellation or timeout.
    cancel: CancellationToken,
    /// Stops new dispatch without touching running tasks.
    halt: CancellationToken,
}

/// Run state after the dispatch loop has ended.
pub(crate) struct FinishedRun {
    pub status: PlanStatus,
    pub tasks: Vec<Task>,
    pub timeline: Timeline,
    pub goal_state: GoalState,
    pub early_terminated: bool,
    pub final_strategy: Strategy,
    pub metrics: PlanMetrics,
}

impl<'a> PlanRun<'a> {
    pub fn new(setup: RunSetup<'a>) -> Self {
        let records = (0..setup.graph.len())
            .map(|_| TaskRecord::default())
            .collect();
        let interval = setup.config.goal_check_interval;

        Self {
            run_id: setup.run_id,
            goal: setup.goal,
            graph: setup.graph,
            strategy: setup.strategy,
            gate: ConcurrencyGate::new(setup.config.max_parallel),
            config: setup.config,
            depth: setup.depth,
            executor: setup.executor,
            observers: setup.observers,
            state: Mutex::new(RunState {
                records,
                timeline: Timeline::new(),
                completed: 0,
                next_goal_check: interval,
                goal: setup.goal_state,
                halt: None,
                interrupt: None,
                switched_to: None,
            }),
            tracker: PerformanceTracker::new(),
            cancel: setup.cancel,
            halt: CancellationToken::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, events: &[TimelineEvent]) {
        for event in events {
            for observer in self.observers {
                observer.on_event(self.run_id, event);
            }
        }
    }

    /// Dispatch the whole schedule under the plan's strategy.
    pub async fn drive(&self, schedule: &Schedule) -> Result<(), PlanError> {
        match self.strategy {
            Strategy::Sequential => {
                for &idx in &schedule.order {
                    self.run_task(idx).await?;
                    self.check_goal();
                }
            }
            Strategy::Parallel => {
                for (level_id, level) in schedule.levels.iter().enumerate() {
                    self.run_measured_level(level_id, level, DispatchMode::Parallel)
                        .await?;
                }
            }
            Strategy::Adaptive => {
                let mut selector = StrategySelector::new(
                    self.config.adaptive_threshold,
                    self.config.adaptive_upgrade_windows,
                );
                // Read once per level boundary, never while a level is in flight.
                let mut mode = DispatchMode::Parallel;
                for (level_id, level) in schedule.levels.iter().enumerate() {
                    let Some(window) = self.run_measured_level(level_id, level, mode).await?
                    else {
                        continue;
                    };
                    if let Decision::SwitchTo(next) = selector.decide(mode, &window) {
                        let score = selector.last_score().unwrap_or(window.efficiency);
                        self.record_switch(level_id, mode, next, &window, score);
                        mode = next;
                    }
                }
            }
        }
        Ok(())
    }

    async fn run_measured_level(
        &self,
        level_id: usize,
        level: &[usize],
        mode: DispatchMode,
    ) -> Result<Option<LevelMeasurement>, PlanError> {
        let slots = match mode {
            DispatchMode::Parallel => self.gate.limit().min(level.len()),
            DispatchMode::Sequential => 1,
        };
        tracing::debug!(
            run_id = self.run_id,
            level = level_id,
            tasks = level.len(),
            mode = mode.as_str(),
            "level start"
        );

        self.tracker.begin_level(slots);
        self.run_level(level, mode).await?;
        let window = self.tracker.end_level();

        if let Some(w) = &window {
            tracing::debug!(
                run_id = self.run_id,
                level = level_id,
                ran = w.tasks,
                efficiency = w.efficiency,
                wall_ms = w.wall.as_millis() as u64,
                "level end"
            );
        }
        Ok(window)
    }

    async fn run_level(&self, level: &[usize], mode: DispatchMode) -> Result<(), PlanError> {
        match mode {
            DispatchMode::Sequential => {
                for &idx in level {
                    self.run_task(idx).await?;
                    self.check_goal();
                }
            }
            DispatchMode::Parallel => {
                // Polled in push order, and the gate is FIFO, so permits go out
                // in declaration order.
                let mut futs: FuturesUnordered<_> =
                    level.iter().map(|&idx| self.run_task(idx)).collect();
                while let Some(res) = futs.next().await {
                    res?;
                    self.check_goal();
                }
            }
        }
        Ok(())
    }

    fn record_switch(
        &self,
        level_id: usize,
        from: DispatchMode,
        to: DispatchMode,
        window: &LevelMeasurement,
        score: f64,
    ) {
        tracing::info!(
            run_id = self.run_id,
            after_level = level_id,
            from = from.as_str(),
            to = to.as_str(),
            efficiency = window.efficiency,
            score,
            threshold = self.config.adaptive_threshold,
            "adaptive strategy switch"
        );
        let payload = json!({
            "from": from.as_str(),
            "to": to.as_str(),
            "after_level": level_id,
            "efficiency": window.efficiency,
            "score": score,
            "threshold": self.config.adaptive_threshold,
        });
        let event = {
            let mut st = self.lock();
            st.switched_to = Some(to);
            st.push(TimelineEventKind::StrategySwitched, None, payload)
        };
        self.notify(&[event]);
    }

    /// Why `idx` must not run, if anything. Errors if a dependency is still
    /// unfinished, which the schedule rules out.
    fn blocked_reason(&self, st: &RunState, idx: usize) -> Result<Option<String>, PlanError> {
        if let Some(halt) = st.halt {
            return Ok(Some(format!("not started: {}", halt.reason())));
        }
        for &dep in self.graph.dependencies(idx) {
            let status = st.records[dep].status;
            if !status.is_terminal() {
                return Err(PlanError::SchedulerInvariant(format!(
                    "task '{}' dispatched while dependency '{}' is {}",
                    self.graph.id(idx),
                    self.graph.id(dep),
                    status
                )));
            }
            if status != TaskStatus::Succeeded {
                return Ok(Some(format!(
                    "dependency '{}' {}",
                    self.graph.id(dep),
                    status
                )));
            }
        }
        Ok(None)
    }

    fn skip(&self, st: &mut RunState, idx: usize, reason: &str) -> Result<TimelineEvent, PlanError> {
        st.transition(self.graph, idx, TaskStatus::Skipped)?;
        st.records[idx].ended_at = Some(Utc::now());
        tracing::debug!(run_id = self.run_id, task_id = self.graph.id(idx), reason, "task skipped");
        Ok(st.push(
            TimelineEventKind::TaskSkipped,
            Some(self.graph.id(idx)),
            json!({ "reason": reason }),
        ))
    }

    async fn run_task(&self, idx: usize) -> Result<(), PlanError> {
        let task = self.graph.task(idx);

        let skipped = {
            let mut st = self.lock();
            match self.blocked_reason(&st, idx)? {
                Some(reason) => Some(self.skip(&mut st, idx, &reason)?),
                None => {
                    st.transition(self.graph, idx, TaskStatus::Ready)?;
                    None
                }
            }
        };
        if let Some(event) = skipped {
            self.notify(&[event]);
            return Ok(());
        }

        let permit = tokio::select! {
            biased;
            _ = self.halt.cancelled() => {
                let event = {
                    let mut st = self.lock();
                    let reason = format!(
                        "not started: {}",
                        st.halt.unwrap_or(Halt::Interrupted).reason()
                    );
                    self.skip(&mut st, idx, &reason)?
                };
                self.notify(&[event]);
                return Ok(());
            }
            permit = self.gate.acquire() => permit?,
        };

        let (ctx, event) = {
            let mut st = self.lock();
            st.transition(self.graph, idx, TaskStatus::Running)?;
            st.records[idx].started_at = Some(Utc::now());

            let dependency_results: HashMap<String, TaskResult> = self
                .graph
                .dependencies(idx)
                .iter()
                .filter_map(|&d| {
                    st.records[d]
                        .result
                        .clone()
                        .map(|r| (self.graph.id(d).to_string(), r))
                })
                .collect();

            let payload = json!({
                "concurrency": permit.concurrency_at_start,
                "depth": self.depth,
            });
            let event = st.push(TimelineEventKind::TaskStarted, Some(&task.id), payload);

            let ctx = TaskContext {
                run_id: self.run_id.to_string(),
                goal: self.goal.to_string(),
                depth: self.depth,
                cancel: self.cancel.child_token(),
                config: self.config.clone(),
                strategy: self.strategy,
                dependency_results,
            };
            (ctx, event)
        };
        self.notify(&[event]);
        tracing::debug!(
            run_id = self.run_id,
            task_id = %task.id,
            concurrency = permit.concurrency_at_start,
            "task started"
        );

        let started = Instant::now();
        let outcome = self.invoke(&ctx, task).await;
        let elapsed = started.elapsed();

        self.tracker.record(elapsed, permit.concurrency_at_start);
        drop(permit);

        self.complete(idx, outcome, elapsed)
    }

    /// Call the executor with the task's own timeout, turning panics into
    /// task failures.
    async fn invoke(&self, ctx: &TaskContext, task: &Task) -> Result<TaskOutput, TaskExecutionError> {
        let guarded = async {
            match AssertUnwindSafe(self.executor.execute(ctx, task))
                .catch_unwind()
                .await
            {
                Ok(res) => res,
                Err(payload) => Err(TaskExecutionError::Panicked(panic_message(payload.as_ref()))),
            }
        };

        match task.metadata.timeout_ms {
            Some(ms) => {
                let limit = Duration::from_millis(ms);
                match tokio::time::timeout(limit, guarded).await {
                    Ok(res) => res,
                    Err(_) => Err(TaskExecutionError::Timeout(limit)),
                }
            }
            None => guarded.await,
        }
    }

    fn complete(
        &self,
        idx: usize,
        outcome: Result<TaskOutput, TaskExecutionError>,
        elapsed: Duration,
    ) -> Result<(), PlanError> {
        let task_id = self.graph.id(idx);
        let duration_ms = elapsed.as_millis() as u64;

        let (status, result, kind, payload) = match outcome {
            Ok(output) => {
                let result = TaskResult::succeeded(task_id, output, duration_ms);
                let payload = json!({
                    "duration_ms": duration_ms,
                    "retries_used": result.retries_used,
                });
                tracing::debug!(run_id = self.run_id, task_id, duration_ms, "task succeeded");
                (TaskStatus::Succeeded, result, TimelineEventKind::TaskCompleted, payload)
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(run_id = self.run_id, task_id, duration_ms, error = %message, "task failed");
                let payload = json!({ "duration_ms": duration_ms, "error": message });
                (
                    TaskStatus::Failed,
                    TaskResult::failed(task_id, message, duration_ms),
                    TimelineEventKind::TaskFailed,
                    payload,
                )
            }
        };

        let mut halted = false;
        let event = {
            let mut st = self.lock();
            st.transition(self.graph, idx, status)?;
            let record = &mut st.records[idx];
            record.result = Some(result);
            record.ended_at = Some(Utc::now());
            st.completed += 1;

            if status == TaskStatus::Failed && self.config.fail_fast && st.halt.is_none() {
                st.halt = Some(Halt::FailFast);
                halted = true;
            }
            st.push(kind, Some(task_id), payload)
        };
        self.notify(&[event]);

        if halted {
            tracing::info!(run_id = self.run_id, task_id, "fail_fast: halting dispatch");
            self.halt.cancel();
        }
        Ok(())
    }

    /// Goal check at the single synchronization point of the dispatch loop.
    fn check_goal(&self) {
        let interval = self.config.goal_check_interval;
        if interval == 0 {
            return;
        }

        let (event, satisfied) = {
            let mut st = self.lock();
            if st.goal.is_empty() || st.halt.is_some() || st.completed < st.next_goal_check {
                return;
            }
            st.next_goal_check = st.completed + interval;

            let eval = goal::evaluate(&st.goal, &st.results());
            if eval.satisfied {
                st.goal.satisfied = true;
                st.goal.matched_condition = eval.matched_condition.clone();
                st.halt = Some(Halt::GoalMet);
            }
            let payload = json!({
                "satisfied": eval.satisfied,
                "matched_condition": eval.matched_condition,
                "completed": st.completed,
            });
            (
                st.push(TimelineEventKind::GoalChecked, None, payload),
                eval.satisfied,
            )
        };
        self.notify(&[event]);

        if satisfied {
            tracing::info!(run_id = self.run_id, "goal satisfied, halting dispatch");
            self.halt.cancel();
        }
    }

    /// Stop dispatching and signal running tasks to cancel.
    pub fn interrupt(&self, reason: Interrupt) {
        {
            let mut st = self.lock();
            st.interrupt = Some(reason);
            if st.halt.is_none() {
                st.halt = Some(Halt::Interrupted);
            }
        }
        tracing::warn!(run_id = self.run_id, reason = ?reason, "plan interrupted");
        self.halt.cancel();
        self.cancel.cancel();
    }

    /// Settle unfinished tasks, run the final goal check and compute the
    /// terminal status.
    pub fn finish(self, elapsed: Duration) -> FinishedRun {
        let peak = self.gate.peak();
        let snapshot = self.tracker.snapshot();
        let mut events = Vec::new();

        let mut st = self.state.into_inner().unwrap_or_else(PoisonError::into_inner);

        for idx in 0..st.records.len() {
            let status = st.records[idx].status;
            let task_id = self.graph.id(idx);
            match status {
                TaskStatus::Pending | TaskStatus::Ready => {
                    let reason = format!(
                        "not started: {}",
                        st.halt.unwrap_or(Halt::Interrupted).reason()
                    );
                    st.records[idx].status = TaskStatus::Skipped;
                    st.records[idx].ended_at = Some(Utc::now());
                    events.push(st.push(
                        TimelineEventKind::TaskSkipped,
                        Some(task_id),
                        json!({ "reason": reason }),
                    ));
                }
                TaskStatus::Running => {
                    let message = "cancelled before completion".to_string();
                    let started = st.records[idx].started_at;
                    let duration_ms = started
                        .map(|s| (Utc::now() - s).num_milliseconds().max(0) as u64)
                        .unwrap_or(0);
                    let record = &mut st.records[idx];
                    record.status = TaskStatus::Failed;
                    record.result = Some(TaskResult::failed(task_id, &message, duration_ms));
                    record.ended_at = Some(Utc::now());
                    events.push(st.push(
                        TimelineEventKind::TaskFailed,
                        Some(task_id),
                        json!({ "duration_ms": duration_ms, "error": message }),
                    ));
                }
                _ => {}
            }
        }

        let goal_met = st.halt == Some(Halt::GoalMet);
        if !goal_met && !st.goal.is_empty() {
            let eval = goal::evaluate(&st.goal, &st.results());
            st.goal.satisfied = eval.satisfied;
            st.goal.matched_condition = eval.matched_condition.clone();
            events.push(st.push(
                TimelineEventKind::GoalChecked,
                None,
                json!({
                    "satisfied": eval.satisfied,
                    "matched_condition": eval.matched_condition,
                    "completed": st.completed,
                    "final": true,
                }),
            ));
        }

        // `self.state` is moved out; reach the remaining fields directly.
        for event in &events {
            for observer in self.observers {
                observer.on_event(self.run_id, event);
            }
        }

        let count = |s: TaskStatus| st.records.iter().filter(|r| r.status == s).count();
        let succeeded = count(TaskStatus::Succeeded);
        let failed = count(TaskStatus::Failed);
        let skipped = count(TaskStatus::Skipped);
        let total = st.records.len();

        let status = if goal_met {
            PlanStatus::GoalMet
        } else if let Some(interrupt) = st.interrupt {
            match interrupt {
                Interrupt::Cancelled => PlanStatus::Cancelled,
                Interrupt::TimedOut => PlanStatus::TimedOut,
            }
        } else if failed == 0 && skipped == 0 {
            PlanStatus::Succeeded
        } else if st.halt == Some(Halt::FailFast) || failed == total {
            PlanStatus::Failed
        } else {
            PlanStatus::PartialSuccess
        };

        let metrics = PlanMetrics {
            tasks_per_sec: snapshot.tasks_per_sec,
            avg_latency_ms: snapshot.avg_latency.as_secs_f64() * 1000.0,
            parallel_efficiency: snapshot
                .mean_level_efficiency
                .unwrap_or(snapshot.parallel_efficiency),
            success_rate: if total == 0 {
                1.0
            } else {
                succeeded as f64 / total as f64
            },
            succeeded,
            failed,
            skipped,
            peak_concurrency: peak,
            total_duration_ms: elapsed.as_millis() as u64,
        };

        let final_strategy = match st.switched_to {
            Some(DispatchMode::Parallel) => Strategy::Parallel,
            Some(DispatchMode::Sequential) => Strategy::Sequential,
            None => self.strategy,
        };

        let tasks = self
            .graph
            .tasks()
            .iter()
            .zip(st.records)
            .map(|(def, record)| Task {
                status: record.status,
                result: record.result,
                started_at: record.started_at,
                ended_at: record.ended_at,
                ..def.definition()
            })
            .collect();

        FinishedRun {
            status,
            tasks,
            timeline: st.timeline,
            goal_state: st.goal,
            early_terminated: goal_met,
            final_strategy,
            metrics,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
