mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{ms, ScriptedExecutor};
use goalrun_core::api::{
    ExecutionEngine, Plan, PlanResult, PlanStatus, Strategy, Task, TaskContext,
    TaskExecutionError, TaskExecutor, TaskOutput, TimelineEventKind,
};
use pretty_assertions::assert_eq;

/// Levels [A, B] and [C, D], with A and B of unequal length so level 0
/// cannot reach full efficiency.
fn two_levels() -> Vec<Task> {
    vec![
        Task::new("A", "short"),
        Task::new("B", "long"),
        Task::new("C", "after A").depends_on("A"),
        Task::new("D", "after B").depends_on("B"),
    ]
}

fn executor() -> Arc<ScriptedExecutor> {
    Arc::new(
        ScriptedExecutor::new()
            .delay("A", ms(10))
            .delay("B", ms(30))
            .delay("C", ms(10))
            .delay("D", ms(10)),
    )
}

#[tokio::test(start_paused = true)]
async fn low_efficiency_downgrades_next_level_to_sequential() {
    let exec = executor();
    let plan = Plan::builder("adaptive")
        .strategy(Strategy::Adaptive)
        .max_parallel(2)
        .adaptive_threshold(1.0)
        .tasks(two_levels())
        .build()
        .unwrap();

    let result = ExecutionEngine::new(exec.clone()).execute(plan).await.unwrap();

    assert_eq!(result.status, PlanStatus::Succeeded);
    assert_eq!(result.final_strategy, Strategy::Sequential);

    let switches: Vec<_> = result
        .timeline
        .of_kind(TimelineEventKind::StrategySwitched)
        .collect();
    assert_eq!(switches.len(), 1);
    assert_eq!(switches[0].payload["from"], "parallel");
    assert_eq!(switches[0].payload["to"], "sequential");
    assert_eq!(switches[0].payload["after_level"], 0);

    // Level 1 ran one task at a time: C finished before D started.
    let events = result.timeline.events();
    let c_done = events
        .iter()
        .position(|e| e.kind == TimelineEventKind::TaskCompleted && e.task_id.as_deref() == Some("C"))
        .unwrap();
    let d_start = events
        .iter()
        .position(|e| e.kind == TimelineEventKind::TaskStarted && e.task_id.as_deref() == Some("D"))
        .unwrap();
    assert!(c_done < d_start);
}

#[tokio::test(start_paused = true)]
async fn efficient_levels_stay_parallel() {
    let exec = executor();
    let plan = Plan::builder("adaptive")
        .strategy(Strategy::Adaptive)
        .max_parallel(2)
        .adaptive_threshold(0.5)
        .tasks(two_levels())
        .build()
        .unwrap();

    let result = ExecutionEngine::new(exec.clone()).execute(plan).await.unwrap();

    assert_eq!(result.final_strategy, Strategy::Adaptive);
    assert_eq!(
        result.timeline.of_kind(TimelineEventKind::StrategySwitched).count(),
        0
    );
    assert_eq!(exec.max_concurrency(), 2);
    assert!(result.metrics.parallel_efficiency > 0.5);
}

#[tokio::test(start_paused = true)]
async fn plain_parallel_never_switches() {
    let exec = executor();
    let plan = Plan::builder("parallel")
        .strategy(Strategy::Parallel)
        .max_parallel(2)
        .adaptive_threshold(1.0)
        .tasks(two_levels())
        .build()
        .unwrap();

    let result = ExecutionEngine::new(exec).execute(plan).await.unwrap();

    assert_eq!(result.final_strategy, Strategy::Parallel);
    assert_eq!(
        result.timeline.of_kind(TimelineEventKind::StrategySwitched).count(),
        0
    );
}

/// `levels` levels of two tasks each: a{i} and b{i}, chained per letter.
fn paired_levels(levels: usize) -> Vec<Task> {
    (0..levels)
        .flat_map(|i| {
            ["a", "b"].into_iter().map(move |side| {
                let task = Task::new(format!("{side}{i}"), "step");
                if i == 0 {
                    task
                } else {
                    task.depends_on(format!("{side}{}", i - 1))
                }
            })
        })
        .collect()
}

fn switches(result: &PlanResult) -> Vec<(u64, String, String)> {
    result
        .timeline
        .of_kind(TimelineEventKind::StrategySwitched)
        .map(|e| {
            (
                e.payload["after_level"].as_u64().unwrap(),
                e.payload["from"].as_str().unwrap().to_string(),
                e.payload["to"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

fn position(result: &PlanResult, kind: TimelineEventKind, task: &str) -> usize {
    result
        .timeline
        .events()
        .iter()
        .position(|e| e.kind == kind && e.task_id.as_deref() == Some(task))
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn uncontended_work_goes_back_to_parallel() {
    // Level 0 is unbalanced (10ms vs 30ms) but nothing is contended; every
    // later task takes 20ms whether or not it runs alongside another.
    let exec = Arc::new(
        ScriptedExecutor::new()
            .default_delay(ms(20))
            .delay("a0", ms(10))
            .delay("b0", ms(30)),
    );
    let mut builder = Plan::builder("adaptive")
        .strategy(Strategy::Adaptive)
        .max_parallel(2)
        .adaptive_threshold(0.8)
        .tasks(paired_levels(4));
    builder.config_mut().adaptive_upgrade_windows = 2;
    let plan = builder.build().unwrap();

    let result = ExecutionEngine::new(exec).execute(plan).await.unwrap();

    assert_eq!(result.status, PlanStatus::Succeeded);
    assert_eq!(
        switches(&result),
        vec![
            (0, "parallel".to_string(), "sequential".to_string()),
            (2, "sequential".to_string(), "parallel".to_string()),
        ]
    );
    assert_eq!(result.final_strategy, Strategy::Parallel);

    // Level 3 overlapped again.
    assert!(
        position(&result, TimelineEventKind::TaskStarted, "b3")
            < position(&result, TimelineEventKind::TaskCompleted, "a3")
    );
}

/// Every task holds one shared lock for 10ms, so running two at once only
/// makes the second one wait.
struct SerializedExecutor {
    lock: tokio::sync::Mutex<()>,
}

#[async_trait]
impl TaskExecutor for SerializedExecutor {
    async fn execute(
        &self,
        _ctx: &TaskContext,
        task: &Task,
    ) -> Result<TaskOutput, TaskExecutionError> {
        let _held = self.lock.lock().await;
        tokio::time::sleep(ms(10)).await;
        Ok(TaskOutput::text(format!("{} done", task.id)))
    }
}

#[tokio::test(start_paused = true)]
async fn serialized_work_stays_sequential() {
    let exec = Arc::new(SerializedExecutor {
        lock: tokio::sync::Mutex::new(()),
    });
    let mut builder = Plan::builder("contended")
        .strategy(Strategy::Adaptive)
        .max_parallel(2)
        .adaptive_threshold(0.8)
        .tasks(paired_levels(9));
    builder.config_mut().adaptive_upgrade_windows = 1;
    let plan = builder.build().unwrap();

    let result = ExecutionEngine::new(exec).execute(plan).await.unwrap();

    assert_eq!(result.status, PlanStatus::Succeeded);
    assert_eq!(
        switches(&result),
        vec![(0, "parallel".to_string(), "sequential".to_string())]
    );
    assert_eq!(result.final_strategy, Strategy::Sequential);
}
