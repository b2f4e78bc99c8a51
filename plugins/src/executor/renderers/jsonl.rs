use chrono::Local;
use goalrun_core::api::{PlanObserver, PlanResult, TimelineEvent};
use serde_json::{json, Value};

/// Prints one JSON object per line for every timeline event.
///
/// Event types are `run.start`, `task.started`, `task.completed`,
/// `task.failed`, `task.skipped`, `goal.checked`, `strategy.switched` and
/// `run.end`.
pub struct JsonlRenderer {
    pretty_print: bool,
}

impl JsonlRenderer {
    pub fn new(pretty_print: bool) -> Self {
        Self { pretty_print }
    }

    fn start_to_json(&self, run_id: &str, goal: &str, levels: &[Vec<String>]) -> Value {
        let total_tasks: usize = levels.iter().map(Vec::len).sum();
        json!({
            "v": 1,
            "event_type": "run.start",
            "ts": Local::now().to_rfc3339(),
            "run_id": run_id,
            "metadata": {
                "goal": goal,
                "levels": levels,
                "total_tasks": total_tasks,
            }
        })
    }

    fn event_to_json(&self, run_id: &str, event: &TimelineEvent) -> Value {
        json!({
            "v": 1,
            "event_type": event.kind.as_str().replacen('_', ".", 1),
            "ts": event.timestamp.to_rfc3339(),
            "run_id": run_id,
            "task_id": event.task_id,
            "metadata": event.payload,
        })
    }

    fn end_to_json(&self, result: &PlanResult) -> Value {
        json!({
            "v": 1,
            "event_type": "run.end",
            "ts": Local::now().to_rfc3339(),
            "run_id": result.run_id,
            "metadata": {
                "status": result.status,
                "early_terminated": result.early_terminated,
                "final_strategy": result.final_strategy,
                "matched_condition": result.matched_condition,
                "metrics": result.metrics,
            }
        })
    }

    fn emit(&self, value: &Value) {
        if self.pretty_print {
            println!("{}", serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".into()));
        } else {
            println!("{}", serde_json::to_string(value).unwrap_or_else(|_| "{}".into()));
        }
    }
}

impl PlanObserver for JsonlRenderer {
    fn name(&self) -> &str {
        "jsonl-renderer"
    }

    fn on_plan_start(&self, run_id: &str, goal: &str, levels: &[Vec<String>]) {
        self.emit(&self.start_to_json(run_id, goal, levels));
    }

    fn on_event(&self, run_id: &str, event: &TimelineEvent) {
        self.emit(&self.event_to_json(run_id, event));
    }

    fn on_plan_end(&self, result: &PlanResult) {
        self.emit(&self.end_to_json(result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goalrun_core::api::TimelineEventKind;

    #[test]
    fn test_jsonl_renderer_event_type() {
        let renderer = JsonlRenderer::new(false);
        let levels = vec![vec!["a".to_string(), "b".to_string()]];

        let value = renderer.start_to_json("run", "goal", &levels);
        assert_eq!(value["event_type"], "run.start");
        assert_eq!(value["metadata"]["total_tasks"], 2);
    }

    #[test]
    fn test_jsonl_renderer_task_completed() {
        let renderer = JsonlRenderer::new(false);
        let event = TimelineEvent::new(
            TimelineEventKind::TaskCompleted,
            Some("task"),
            json!({ "duration_ms": 12, "retries_used": 1 }),
        );

        let value = renderer.event_to_json("run", &event);
        assert_eq!(value["event_type"], "task.completed");
        assert_eq!(value["task_id"], "task");
        assert_eq!(value["metadata"]["retries_used"], 1);
    }

    #[test]
    fn test_jsonl_renderer_strategy_switch() {
        let renderer = JsonlRenderer::new(false);
        let event = TimelineEvent::new(
            TimelineEventKind::StrategySwitched,
            None,
            json!({ "from": "parallel", "to": "sequential" }),
        );

        let value = renderer.event_to_json("run", &event);
        assert_eq!(value["event_type"], "strategy.switched");
        assert!(value["task_id"].is_null());
    }
}
