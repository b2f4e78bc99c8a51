use goalrun_core::api::{PlanObserver, PlanResult, TimelineEvent, TimelineEventKind};

/// Prints one human-readable line per timeline event.
pub struct TextRenderer {
    ascii_only: bool,
}

impl TextRenderer {
    pub fn new(ascii_only: bool) -> Self {
        Self { ascii_only }
    }

    fn format_start(&self, run_id: &str, goal: &str, levels: &[Vec<String>]) -> String {
        let total: usize = levels.iter().map(Vec::len).sum();
        let mut out = format!(
            "RUN START {} (goal: {}, tasks: {}, levels: {})",
            run_id,
            goal,
            total,
            levels.len()
        );
        for (idx, level) in levels.iter().enumerate() {
            out.push_str(&format!("\n  level {}: {}", idx, level.join(", ")));
        }
        out
    }

    fn format_event(&self, run_id: &str, event: &TimelineEvent) -> String {
        let task = event.task_id.as_deref().unwrap_or("-");
        let field = |key: &str| event.payload.get(key).cloned().unwrap_or_default();

        match event.kind {
            TimelineEventKind::TaskStarted => format!(
                "TASK START {} (task {}, concurrency {})",
                run_id,
                task,
                field("concurrency")
            ),
            TimelineEventKind::TaskCompleted => format!(
                "TASK END {} (task {}, status {}, duration {}ms, retries {})",
                run_id,
                task,
                if self.ascii_only { "OK" } else { "SUCCESS" },
                field("duration_ms"),
                field("retries_used")
            ),
            TimelineEventKind::TaskFailed => format!(
                "TASK END {} (task {}, status {}, duration {}ms): {}",
                run_id,
                task,
                if self.ascii_only { "FAIL" } else { "FAILED" },
                field("duration_ms"),
                field("error").as_str().unwrap_or_default()
            ),
            TimelineEventKind::TaskSkipped => format!(
                "TASK SKIP {} (task {}): {}",
                run_id,
                task,
                field("reason").as_str().unwrap_or_default()
            ),
            TimelineEventKind::GoalChecked => format!(
                "GOAL CHECK {} (satisfied {}, completed {})",
                run_id,
                field("satisfied"),
                field("completed")
            ),
            TimelineEventKind::StrategySwitched => format!(
                "STRATEGY {} ({} -> {} after level {}, efficiency {:.2})",
                run_id,
                field("from").as_str().unwrap_or_default(),
                field("to").as_str().unwrap_or_default(),
                field("after_level"),
                field("efficiency").as_f64().unwrap_or_default()
            ),
        }
    }

    fn format_end(&self, result: &PlanResult) -> String {
        format!(
            "RUN END {} (status {}, succeeded {}, failed {}, skipped {}, duration {}ms, efficiency {:.2})",
            result.run_id,
            result.status,
            result.metrics.succeeded,
            result.metrics.failed,
            result.metrics.skipped,
            result.metrics.total_duration_ms,
            result.metrics.parallel_efficiency
        )
    }
}

impl PlanObserver for TextRenderer {
    fn name(&self) -> &str {
        "text-renderer"
    }

    fn on_plan_start(&self, run_id: &str, goal: &str, levels: &[Vec<String>]) {
        println!("{}", self.format_start(run_id, goal, levels));
    }

    fn on_event(&self, run_id: &str, event: &TimelineEvent) {
        println!("{}", self.format_event(run_id, event));
    }

    fn on_plan_end(&self, result: &PlanResult) {
        println!("{}", self.format_end(result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_renderer_task_failed() {
        let renderer = TextRenderer::new(true);
        let event = TimelineEvent::new(
            TimelineEventKind::TaskFailed,
            Some("task"),
            json!({ "duration_ms": 5, "error": "oops" }),
        );

        let line = renderer.format_event("run", &event);
        assert_eq!(line, "TASK END run (task task, status FAIL, duration 5ms): oops");
    }

    #[test]
    fn test_text_renderer_plan_start_lists_levels() {
        let renderer = TextRenderer::new(false);
        let levels = vec![vec!["a".to_string()], vec!["b".to_string(), "c".to_string()]];

        let out = renderer.format_start("run", "ship", &levels);
        assert!(out.starts_with("RUN START run (goal: ship, tasks: 3, levels: 2)"));
        assert!(out.contains("level 1: b, c"));
    }
}
