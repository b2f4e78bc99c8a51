use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::traits::PlanObserver;
use super::types::{PlanResult, TimelineEvent, TimelineEventKind};

/// Visual progress monitor for plan execution
///
/// Shows an overall bar plus one spinner per running task. Registered with the
/// engine as an observer; a disabled monitor ignores every event.
pub struct ProgressMonitor {
    /// Multi-progress container
    multi: MultiProgress,
    /// Overall progress bar
    overall: ProgressBar,
    /// Per-task progress spinners
    task_bars: Mutex<HashMap<String, ProgressBar>>,
    /// Whether monitoring is enabled
    enabled: bool,
}

impl ProgressMonitor {
    /// Create a new progress monitor
    ///
    /// # Arguments
    ///
    /// * `enabled` - Whether to draw anything (disabled for jsonl/json output)
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self {
                multi: MultiProgress::new(),
                overall: ProgressBar::hidden(),
                task_bars: Mutex::new(HashMap::new()),
                enabled: false,
            };
        }

        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(0));

        overall.set_style(
            ProgressStyle::default_bar()
                .template(
                    "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tasks ({percent}%) {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░  "),
        );

        overall.set_message("Starting...");

        Self {
            multi,
            overall,
            task_bars: Mutex::new(HashMap::new()),
            enabled: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn start_task(&self, task_id: &str) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.set_message(format!("⏳ {}", task_id));
        bar.enable_steady_tick(Duration::from_millis(100));

        self.bars().insert(task_id.to_string(), bar);
    }

    fn end_task(&self, task_id: &str, icon: &str, detail: String) {
        if let Some(bar) = self.bars().remove(task_id) {
            bar.finish_with_message(format!("{} {} ({})", icon, task_id, detail));
        }
        self.overall.inc(1);
    }

    fn bars(&self) -> std::sync::MutexGuard<'_, HashMap<String, ProgressBar>> {
        self.task_bars.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PlanObserver for ProgressMonitor {
    fn name(&self) -> &str {
        "progress"
    }

    fn on_plan_start(&self, _run_id: &str, _goal: &str, levels: &[Vec<String>]) {
        if !self.enabled {
            return;
        }
        let total: usize = levels.iter().map(Vec::len).sum();
        self.overall.set_length(total as u64);
        self.overall
            .set_message(format!("{} levels", levels.len()));
    }

    fn on_event(&self, _run_id: &str, event: &TimelineEvent) {
        if !self.enabled {
            return;
        }
        let task_id = event.task_id.as_deref().unwrap_or_default();
        let duration_ms = event.payload.get("duration_ms").and_then(|v| v.as_u64());

        match event.kind {
            TimelineEventKind::TaskStarted => self.start_task(task_id),
            TimelineEventKind::TaskCompleted => {
                self.end_task(task_id, "✅", format!("{}ms", duration_ms.unwrap_or(0)))
            }
            TimelineEventKind::TaskFailed => {
                self.end_task(task_id, "❌", format!("{}ms", duration_ms.unwrap_or(0)))
            }
            TimelineEventKind::TaskSkipped => self.overall.inc(1),
            TimelineEventKind::StrategySwitched => {
                let to = event.payload.get("to").and_then(|v| v.as_str()).unwrap_or("?");
                self.overall.set_message(format!("switched to {}", to));
            }
            TimelineEventKind::GoalChecked => {}
        }
    }

    fn on_plan_end(&self, result: &PlanResult) {
        if !self.enabled {
            return;
        }
        let icon = if result.status.is_success() { "✅" } else { "❌" };
        self.overall
            .finish_with_message(format!("{} {}", icon, result.status));
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        // Ensure all spinners are cleaned up
        let bars = self.task_bars.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, bar) in bars.drain() {
            bar.finish_and_clear();
        }
    }
}
