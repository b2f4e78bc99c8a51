use crate::executor::types::{PlanResult, TimelineEvent};

/// Receives run events as they happen (progress bars, renderers, loggers).
///
/// Called from the engine outside its state lock, possibly from concurrently
/// completing tasks, so implementations synchronize internally.
pub trait PlanObserver: Send + Sync {
    fn name(&self) -> &str;

    fn on_plan_start(&self, _run_id: &str, _goal: &str, _levels: &[Vec<String>]) {}

    fn on_event(&self, run_id: &str, event: &TimelineEvent);

    fn on_plan_end(&self, _result: &PlanResult) {}
}
