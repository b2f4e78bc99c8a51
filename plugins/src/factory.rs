use std::sync::Arc;

use goalrun_core::api::{AppConfig, PlanObserver, RetryConfig, RetryStrategy, TaskExecutor};

use crate::executor::{
    CommandExecutor, ExponentialBackoff, JsonlRenderer, LinearRetry, RetryingExecutor,
    SubPlanExecutor, TextRenderer,
};

/// Retry policy from config; `None` when retries are disabled.
pub fn build_retry_strategy(cfg: &RetryConfig) -> Option<Arc<dyn RetryStrategy>> {
    if cfg.max_attempts <= 1 {
        return None;
    }
    match cfg.strategy.as_str() {
        "linear" => Some(Arc::new(LinearRetry::new(cfg.clone()))),
        // Anything else backs off exponentially.
        _ => Some(Arc::new(ExponentialBackoff::new(cfg.clone()))),
    }
}

/// The default executor stack: shell commands, retried per config, with
/// composite tasks run as nested plans.
pub fn build_executor(cfg: &AppConfig) -> Arc<dyn TaskExecutor> {
    build_executor_with(cfg, Arc::new(CommandExecutor::new(cfg.command.clone())))
}

/// Same stack as [`build_executor`] around a caller-supplied leaf executor.
pub fn build_executor_with(cfg: &AppConfig, leaf: Arc<dyn TaskExecutor>) -> Arc<dyn TaskExecutor> {
    let leaf = match build_retry_strategy(&cfg.retry) {
        Some(strategy) => Arc::new(RetryingExecutor::new(leaf, strategy)) as Arc<dyn TaskExecutor>,
        None => leaf,
    };
    Arc::new(SubPlanExecutor::new(leaf))
}

/// Live event renderer for an output format. `json` prints only the final
/// result, so it has none.
pub fn build_renderer(format: &str, ascii_only: bool) -> Option<Arc<dyn PlanObserver>> {
    match format {
        "jsonl" => Some(Arc::new(JsonlRenderer::new(false))),
        "json" => None,
        // Anything else renders as text.
        _ => Some(Arc::new(TextRenderer::new(ascii_only))),
    }
}
