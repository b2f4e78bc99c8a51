use std::sync::Arc;

use goalrun_core::api::{AppConfig, ExecutionEngine, PlanObserver, ProgressMonitor};
use goalrun_plugins::factory;
use tokio_util::sync::CancellationToken;

use super::cli::{OutputFormat, RunArgs};
use super::inspect::load_plan_builder;
use crate::error::{exit_code_for_status, CliError};

pub async fn run(args: RunArgs, cfg: &AppConfig) -> Result<i32, CliError> {
    let builder = load_plan_builder(&args.plan, cfg).await?;
    let plan = args.apply_overrides(builder).build()?;

    let mut observers: Vec<Arc<dyn PlanObserver>> = Vec::new();
    if let Some(renderer) = factory::build_renderer(args.format.as_str(), args.ascii) {
        observers.push(renderer);
    }
    if args.progress && args.format == OutputFormat::Text {
        observers.push(Arc::new(ProgressMonitor::new(atty::is(
            atty::Stream::Stderr,
        ))));
    }

    let engine = ExecutionEngine::builder(factory::build_executor(cfg))
        .observers(observers)
        .build();

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling plan");
                cancel.cancel();
            }
        })
    };

    let result = engine.execute_with_cancel(plan, cancel).await;
    ctrl_c.abort();
    let result = result?;

    if args.format == OutputFormat::Json {
        println!("{}", result.to_json_pretty()?);
    }
    if let Some(path) = &args.output {
        tokio::fs::write(path, result.to_json_pretty()?).await?;
        tracing::debug!(path = %path.display(), "result written");
    }

    Ok(exit_code_for_status(result.status))
}
