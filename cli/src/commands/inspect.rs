use goalrun_core::api::{AppConfig, Plan};
use goalrun_plugins::decomposer::PlanFile;
use serde_json::json;

use super::cli::{PlanArgs, ScheduleArgs};
use crate::error::CliError;

pub(crate) async fn load_plan_builder(
    args: &PlanArgs,
    cfg: &AppConfig,
) -> Result<goalrun_core::api::PlanBuilder, CliError> {
    let file = PlanFile::load(&args.plan)
        .await
        .map_err(|e| CliError::Config(e.to_string()))?;
    Ok(file.into_builder(&args.goal, &cfg.plan))
}

async fn load_plan(args: &PlanArgs, cfg: &AppConfig) -> Result<Plan, CliError> {
    Ok(load_plan_builder(args, cfg).await?.build()?)
}

pub async fn validate(args: PlanArgs, cfg: &AppConfig) -> Result<i32, CliError> {
    let plan = load_plan(&args, cfg).await?;
    let levels = plan.schedule()?.level_ids(plan.graph()).len();
    println!(
        "OK: {} tasks in {} levels ({})",
        plan.len(),
        levels,
        plan.strategy()
    );
    Ok(0)
}

pub async fn schedule(args: ScheduleArgs, cfg: &AppConfig) -> Result<i32, CliError> {
    let plan = load_plan(&args.plan, cfg).await?;
    let schedule = plan.schedule()?;
    let order = schedule.order_ids(plan.graph());
    let levels = schedule.level_ids(plan.graph());

    if args.json {
        let out = json!({
            "goal": plan.goal(),
            "strategy": plan.strategy(),
            "order": order,
            "levels": levels,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(0);
    }

    println!("goal: {}", plan.goal());
    println!("order: {}", order.join(" -> "));
    for (i, level) in levels.iter().enumerate() {
        println!("level {}: {}", i, level.join(", "));
    }
    Ok(0)
}
