use std::path::PathBuf;

use goalrun_cli::commands::cli::{OutputFormat, PlanArgs, RunArgs, ScheduleArgs};
use goalrun_cli::commands::{inspect, run};
use goalrun_cli::error::{exit_code_for_error, CliError};
use goalrun_core::api::AppConfig;
use pretty_assertions::assert_eq;

fn write_plan(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).unwrap();
    path
}

fn plan_args(plan: PathBuf) -> PlanArgs {
    PlanArgs {
        plan,
        goal: String::new(),
    }
}

fn run_args(plan: PathBuf) -> RunArgs {
    RunArgs {
        plan: plan_args(plan),
        strategy: None,
        max_parallel: None,
        timeout_ms: None,
        goal_check_interval: None,
        fail_fast: false,
        format: OutputFormat::Jsonl,
        progress: false,
        output: None,
        ascii: true,
    }
}

#[tokio::test]
async fn validate_accepts_well_formed_plan() {
    let dir = tempfile::tempdir().unwrap();
    let plan = write_plan(
        &dir,
        "plan.json",
        r#"{"goal":"g","tasks":[{"id":"a","description":"a"},{"id":"b","description":"b","dependencies":["a"]}]}"#,
    );

    let code = inspect::validate(plan_args(plan), &AppConfig::default())
        .await
        .unwrap();
    assert_eq!(code, 0);
}

#[tokio::test]
async fn validate_rejects_cycle_with_exit_12() {
    let dir = tempfile::tempdir().unwrap();
    let plan = write_plan(
        &dir,
        "plan.json",
        r#"{"goal":"g","tasks":[{"id":"a","description":"a","dependencies":["b"]},{"id":"b","description":"b","dependencies":["a"]}]}"#,
    );

    let err = inspect::validate(plan_args(plan), &AppConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Validation(_)));
    assert_eq!(exit_code_for_error(&err), 12);
}

#[tokio::test]
async fn missing_plan_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = inspect::validate(
        plan_args(dir.path().join("nope.json")),
        &AppConfig::default(),
    )
    .await
    .unwrap_err();
    assert_eq!(exit_code_for_error(&err), 11);
}

#[tokio::test]
async fn schedule_reads_toml_plans() {
    let dir = tempfile::tempdir().unwrap();
    let plan = write_plan(
        &dir,
        "plan.toml",
        r#"
goal = "g"

[[tasks]]
id = "a"
description = "a"

[[tasks]]
id = "b"
description = "b"
dependencies = ["a"]
"#,
    );

    let args = ScheduleArgs {
        plan: plan_args(plan),
        json: true,
    };
    let code = inspect::schedule(args, &AppConfig::default()).await.unwrap();
    assert_eq!(code, 0);
}

#[cfg(unix)]
#[tokio::test]
async fn run_maps_plan_status_to_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let ok = write_plan(
        &dir,
        "ok.json",
        r#"{"goal":"g","tasks":[{"id":"a","description":"a","input":"echo hi"}]}"#,
    );
    let partial = write_plan(
        &dir,
        "partial.json",
        r#"{"goal":"g","tasks":[{"id":"a","description":"a","input":"exit 3"},{"id":"b","description":"b","input":"echo ok"}]}"#,
    );
    let out = dir.path().join("result.json");

    let mut args = run_args(ok);
    args.output = Some(out.clone());
    let code = run::run(args, &AppConfig::default()).await.unwrap();
    assert_eq!(code, 0);

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written["status"], "succeeded");

    let code = run::run(run_args(partial), &AppConfig::default())
        .await
        .unwrap();
    assert_eq!(code, 1);
}
