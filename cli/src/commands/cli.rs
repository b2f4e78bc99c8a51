use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use goalrun_core::api::{PlanBuilder, Strategy};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable lines per event.
    #[default]
    Text,
    /// One JSON object per event.
    Jsonl,
    /// Only the final result, pretty-printed.
    Json,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Jsonl => "jsonl",
            Self::Json => "json",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "goalrun", version, about = "Goal-oriented task plan runner")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of ~/.goalrun/config.toml or ./goalrun.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a plan file.
    Run(RunArgs),
    /// Check a plan file for structural errors without running it.
    Validate(PlanArgs),
    /// Print the execution order and dependency levels of a plan file.
    Schedule(ScheduleArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PlanArgs {
    /// Plan definition (.json or .toml).
    pub plan: PathBuf,

    /// Goal used when the plan file does not state one.
    #[arg(long, default_value = "")]
    pub goal: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ScheduleArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    /// Print the schedule as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    /// Override the plan's dispatch strategy.
    #[arg(long, value_parser = parse_strategy)]
    pub strategy: Option<Strategy>,

    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Overall plan timeout in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Evaluate the goal every N completed tasks.
    #[arg(long)]
    pub goal_check_interval: Option<usize>,

    /// Stop dispatching after the first task failure.
    #[arg(long)]
    pub fail_fast: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Show progress bars (text format only).
    #[arg(long)]
    pub progress: bool,

    /// Write the final result as JSON to this file.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Plain ASCII status markers instead of emoji.
    #[arg(long)]
    pub ascii: bool,
}

impl RunArgs {
    /// Apply command-line overrides; they win over the plan file and config.
    pub fn apply_overrides(&self, mut builder: PlanBuilder) -> PlanBuilder {
        if let Some(strategy) = self.strategy {
            builder = builder.strategy(strategy);
        }
        let config = builder.config_mut();
        if let Some(n) = self.max_parallel {
            config.max_parallel = n;
        }
        if let Some(ms) = self.timeout_ms {
            config.timeout_ms = Some(ms);
        }
        if let Some(n) = self.goal_check_interval {
            config.goal_check_interval = n;
        }
        if self.fail_fast {
            config.fail_fast = true;
        }
        builder
    }
}

fn parse_strategy(s: &str) -> Result<Strategy, String> {
    s.parse()
}
