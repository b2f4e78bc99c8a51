use serde::{Deserialize, Serialize};

use crate::executor::types::{PlanConfig, RetryConfig, Strategy};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub plan: PlanDefaults,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub command: CommandConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "goalrun_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

/// Defaults applied to plans that do not set their own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanDefaults {
    #[serde(default)]
    pub strategy: Strategy,

    #[serde(flatten)]
    pub config: PlanConfig,
}

/// How `CommandExecutor` runs a task's input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandConfig {
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Flag passing the command string to the shell.
    #[serde(default = "default_shell_arg")]
    pub shell_arg: String,

    /// Max bytes of stdout/stderr kept per task.
    #[serde(default = "default_capture_bytes")]
    pub capture_bytes: usize,
}

fn default_shell() -> String {
    if cfg!(windows) {
        "cmd".to_string()
    } else {
        "sh".to_string()
    }
}

fn default_shell_arg() -> String {
    if cfg!(windows) {
        "/C".to_string()
    } else {
        "-c".to_string()
    }
}

fn default_capture_bytes() -> usize {
    64 * 1024
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            shell_arg: default_shell_arg(),
            capture_bytes: default_capture_bytes(),
        }
    }
}
