use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Get the default goalrun data directory: ~/.goalrun
pub fn get_goalrun_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".goalrun"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.goalrun/config.toml (highest)
    let user_config = get_goalrun_data_dir()?.join("config.toml");

    // Priority 2: ./goalrun.toml (current directory)
    let local_config = Path::new("goalrun.toml");

    let mut cfg = if user_config.exists() {
        load_file(&user_config)?
    } else if local_config.exists() {
        load_file(local_config)?
    } else {
        AppConfig::default()
    };

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

pub fn load_file(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("read config {}: {}", path.display(), e))?;
    let cfg = toml::from_str::<AppConfig>(&s)
        .map_err(|e| anyhow::anyhow!("parse config {}: {}", path.display(), e))?;
    Ok(cfg)
}

/// Environment variable overrides (Priority 0: highest). Blank values are ignored.
pub fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("GOALRUN_STRATEGY") {
        cfg.plan.strategy = v
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("GOALRUN_STRATEGY: {}", e))?;
    }
    if let Some(v) = get("GOALRUN_MAX_PARALLEL") {
        let n: usize = v
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("GOALRUN_MAX_PARALLEL: not a number: {}", v))?;
        if n == 0 {
            anyhow::bail!("GOALRUN_MAX_PARALLEL must be at least 1");
        }
        cfg.plan.config.max_parallel = n;
    }
    if let Some(v) = get("GOALRUN_LOG_LEVEL") {
        cfg.logging.level = v;
    }

    Ok(())
}
