//! File-based tracing setup shared by the CLI, the daemon and the hooks
//!
//! Nothing is ever logged to stdout: the hooks' stdout belongs to the task
//! database and the daemon has none.

use std::fs;
use std::path::PathBuf;

use eyre::{Context, Result};
use tracing::{Level, debug, info};

pub const DAEMON_LOG: &str = "tasksync.log";
pub const HOOK_LOG: &str = "hooks.log";

pub fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tasksync")
        .join("logs")
}

/// Path of the daemon/CLI log file
pub fn get_log_path() -> PathBuf {
    log_dir().join(DAEMON_LOG)
}

/// Level from the CLI flag, else the config, else INFO
pub fn resolve_level(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Level {
    let Some(s) = cli_log_level.or(config_log_level) else {
        return Level::INFO;
    };
    match s.to_uppercase().as_str() {
        "TRACE" => Level::TRACE,
        "DEBUG" => Level::DEBUG,
        "INFO" => Level::INFO,
        "WARN" | "WARNING" => Level::WARN,
        "ERROR" => Level::ERROR,
        _ => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
            Level::INFO
        }
    }
}

/// Install a subscriber appending to `file_name` in the log directory
pub fn init(file_name: &str, level: Level) -> Result<()> {
    let dir = log_dir();
    fs::create_dir_all(&dir).context("Failed to create log directory")?;

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(file_name))
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to install log subscriber: {}", e))?;

    debug!(file_name, "logging::init: subscriber installed");
    info!("Logging initialized (level: {:?})", level);
    Ok(())
}
