//! CLI command definitions and subcommands

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::config::DaemonConfig;
use crate::daemon::{DaemonManager, VERSION};
use crate::logging::get_log_path;

/// tasksync - keeps the local task database and the remote task service in step
#[derive(Parser)]
#[command(
    name = "tsd",
    about = "Batching sync daemon between the local task database and the remote task service",
    version = VERSION,
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the sync daemon
    Start {
        /// Run in the foreground instead of detaching
        #[arg(short, long)]
        foreground: bool,
    },

    /// Stop the sync daemon, flushing pending changes first
    Stop,

    /// Show whether the daemon is running
    Status,

    /// Pull remote state into the local mirror (daemon must be stopped)
    Pull {
        /// Discard sync tokens and fetch everything
        #[arg(long)]
        full: bool,
    },

    /// Print mirrored remote tasks as task-database JSON, one per line
    Export {
        /// Only tasks in this project
        #[arg(short, long)]
        project: Option<String>,

        /// Include completed and deleted tasks
        #[arg(short = 'a', long = "all")]
        include_completed: bool,
    },

    /// Show daemon logs
    Logs {
        /// Follow log output (like tail -f)
        #[arg(short, long)]
        follow: bool,

        /// Number of lines to show
        #[arg(short, long, default_value = "50")]
        lines: usize,
    },

    /// Internal: Run as daemon process (used by `start`)
    #[command(hide = true)]
    RunDaemon,
}

/// Help footer with daemon status and the log location
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let daemon = DaemonManager::with_pid_file(DaemonConfig::default().pid_file);
    let (icon, status) = match daemon.running_pid() {
        Some(pid) => ("\u{2705}", format!("running (PID: {})", pid)),
        None => ("\u{274C}", "stopped".to_string()),
    };

    let mut help = String::new();
    help.push_str("Daemon:\n");
    help.push_str(&format!("  {} {}\n", icon, status));
    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));
    help
}
