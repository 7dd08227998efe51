//! tsd - tasksync command line and daemon entry point

use std::fs;
use std::io::{BufRead, BufReader};
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, FromArgMatches};
use colored::*;
use eyre::{Context, Result};
use syncstore::{DataStore, ResourceType};
use tracing::{debug, error, info, warn};

use tasksync::cli::{Cli, Command, generate_after_help};
use tasksync::config::Config;
use tasksync::daemon::{DaemonManager, VERSION};
use tasksync::domain::{TaskRecord, TaskStatus};
use tasksync::ipc::{self, DaemonClient};
use tasksync::logging::{self, DAEMON_LOG, get_log_path};
use tasksync::remote::{HttpRemote, RemoteApi, pull_into};
use tasksync::server::{Daemon, DaemonSettings, LocalBackfill, TaskwarriorBackfill};

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Log level comes from the config file before the full load so the load itself is logged
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    let level = logging::resolve_level(cli.log_level.as_deref(), config_log_level.as_deref());
    logging::init(DAEMON_LOG, level).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(version = VERSION, "tasksync loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Start { foreground }) => cmd_start(&config, cli.config.as_deref(), foreground).await,
        Some(Command::Stop) => cmd_stop(&config).await,
        Some(Command::Status) | None => cmd_status(&config).await,
        Some(Command::Pull { full }) => cmd_pull(&config, full).await,
        Some(Command::Export {
            project,
            include_completed,
        }) => cmd_export(&config, project.as_deref(), include_completed),
        Some(Command::Logs { follow, lines }) => cmd_logs(follow, lines),
        Some(Command::RunDaemon) => cmd_run_daemon(&config).await,
    }
}

fn client_for(config: &Config) -> DaemonClient {
    DaemonClient::new(config.daemon.socket_path.clone()).with_timeout(config.daemon.connection_timeout())
}

/// Start the daemon
async fn cmd_start(config: &Config, config_path: Option<&std::path::Path>, foreground: bool) -> Result<()> {
    debug!(foreground, "cmd_start: called");
    let daemon = DaemonManager::with_pid_file(config.daemon.pid_file.clone());

    if let Some(pid) = daemon.running_pid() {
        println!("tasksync is already running (PID: {})", pid);
        return Ok(());
    }

    if foreground {
        println!("Starting tasksync in foreground mode...");
        cmd_run_daemon(config).await
    } else {
        let pid = daemon.start(config_path)?;
        println!("tasksync started (PID: {})", pid);
        Ok(())
    }
}

/// Stop the daemon
///
/// Asks over IPC first so the pending batch is flushed, falls back to SIGTERM.
async fn cmd_stop(config: &Config) -> Result<()> {
    debug!("cmd_stop: called");
    let daemon = DaemonManager::with_pid_file(config.daemon.pid_file.clone());

    let Some(pid) = daemon.running_pid() else {
        println!("tasksync is not running");
        return Ok(());
    };

    let client = client_for(config);
    if client.socket_exists() {
        match client.stop().await {
            Ok(_) => {
                // The final flush may take a full remote round trip
                let mut attempts = 0;
                while daemon.is_running() && attempts < 100 {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    attempts += 1;
                }
                if !daemon.is_running() {
                    println!("tasksync stopped gracefully (was PID: {})", pid);
                    return Ok(());
                }
                debug!("cmd_stop: IPC stop timed out, falling back to SIGTERM");
            }
            Err(e) => {
                debug!(error = %e, "cmd_stop: IPC stop failed, falling back to SIGTERM");
            }
        }
    }

    daemon.stop()?;
    println!("tasksync stopped (was PID: {})", pid);
    Ok(())
}

/// Report whether the daemon is up, preferring a live IPC answer over the PID file
async fn cmd_status(config: &Config) -> Result<()> {
    debug!("cmd_status: called");
    match client_for(config).status().await {
        Ok(pid) => {
            println!("tasksync is {} (PID: {})", "running".green(), pid);
        }
        Err(e) => {
            debug!(error = %e, "cmd_status: IPC status failed");
            let daemon = DaemonManager::with_pid_file(config.daemon.pid_file.clone());
            match daemon.running_pid() {
                Some(pid) => println!("tasksync is {} (PID: {}) but not answering: {}", "stuck".yellow(), pid, e),
                None => println!("tasksync is {}", "stopped".red()),
            }
        }
    }
    println!("Socket: {}", config.daemon.socket_path.display());
    println!("Mirror: {}", config.storage.cache_dir.display());
    Ok(())
}

/// One-shot pull into the mirror; the daemon owns the mirror while it runs
async fn cmd_pull(config: &Config, full: bool) -> Result<()> {
    debug!(full, "cmd_pull: called");
    let daemon = DaemonManager::with_pid_file(config.daemon.pid_file.clone());
    if let Some(pid) = daemon.running_pid() {
        return Err(eyre::eyre!(
            "tasksync daemon is running (PID: {}); it keeps the mirror current",
            pid
        ));
    }

    let mut store = DataStore::open(&config.storage.cache_dir).context("Failed to open mirror")?;
    store.lock_exclusive().context("Failed to lock mirror")?;
    if full {
        store
            .reset_tokens(&ResourceType::ALL)
            .context("Failed to reset sync tokens")?;
    }

    let remote = HttpRemote::from_config(&config.remote)?;
    let summary = pull_into(&remote, &mut store, &ResourceType::ALL).await?;
    println!(
        "{} pull: {} items, {} projects, {} sections, {} labels",
        if summary.full { "Full" } else { "Incremental" },
        summary.items,
        summary.projects,
        summary.sections,
        summary.labels
    );
    Ok(())
}

/// Print mirrored items as task-database JSON lines
fn cmd_export(config: &Config, project: Option<&str>, include_completed: bool) -> Result<()> {
    debug!(?project, include_completed, "cmd_export: called");
    let store = DataStore::open(&config.storage.cache_dir).context("Failed to open mirror")?;
    let tz = config.local.resolve_timezone()?;

    let project_id = match project {
        Some(name) => Some(
            store
                .find_project(name)
                .map(|p| p.id.clone())
                .ok_or_else(|| eyre::eyre!("No project named '{}' in the mirror", name))?,
        ),
        None => None,
    };

    let mut exported = 0usize;
    for item in store.items() {
        if project_id.as_ref().is_some_and(|id| *id != item.project_id) {
            continue;
        }
        let task = match TaskRecord::from_remote(item, &store, tz) {
            Ok(task) => task,
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "Skipping unconvertible item");
                continue;
            }
        };
        if !include_completed && task.status != TaskStatus::Pending {
            continue;
        }
        println!("{}", task.to_json());
        exported += 1;
    }
    info!(exported, "Export complete");
    Ok(())
}

/// Show daemon logs
fn cmd_logs(follow: bool, lines: usize) -> Result<()> {
    debug!(follow, lines, "cmd_logs: called");
    let log_path = get_log_path();

    if !log_path.exists() {
        println!("No log file found at: {}", log_path.display());
        println!("The daemon may not have been started yet.");
        return Ok(());
    }

    if follow {
        println!("Following log file: {} (Ctrl+C to stop)", log_path.display());
        println!();

        let mut child = std::process::Command::new("tail")
            .args(["-f", "-n", &lines.to_string()])
            .arg(&log_path)
            .spawn()
            .context("Failed to run tail -f")?;

        child.wait()?;
    } else {
        let file = fs::File::open(&log_path).context("Failed to open log file")?;
        let reader = BufReader::new(file);
        let all_lines: Vec<String> = reader.lines().map_while(Result::ok).collect();

        let start = all_lines.len().saturating_sub(lines);
        for line in &all_lines[start..] {
            println!("{}", line);
        }
    }

    Ok(())
}

/// Run the daemon in this process (used by `start`)
async fn cmd_run_daemon(config: &Config) -> Result<()> {
    debug!("cmd_run_daemon: called");
    let manager = DaemonManager::with_pid_file(config.daemon.pid_file.clone());
    manager.register_self()?;

    let result = run_daemon(config).await;
    if let Err(e) = &result {
        error!(error = %e, "Daemon exited with error");
    }
    if let Err(e) = manager.unregister_self() {
        warn!(error = %e, "Failed to remove PID file");
    }
    result
}

async fn run_daemon(config: &Config) -> Result<()> {
    info!("Daemon starting...");

    let tz = config.local.resolve_timezone()?;
    let mut store = DataStore::open(&config.storage.cache_dir).context("Failed to open mirror")?;
    store.lock_exclusive().context("Another daemon owns the mirror")?;

    let remote: Arc<dyn RemoteApi> = Arc::new(HttpRemote::from_config(&config.remote)?);
    let backfill: Arc<dyn LocalBackfill> = Arc::new(TaskwarriorBackfill::new(&config.local.task_command));
    let settings = DaemonSettings::from_config(&config.daemon, tz);

    let (listener, socket_path) = ipc::create_listener_at(&config.daemon.socket_path)?;
    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);

    let signals = tokio::spawn(async move {
        if let Err(e) = wait_for_signal().await {
            error!(error = %e, "Failed to install signal handlers");
            return;
        }
        let _ = shutdown_tx.send(()).await;
    });

    let mut daemon = Daemon::new(settings, store, remote, backfill);
    let result = daemon.run(listener, shutdown_rx).await;

    signals.abort();
    ipc::cleanup_socket(&socket_path);
    info!("Daemon stopped");
    result
}

/// Resolve on the first SIGINT or SIGTERM
async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down...");
    }

    Ok(())
}
