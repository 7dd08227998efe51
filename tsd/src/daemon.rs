//! Daemon process management
//!
//! Handles spawning the background process, the PID file, and process control.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use eyre::{Context, Result};
use tracing::{debug, info, warn};

/// Crate version, reported by `tsd --version` and logged at daemon start
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long `stop` waits for a graceful exit before SIGKILL
const STOP_WAIT: Duration = Duration::from_secs(5);
const STOP_POLL: Duration = Duration::from_millis(100);

/// Daemon process manager
#[derive(Debug)]
pub struct DaemonManager {
    pid_file: PathBuf,
}

impl DaemonManager {
    pub fn with_pid_file(pid_file: PathBuf) -> Self {
        debug!(?pid_file, "DaemonManager::with_pid_file: called");
        Self { pid_file }
    }

    /// Check if a daemon is running
    pub fn is_running(&self) -> bool {
        self.running_pid().is_some()
    }

    /// PID from the PID file, if that process is alive
    pub fn running_pid(&self) -> Option<u32> {
        let result = self.read_pid().filter(|&pid| is_process_running(pid));
        debug!(?result, "DaemonManager::running_pid: returning");
        result
    }

    fn read_pid(&self) -> Option<u32> {
        debug!(?self.pid_file, "DaemonManager::read_pid: called");
        let mut file = fs::File::open(&self.pid_file).ok()?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).ok()?;
        contents.trim().parse().ok()
    }

    fn write_pid(&self, pid: u32) -> Result<()> {
        debug!(pid, ?self.pid_file, "DaemonManager::write_pid: called");
        if let Some(parent) = self.pid_file.parent() {
            fs::create_dir_all(parent).context("Failed to create PID file directory")?;
        }

        let mut file = fs::File::create(&self.pid_file).context("Failed to create PID file")?;
        write!(file, "{}", pid).context("Failed to write PID")?;
        debug!(pid, path = ?self.pid_file, "Wrote PID file");
        Ok(())
    }

    fn remove_pid_file(&self) -> Result<()> {
        if self.pid_file.exists() {
            fs::remove_file(&self.pid_file).context("Failed to remove PID file")?;
            debug!(path = ?self.pid_file, "Removed PID file");
        }
        Ok(())
    }

    /// Spawn `run-daemon` in the background and return its PID
    pub fn start(&self, config_path: Option<&Path>) -> Result<u32> {
        debug!(?config_path, "DaemonManager::start: called");
        if let Some(pid) = self.running_pid() {
            return Err(eyre::eyre!("Daemon already running with PID {}", pid));
        }

        let exe = std::env::current_exe().context("Failed to get current executable")?;
        let mut command = Command::new(&exe);
        if let Some(path) = config_path {
            command.arg("--config").arg(path);
        }
        let child = command
            .arg("run-daemon")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("Failed to spawn daemon process")?;

        let pid = child.id();
        self.write_pid(pid)?;
        info!(pid, "Daemon started");
        Ok(pid)
    }

    /// SIGTERM the daemon, escalating to SIGKILL if it does not exit
    pub fn stop(&self) -> Result<()> {
        let pid = self
            .running_pid()
            .ok_or_else(|| eyre::eyre!("Daemon is not running"))?;
        info!(pid, "Stopping daemon...");

        #[cfg(unix)]
        {
            use nix::sys::signal::{Signal, kill};
            use nix::unistd::Pid;
            kill(Pid::from_raw(pid as i32), Signal::SIGTERM).context("Failed to send SIGTERM")?;
        }

        if !wait_for_exit(pid, STOP_WAIT) {
            warn!(pid, "Daemon did not stop gracefully, sending SIGKILL");
            #[cfg(unix)]
            {
                use nix::sys::signal::{Signal, kill};
                use nix::unistd::Pid;
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
            }
        }

        self.remove_pid_file()?;
        info!(pid, "Daemon stopped");
        Ok(())
    }

    /// Record the current process as the daemon; called by `run-daemon`
    pub fn register_self(&self) -> Result<()> {
        let pid = std::process::id();
        self.write_pid(pid)?;
        info!(pid, version = VERSION, "Daemon registered");
        Ok(())
    }

    /// Remove the PID file if it still names this process
    pub fn unregister_self(&self) -> Result<()> {
        if self.read_pid() == Some(std::process::id()) {
            self.remove_pid_file()?;
        }
        Ok(())
    }

    pub fn pid_file(&self) -> &PathBuf {
        &self.pid_file
    }
}

/// Poll until `pid` is gone or `limit` elapses; true if it exited
pub fn wait_for_exit(pid: u32, limit: Duration) -> bool {
    let mut waited = Duration::ZERO;
    while is_process_running(pid) && waited < limit {
        std::thread::sleep(STOP_POLL);
        waited += STOP_POLL;
    }
    !is_process_running(pid)
}

/// Check if a process with the given PID is running
fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;
        // Signal 0 checks existence without affecting the process
        kill(Pid::from_raw(pid as i32), None).is_ok()
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_daemon_manager_with_custom_pid() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = temp_dir.path().join("test.pid");

        let manager = DaemonManager::with_pid_file(pid_file.clone());
        assert_eq!(manager.pid_file(), &pid_file);
    }

    #[test]
    fn test_is_not_running_when_no_pid_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = DaemonManager::with_pid_file(temp_dir.path().join("nonexistent.pid"));
        assert!(!manager.is_running());
        assert!(manager.stop().is_err());
    }

    #[test]
    fn test_write_and_read_pid() {
        let temp_dir = TempDir::new().unwrap();
        let manager = DaemonManager::with_pid_file(temp_dir.path().join("sub").join("test.pid"));

        manager.write_pid(12345).unwrap();
        assert_eq!(manager.read_pid(), Some(12345));

        manager.remove_pid_file().unwrap();
        assert_eq!(manager.read_pid(), None);
    }

    #[test]
    fn test_register_self_is_running() {
        let temp_dir = TempDir::new().unwrap();
        let manager = DaemonManager::with_pid_file(temp_dir.path().join("test.pid"));

        manager.register_self().unwrap();
        assert_eq!(manager.running_pid(), Some(std::process::id()));

        manager.unregister_self().unwrap();
        assert!(!manager.pid_file().exists());
    }

    #[test]
    fn test_unregister_leaves_foreign_pid_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = DaemonManager::with_pid_file(temp_dir.path().join("test.pid"));

        manager.write_pid(std::process::id() + 1).unwrap();
        manager.unregister_self().unwrap();
        assert!(manager.pid_file().exists());
    }

    #[test]
    fn test_garbage_pid_file() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = temp_dir.path().join("test.pid");
        fs::write(&pid_file, "not a pid").unwrap();

        let manager = DaemonManager::with_pid_file(pid_file);
        assert!(!manager.is_running());
    }

    #[test]
    fn test_wait_for_exit_on_live_process() {
        assert!(!wait_for_exit(std::process::id(), Duration::ZERO));
    }
}
