//! tasksync configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::local_zone;
use crate::ipc::runtime_dir;

/// Environment variable naming a config file, checked after `--config`
pub const CONFIG_ENV: &str = "TASKSYNC_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR); the CLI flag wins over this
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    pub daemon: DaemonConfig,

    pub remote: RemoteConfig,

    pub storage: StorageConfig,

    pub local: LocalConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("INFO".to_string()),
            daemon: DaemonConfig::default(),
            remote: RemoteConfig::default(),
            storage: StorageConfig::default(),
            local: LocalConfig::default(),
        }
    }
}

impl Config {
    /// Load from the first source that exists
    ///
    /// Order: explicit path, `TASKSYNC_CONFIG`, `./.tasksync.yml`,
    /// `<config_dir>/tasksync/tasksync.yml`, then built-in defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            return Self::load_from_file(&path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::search_paths() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Log level only, read before logging is set up; load errors surface later
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|config| config.log_level)
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".tasksync.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("tasksync").join("tasksync.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    #[serde(rename = "socket-path")]
    pub socket_path: PathBuf,

    #[serde(rename = "pid-file")]
    pub pid_file: PathBuf,

    /// Idle accept timeout; each expiry triggers a flush
    #[serde(rename = "server-timeout-secs")]
    pub server_timeout_secs: u64,

    /// Bound on reading a request and writing its response
    #[serde(rename = "connection-timeout-secs")]
    pub connection_timeout_secs: u64,

    #[serde(rename = "max-frame-bytes")]
    pub max_frame_bytes: usize,

    /// Incremental pull cadence; 0 disables periodic pulls
    #[serde(rename = "pull-interval-secs")]
    pub pull_interval_secs: u64,

    #[serde(rename = "retry-initial-secs")]
    pub retry_initial_secs: u64,

    #[serde(rename = "retry-max-secs")]
    pub retry_max_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let dir = runtime_dir();
        Self {
            socket_path: dir.join("daemon.sock"),
            pid_file: dir.join("tasksync.pid"),
            server_timeout_secs: 10,
            connection_timeout_secs: 5,
            max_frame_bytes: crate::ipc::DEFAULT_MAX_FRAME_BYTES,
            pull_interval_secs: 300,
            retry_initial_secs: 10,
            retry_max_secs: 600,
        }
    }
}

impl DaemonConfig {
    pub fn server_timeout(&self) -> Duration {
        Duration::from_secs(self.server_timeout_secs)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.todoist.com/sync/v9/sync".to_string(),
            api_key_env: "TODOIST_API_KEY".to_string(),
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(rename = "cache-dir")]
    pub cache_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_dir: syncstore::config::default_cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Task database executable used for id backfill
    #[serde(rename = "task-command")]
    pub task_command: String,

    /// IANA zone overriding the detected local zone
    pub timezone: Option<String>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            task_command: "task".to_string(),
            timezone: None,
        }
    }
}

impl LocalConfig {
    /// Configured zone, else the process-local zone
    pub fn resolve_timezone(&self) -> Result<Tz> {
        match &self.timezone {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| eyre::eyre!("Unknown time zone '{}' in config", name)),
            None => Ok(local_zone()),
        }
    }
}
