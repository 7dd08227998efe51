//! Configuration for the syncstore inspection tool

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the mirror's cache files
    #[serde(default = "default_cache_dir", rename = "cache-dir")]
    pub cache_dir: PathBuf,
}

/// `~/.todoist`, where the daemon keeps its mirror unless configured otherwise
pub fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".todoist")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
        }
    }
}

impl Config {
    /// Load config from file, or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            return Self::load_from_file(config_path);
        }

        let default_paths = [
            dirs::config_dir().map(|p| p.join("syncstore").join("config.yml")),
            Some(PathBuf::from("syncstore.yml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                return Self::load_from_file(path);
            }
        }

        Ok(Config::default())
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).context(format!("Failed to read config {}", path.display()))?;
        serde_yaml::from_str(&content).context(format!("Failed to parse config {}", path.display()))
    }
}
