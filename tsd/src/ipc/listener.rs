//! IPC listener for the daemon side
//!
//! Provides helpers for creating and managing the Unix Domain Socket listener.

use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use tokio::net::UnixListener;
use tracing::{debug, warn};

/// Create and bind a listener at `socket_path`, replacing a stale socket file
pub fn create_listener_at(socket_path: &Path) -> Result<(UnixListener, PathBuf)> {
    debug!(?socket_path, "create_listener_at: called");

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    if socket_path.exists() {
        debug!(?socket_path, "create_listener_at: removing stale socket");
        std::fs::remove_file(socket_path).context("Failed to remove stale socket")?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind IPC socket {}", socket_path.display()))?;
    debug!(?socket_path, "create_listener_at: socket bound");

    Ok((listener, socket_path.to_path_buf()))
}

/// Remove the socket file on shutdown
pub fn cleanup_socket(socket_path: &Path) {
    if socket_path.exists() {
        debug!(?socket_path, "cleanup_socket: removing socket file");
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!(?socket_path, error = %e, "Failed to remove socket file");
        }
    }
}
