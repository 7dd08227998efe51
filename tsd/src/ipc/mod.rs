//! Inter-process communication between hook clients and the daemon
//!
//! A Unix domain socket carries one framed request and one framed response
//! per connection (see `frame` for the wire format).

use std::path::PathBuf;

pub mod client;
pub mod frame;
pub mod listener;
pub mod messages;

pub use client::{DaemonClient, IpcError};
pub use frame::{DEFAULT_MAX_FRAME_BYTES, FrameError};
pub use listener::{cleanup_socket, create_listener_at};
pub use messages::{DaemonResponse, ErrorKind, Method, ProtocolError, RawRequest, Request};

/// Socket path used when the config does not name one
///
/// Shares its directory with the PID file.
pub fn default_socket_path() -> PathBuf {
    runtime_dir().join("daemon.sock")
}

pub fn runtime_dir() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("tasksync")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path_ends_with_daemon_sock() {
        assert!(default_socket_path().ends_with("tasksync/daemon.sock"));
    }
}
