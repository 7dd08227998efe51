//! IPC client for communicating with the daemon
//!
//! Used by the hook binaries and the CLI. Every call opens a fresh
//! connection, sends one framed request and reads one framed response.

use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio::net::UnixStream;
use tracing::debug;

use super::default_socket_path;
use super::frame::{DEFAULT_MAX_FRAME_BYTES, FrameError, read_message, write_message};
use super::messages::{DaemonResponse, ErrorKind, RawRequest};

/// Default timeout for IPC operations
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("Unable to connect to tasksync server - is it running?")]
    Unreachable(#[source] std::io::Error),

    #[error("Timed out talking to tasksync server")]
    Timeout,

    #[error("IPC error: {0}")]
    Frame(#[from] FrameError),

    #[error("{kind} raised: {message}")]
    Daemon { kind: ErrorKind, message: String },

    #[error("Unexpected status response '{0}'")]
    BadStatus(String),
}

/// Client for communicating with the daemon via IPC
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl Default for DaemonClient {
    fn default() -> Self {
        Self::new(default_socket_path())
    }
}

impl DaemonClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set a custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Check if the daemon socket exists
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    pub async fn on_add(&self, task_line: &str) -> Result<String, IpcError> {
        self.send(RawRequest::on_add(task_line)).await
    }

    pub async fn on_modify(&self, old_line: &str, new_line: &str) -> Result<String, IpcError> {
        self.send(RawRequest::on_modify(old_line, new_line)).await
    }

    /// Process id of the running daemon
    pub async fn status(&self) -> Result<u32, IpcError> {
        let reply = self.send(RawRequest::status()).await?;
        reply.trim().parse().map_err(|_| IpcError::BadStatus(reply))
    }

    /// Ask the daemon to flush and exit
    pub async fn stop(&self) -> Result<String, IpcError> {
        self.send(RawRequest::stop()).await
    }

    /// Send a request and return the daemon's `Ok` message
    pub async fn send(&self, request: RawRequest) -> Result<String, IpcError> {
        debug!(socket_path = ?self.socket_path, method = %request.method, "DaemonClient::send: called");

        let mut stream = match tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path)).await {
            Err(_) => return Err(IpcError::Timeout),
            Ok(Err(e)) if is_unreachable(&e) => return Err(IpcError::Unreachable(e)),
            Ok(Err(e)) => return Err(IpcError::Frame(FrameError::Io(e))),
            Ok(Ok(stream)) => stream,
        };

        let response = tokio::time::timeout(self.timeout, async {
            write_message(&mut stream, &request).await?;
            read_message::<_, DaemonResponse>(&mut stream, DEFAULT_MAX_FRAME_BYTES).await
        })
        .await
        .map_err(|_| IpcError::Timeout)??;

        debug!(?response, "DaemonClient::send: received response");
        match response {
            DaemonResponse::Ok { message } => Ok(message),
            DaemonResponse::Error { kind, message } => Err(IpcError::Daemon { kind, message }),
        }
    }
}

fn is_unreachable(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        IoErrorKind::NotFound | IoErrorKind::ConnectionRefused | IoErrorKind::PermissionDenied
    )
}
