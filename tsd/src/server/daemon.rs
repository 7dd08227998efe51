//! The sync daemon's accept loop
//!
//! One connection is served at a time. The daemon owns the mirror, the
//! adapter and the pending batch outright; nothing here is shared with
//! another task, so none of it is locked.
//!
//! ```text
//! LISTENING --request--> DISPATCHING --> LISTENING
//! LISTENING --idle timeout--> FLUSHING --> LISTENING
//! LISTENING --stop / signal--> TERMINATING (forced flush, exit)
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use eyre::Result;
use syncstore::{DataStore, ResourceType};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::backfill::LocalBackfill;
use super::batch::CommandLog;
use super::retry::Backoff;
use crate::adapter::{Adapter, AdapterError, Outcome};
use crate::config::DaemonConfig;
use crate::ipc::frame::{FrameError, read_message, write_message};
use crate::ipc::{DaemonResponse, ErrorKind, RawRequest, Request};
use crate::remote::{Command, Operation, RemoteApi, pull_into};

/// Prefix on every feedback line so the user can tell which service spoke
pub const FEEDBACK_PREFIX: &str = "Todoist: ";

#[derive(Debug, Clone)]
pub struct DaemonSettings {
    pub server_timeout: Duration,
    pub connection_timeout: Duration,
    pub max_frame_bytes: usize,
    /// `None` disables periodic pulls
    pub pull_interval: Option<Duration>,
    pub retry_initial: Duration,
    pub retry_max: Duration,
    /// Zone for tasks that carry none
    pub timezone: Tz,
}

impl DaemonSettings {
    pub fn from_config(config: &DaemonConfig, timezone: Tz) -> Self {
        Self {
            server_timeout: config.server_timeout(),
            connection_timeout: config.connection_timeout(),
            max_frame_bytes: config.max_frame_bytes,
            pull_interval: (config.pull_interval_secs > 0).then(|| Duration::from_secs(config.pull_interval_secs)),
            retry_initial: Duration::from_secs(config.retry_initial_secs),
            retry_max: Duration::from_secs(config.retry_max_secs),
            timezone,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Listening,
    Dispatching,
    Flushing,
    Terminating,
}

/// What the accept loop does after a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Terminate,
}

pub struct Daemon {
    settings: DaemonSettings,
    store: DataStore,
    remote: Arc<dyn RemoteApi>,
    backfill: Arc<dyn LocalBackfill>,
    adapter: Adapter,
    batch: CommandLog,
    backoff: Backoff,
    last_pull: Option<Instant>,
    state: DaemonState,
}

impl Daemon {
    pub fn new(
        settings: DaemonSettings,
        store: DataStore,
        remote: Arc<dyn RemoteApi>,
        backfill: Arc<dyn LocalBackfill>,
    ) -> Self {
        let backoff = Backoff::new(settings.retry_initial, settings.retry_max);
        Self {
            settings,
            store,
            remote,
            backfill,
            adapter: Adapter::new(),
            batch: CommandLog::new(),
            backoff,
            last_pull: None,
            state: DaemonState::Listening,
        }
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub fn batch(&self) -> &CommandLog {
        &self.batch
    }

    /// Serve until a stop request or a shutdown signal, then flush whatever is queued
    pub async fn run(&mut self, listener: UnixListener, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        info!("Daemon loop starting");
        self.pull().await;

        loop {
            self.state = DaemonState::Listening;
            tokio::select! {
                accepted = timeout(self.settings.server_timeout, listener.accept()) => match accepted {
                    Err(_) => self.flush(false).await,
                    Ok(Ok((stream, _))) => {
                        if self.serve(stream).await == Control::Terminate {
                            info!("Stop requested");
                            break;
                        }
                    }
                    Ok(Err(e)) => warn!(error = %e, "Failed to accept connection"),
                },
                Some(()) = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.state = DaemonState::Terminating;
        self.flush(true).await;
        info!(pending = self.batch.len(), "Daemon loop stopped");
        Ok(())
    }

    /// Read one request from `stream`, answer it, and report whether to keep going
    ///
    /// Nothing a client sends can end the loop except `stop`; I/O failures
    /// and stalled clients are logged and the connection dropped.
    pub async fn serve<S>(&mut self, mut stream: S) -> Control
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let read = timeout(
            self.settings.connection_timeout,
            read_message::<_, RawRequest>(&mut stream, self.settings.max_frame_bytes),
        )
        .await;

        let (response, control) = match read {
            Err(_) => {
                warn!("Client did not send a request in time");
                return Control::Continue;
            }
            Ok(Err(FrameError::Json(e))) => (
                DaemonResponse::error(ErrorKind::Protocol, format!("Malformed request: {}", e)),
                Control::Continue,
            ),
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to read request");
                return Control::Continue;
            }
            Ok(Ok(raw)) => self.dispatch(raw).await,
        };

        match timeout(self.settings.connection_timeout, write_message(&mut stream, &response)).await {
            Err(_) => warn!("Client did not take the response in time"),
            Ok(Err(e)) => warn!(error = %e, "Failed to send response"),
            Ok(Ok(())) => debug!(?response, "serve: responded"),
        }
        control
    }

    pub async fn dispatch(&mut self, raw: RawRequest) -> (DaemonResponse, Control) {
        self.state = DaemonState::Dispatching;
        debug!(method = %raw.method, "Daemon::dispatch: called");

        let request = match Request::from_raw(raw, self.settings.timezone) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Rejected request");
                return (DaemonResponse::error(ErrorKind::Protocol, e), Control::Continue);
            }
        };

        match request {
            Request::OnAdd { task } => {
                let result = self.adapter.on_add(&task, &mut self.store);
                (self.enqueue(result), Control::Continue)
            }
            Request::OnModify { old, new } => {
                let result = self.adapter.on_modify(&old, &new, &mut self.store);
                (self.enqueue(result), Control::Continue)
            }
            Request::Status => (DaemonResponse::ok(std::process::id().to_string()), Control::Continue),
            Request::Stop => (DaemonResponse::ok("stopping"), Control::Terminate),
        }
    }

    fn enqueue(&mut self, result: Result<Outcome, AdapterError>) -> DaemonResponse {
        match result {
            Ok(outcome) => {
                self.batch.append(outcome.commands);
                debug!(pending = self.batch.len(), "enqueue: batch grew");
                DaemonResponse::ok(format!("{}{}", FEEDBACK_PREFIX, outcome.feedback))
            }
            Err(e) => {
                warn!(error = %e, "Adapter refused event");
                DaemonResponse::error(error_kind(&e), e)
            }
        }
    }

    /// Push the batch (unless backing off) and pull if one is due
    ///
    /// `force` ignores the backoff and skips the periodic pull; used on the
    /// way out.
    pub async fn flush(&mut self, force: bool) {
        self.state = DaemonState::Flushing;
        if !self.batch.is_empty() {
            if force || self.backoff.ready() {
                self.push().await;
            } else {
                debug!(pending = self.batch.len(), "flush: backing off");
            }
        }
        if !force && self.pull_due() {
            self.pull().await;
        }
    }

    async fn push(&mut self) {
        let commands = self.batch.commands().to_vec();
        info!(count = commands.len(), "Flushing batch");

        let response = match self.remote.push(&commands).await {
            Ok(response) => response,
            Err(e) => {
                let delay = self.backoff.fail();
                if e.is_retryable() {
                    warn!(error = %e, ?delay, pending = commands.len(), "Push failed, batch retained");
                } else {
                    error!(error = %e, ?delay, pending = commands.len(), "Push failed, batch retained");
                }
                return;
            }
        };

        for (operation_id, status) in response.rejected() {
            warn!(operation_id, %status, "Remote rejected command");
        }
        self.batch.drain();
        self.backoff.reset();

        if let Err(e) = self.store.commit_staged(&response.temp_id_mapping) {
            warn!(error = %e, "Failed to commit staged entities");
        }
        for (task_uuid, remote_id) in created_items(&commands, &response.temp_id_mapping) {
            if let Err(e) = self.backfill.set_remote_id(task_uuid, &remote_id).await {
                warn!(%task_uuid, remote_id, error = %e, "Failed to backfill remote id");
            }
        }

        // Refresh the mirror with the entities the push created
        self.pull().await;
    }

    fn pull_due(&self) -> bool {
        match self.settings.pull_interval {
            Some(interval) => self.last_pull.is_none_or(|at| at.elapsed() >= interval),
            None => false,
        }
    }

    async fn pull(&mut self) {
        match pull_into(self.remote.as_ref(), &mut self.store, &ResourceType::ALL).await {
            Ok(summary) => debug!(?summary, "pull: applied"),
            Err(e) => warn!(error = %e, "Pull failed"),
        }
        self.last_pull = Some(Instant::now());
    }
}

/// Bad input data is the caller's problem; a malformed command is ours
fn error_kind(err: &AdapterError) -> ErrorKind {
    match err {
        AdapterError::NoInbox | AdapterError::MissingRemoteId(_) => ErrorKind::DataIntegrity,
        AdapterError::MissingTempId => ErrorKind::Internal,
    }
}

/// Local uuid and real id of every `item_add` the remote mapped
///
/// A task added twice in one batch shares one temp id and is written back once.
fn created_items(commands: &[Command], mapping: &HashMap<String, String>) -> Vec<(Uuid, String)> {
    let mut seen = HashSet::new();
    commands
        .iter()
        .filter(|c| matches!(c.op, Operation::ItemAdd(_)))
        .filter_map(|c| c.temp_id.as_deref())
        .filter_map(|temp_id| {
            let real = mapping.get(temp_id)?;
            let uuid = Uuid::parse_str(temp_id).ok()?;
            Some((uuid, real.clone()))
        })
        .filter(|(uuid, _)| seen.insert(*uuid))
        .collect()
}
