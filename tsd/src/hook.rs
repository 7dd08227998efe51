//! Hook client
//!
//! The task database runs a hook on every add and modify, feeding the task
//! JSON on stdin and reading the (possibly updated) task back from stdout,
//! followed by an optional feedback line. The hook forwards the event to the
//! daemon and echoes the task unchanged; the exit code tells the task
//! database whether the daemon took it.

use std::io::{BufRead, Write};

use tracing::{debug, error, warn};

use crate::config::Config;
use crate::ipc::{DaemonClient, IpcError};
use crate::logging;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    OnAdd,
    OnModify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookExit {
    Success = 0,
    /// Daemon socket missing or refusing connections
    Unreachable = 1,
    Failure = 100,
}

impl HookExit {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<&IpcError> for HookExit {
    fn from(err: &IpcError) -> Self {
        match err {
            IpcError::Unreachable(_) => HookExit::Unreachable,
            IpcError::Daemon { .. } | IpcError::Timeout | IpcError::Frame(_) | IpcError::BadStatus(_) => {
                HookExit::Failure
            }
        }
    }
}

/// Run one hook invocation against `client`
///
/// Always echoes the task line the task database expects back, even on
/// failure, so the local edit is kept.
pub async fn run<R, W>(kind: HookKind, input: R, output: &mut W, client: &DaemonClient) -> HookExit
where
    R: BufRead,
    W: Write,
{
    let mut lines = input.lines().map_while(Result::ok);
    let first = lines.next().unwrap_or_default();
    let (task_line, result) = match kind {
        HookKind::OnAdd => {
            let result = client.on_add(&first).await;
            (first, result)
        }
        HookKind::OnModify => {
            let second = lines.next().unwrap_or_default();
            let result = client.on_modify(&first, &second).await;
            (second, result)
        }
    };
    debug!(?kind, ok = result.is_ok(), "hook::run: daemon replied");

    let (exit, feedback) = match result {
        Ok(feedback) => (HookExit::Success, feedback),
        Err(e) => {
            let exit = HookExit::from(&e);
            if exit == HookExit::Unreachable {
                warn!(error = %e, "Daemon unreachable");
            } else {
                error!(error = %e, "Hook failed");
            }
            (exit, e.to_string())
        }
    };

    // Nothing useful can be done if stdout is gone
    let _ = writeln!(output, "{}", task_line.trim_end());
    if !feedback.is_empty() {
        let _ = writeln!(output, "{}", feedback);
    }
    let _ = output.flush();
    exit
}

/// Entry point shared by the hook binaries; returns the process exit code
pub async fn main(kind: HookKind) -> i32 {
    let config = Config::load(None).unwrap_or_else(|e| {
        eprintln!("tasksync: {:#}, using defaults", e);
        Config::default()
    });
    let level = logging::resolve_level(None, config.log_level.as_deref());
    if let Err(e) = logging::init(logging::HOOK_LOG, level) {
        eprintln!("tasksync: {:#}", e);
    }

    let client = DaemonClient::new(config.daemon.socket_path.clone()).with_timeout(config.daemon.connection_timeout());
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    run(kind, stdin.lock(), &mut stdout, &client).await.code()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::frame::{DEFAULT_MAX_FRAME_BYTES, read_message, write_message};
    use crate::ipc::listener::create_listener_at;
    use crate::ipc::{DaemonResponse, ErrorKind, RawRequest};
    use std::io::Cursor;
    use tempfile::TempDir;

    const OLD: &str = r#"{"uuid":"2d0fc886-3a8e-478c-a323-5d13de45e254","description":"old","status":"pending"}"#;
    const NEW: &str = r#"{"uuid":"2d0fc886-3a8e-478c-a323-5d13de45e254","description":"new","status":"pending"}"#;

    async fn answer_once(temp: &TempDir, response: DaemonResponse) -> (DaemonClient, tokio::task::JoinHandle<RawRequest>) {
        let socket_path = temp.path().join("daemon.sock");
        let (listener, _) = create_listener_at(&socket_path).unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request: RawRequest = read_message(&mut stream, DEFAULT_MAX_FRAME_BYTES).await.unwrap();
            write_message(&mut stream, &response).await.unwrap();
            request
        });
        (DaemonClient::new(socket_path), handle)
    }

    #[tokio::test]
    async fn test_on_add_echoes_task_and_feedback() {
        let temp = TempDir::new().unwrap();
        let (client, daemon) = answer_once(&temp, DaemonResponse::ok("Todoist: item created")).await;

        let mut out = Vec::new();
        let exit = run(HookKind::OnAdd, Cursor::new(format!("{}\n", NEW)), &mut out, &client).await;

        assert_eq!(exit, HookExit::Success);
        assert_eq!(String::from_utf8(out).unwrap(), format!("{}\nTodoist: item created\n", NEW));
        assert_eq!(daemon.await.unwrap(), RawRequest::on_add(NEW));
    }

    #[tokio::test]
    async fn test_on_modify_echoes_new_task() {
        let temp = TempDir::new().unwrap();
        let (client, daemon) = answer_once(&temp, DaemonResponse::ok("Todoist: item updated")).await;

        let mut out = Vec::new();
        let input = Cursor::new(format!("{}\n{}\n", OLD, NEW));
        let exit = run(HookKind::OnModify, input, &mut out, &client).await;

        assert_eq!(exit, HookExit::Success);
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with(NEW));
        assert_eq!(daemon.await.unwrap(), RawRequest::on_modify(OLD, NEW));
    }

    #[tokio::test]
    async fn test_daemon_error_exits_100() {
        let temp = TempDir::new().unwrap();
        let response = DaemonResponse::error(ErrorKind::DataIntegrity, "Data integrity error: no Inbox");
        let (client, _daemon) = answer_once(&temp, response).await;

        let mut out = Vec::new();
        let exit = run(HookKind::OnAdd, Cursor::new(NEW), &mut out, &client).await;

        assert_eq!(exit.code(), 100);
        assert!(String::from_utf8(out).unwrap().ends_with("DataIntegrityError raised: Data integrity error: no Inbox\n"));
    }

    #[tokio::test]
    async fn test_unreachable_exits_1() {
        let temp = TempDir::new().unwrap();
        let client = DaemonClient::new(temp.path().join("missing.sock"));

        let mut out = Vec::new();
        let exit = run(HookKind::OnAdd, Cursor::new(NEW), &mut out, &client).await;

        assert_eq!(exit.code(), 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("{}\nUnable to connect to tasksync server - is it running?\n", NEW)
        );
    }
}
