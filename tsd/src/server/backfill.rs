//! Writing remote ids back into the local task database

use async_trait::async_trait;
use eyre::{Context, Result};
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

/// Records the remote id of a freshly created task locally
#[async_trait]
pub trait LocalBackfill: Send + Sync {
    async fn set_remote_id(&self, task_uuid: Uuid, remote_id: &str) -> Result<()>;
}

/// Backfill through the task database's own CLI, with hooks disabled so the
/// write does not loop back into the daemon
#[derive(Debug, Clone)]
pub struct TaskwarriorBackfill {
    command: String,
}

impl TaskwarriorBackfill {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }

    pub fn args(task_uuid: Uuid, remote_id: &str) -> Vec<String> {
        vec![
            "rc.hooks=off".to_string(),
            "rc.confirmation=off".to_string(),
            task_uuid.to_string(),
            "modify".to_string(),
            format!("todoist:{}", remote_id),
        ]
    }
}

#[async_trait]
impl LocalBackfill for TaskwarriorBackfill {
    async fn set_remote_id(&self, task_uuid: Uuid, remote_id: &str) -> Result<()> {
        debug!(%task_uuid, remote_id, "TaskwarriorBackfill::set_remote_id: called");
        let output = Command::new(&self.command)
            .args(Self::args(task_uuid, remote_id))
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.command))?;

        if !output.status.success() {
            return Err(eyre::eyre!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        info!(%task_uuid, remote_id, "Backfilled remote id");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backfill_args() {
        let uuid = Uuid::parse_str("2d0fc886-3a8e-478c-a323-5d13de45e254").unwrap();
        assert_eq!(
            TaskwarriorBackfill::args(uuid, "7173209653"),
            vec![
                "rc.hooks=off",
                "rc.confirmation=off",
                "2d0fc886-3a8e-478c-a323-5d13de45e254",
                "modify",
                "todoist:7173209653",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_command_fails() {
        let backfill = TaskwarriorBackfill::new("/nonexistent/task-binary");
        assert!(backfill.set_remote_id(Uuid::new_v4(), "1").await.is_err());
    }

    #[tokio::test]
    async fn test_failing_command_reports_status() {
        let backfill = TaskwarriorBackfill::new("false");
        let err = backfill.set_remote_id(Uuid::new_v4(), "1").await.unwrap_err();
        assert!(err.to_string().starts_with("false exited with"));
    }
}
