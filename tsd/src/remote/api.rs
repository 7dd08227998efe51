//! RemoteApi trait definition

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use syncstore::{ResourceType, SyncPayload};

use super::{Command, RemoteError};

/// Response to a batched push
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushResponse {
    /// Per-command outcome keyed by operation id: `"ok"` or an error object
    #[serde(default)]
    pub sync_status: HashMap<String, Value>,

    /// Real ids for every create whose temp id was accepted
    #[serde(default)]
    pub temp_id_mapping: HashMap<String, String>,

    #[serde(default)]
    pub sync_token: Option<String>,
}

impl PushResponse {
    /// Commands the remote rejected, with the error it reported
    pub fn rejected(&self) -> Vec<(&str, &Value)> {
        let mut rejected: Vec<_> = self
            .sync_status
            .iter()
            .filter(|(_, status)| status.as_str() != Some("ok"))
            .map(|(id, status)| (id.as_str(), status))
            .collect();
        rejected.sort_by_key(|(id, _)| *id);
        rejected
    }
}

/// The remote task service
///
/// `pull` is incremental from `sync_token` (`"*"` for everything); `push`
/// submits a whole batch in one request and either succeeds or fails as a unit.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn pull(&self, sync_token: &str, resource_types: &[ResourceType]) -> Result<SyncPayload, RemoteError>;

    async fn push(&self, commands: &[Command]) -> Result<PushResponse, RemoteError>;
}
