//! HTTP implementation of the remote sync endpoint

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use syncstore::{ResourceType, SyncPayload};
use tracing::{debug, info};

use super::api::{PushResponse, RemoteApi};
use super::{Command, RemoteError};
use crate::config::RemoteConfig;

/// Client for the remote's single sync endpoint
pub struct HttpRemote {
    http: Client,
    base_url: String,
    api_key: String,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Build from config, reading the API key from the configured environment variable
    pub fn from_config(config: &RemoteConfig) -> Result<Self, RemoteError> {
        debug!(base_url = %config.base_url, api_key_env = %config.api_key_env, "HttpRemote::from_config: called");
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| RemoteError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(&config.base_url, api_key, Duration::from_millis(config.timeout_ms))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn pull(&self, sync_token: &str, resource_types: &[ResourceType]) -> Result<SyncPayload, RemoteError> {
        let types: Vec<&str> = resource_types.iter().map(|rt| rt.as_str()).collect();
        let types = serde_json::to_string(&types)?;
        debug!(sync_token, %types, "HttpRemote::pull: called");

        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .form(&[("sync_token", sync_token), ("resource_types", types.as_str())])
            .send()
            .await?;
        let payload: SyncPayload = Self::check(response).await?.json().await?;

        info!(full_sync = payload.full_sync, "Pulled from remote");
        Ok(payload)
    }

    async fn push(&self, commands: &[Command]) -> Result<PushResponse, RemoteError> {
        debug!(count = commands.len(), "HttpRemote::push: called");
        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "commands": commands }))
            .send()
            .await?;
        let result: PushResponse = Self::check(response).await?.json().await?;

        info!(
            count = commands.len(),
            mapped = result.temp_id_mapping.len(),
            "Pushed batch to remote"
        );
        Ok(result)
    }
}
