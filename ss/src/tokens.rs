//! Per-resource-type incremental sync tokens

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entities::ResourceType;
use crate::error::StoreError;
use crate::store::atomic_write;

/// Token value that asks the remote for a full resync
pub const FULL_SYNC_TOKEN: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncToken {
    pub token: String,
    /// Unix seconds when the token was stored
    pub timestamp: i64,
}

impl SyncToken {
    pub fn new(token: impl Into<String>, timestamp: i64) -> Self {
        Self {
            token: token.into(),
            timestamp,
        }
    }

    /// The "never synced" token; sorts before every stored token
    pub fn full() -> Self {
        Self::new(FULL_SYNC_TOKEN, 0)
    }

    pub fn is_full(&self) -> bool {
        self.token == FULL_SYNC_TOKEN
    }
}

/// Token map keyed by resource type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncTokens {
    tokens: BTreeMap<ResourceType, SyncToken>,
}

impl SyncTokens {
    /// Token for a pull covering `types`
    ///
    /// The oldest checkpoint among the requested types governs, so no type
    /// skips updates. A type with no stored token forces a full sync.
    pub fn get(&self, types: &[ResourceType]) -> SyncToken {
        let token = types
            .iter()
            .map(|rt| self.tokens.get(rt).cloned().unwrap_or_else(SyncToken::full))
            .min_by_key(|t| t.timestamp)
            .unwrap_or_else(SyncToken::full);
        debug!(?types, token = %token.token, timestamp = token.timestamp, "SyncTokens::get");
        token
    }

    /// Stamp every type in `types` with `token` and the current time
    pub fn set(&mut self, token: &str, types: &[ResourceType]) {
        self.set_at(token, types, chrono::Utc::now().timestamp());
    }

    pub fn set_at(&mut self, token: &str, types: &[ResourceType], timestamp: i64) {
        for rt in types {
            self.tokens.insert(*rt, SyncToken::new(token, timestamp));
        }
    }

    /// Forget the tokens for `types`, forcing the next pull to be full
    pub fn reset(&mut self, types: &[ResourceType]) {
        for rt in types {
            self.tokens.remove(rt);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceType, &SyncToken)> {
        self.tokens.iter()
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(?path, "SyncTokens::load: no token file, starting empty");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(self)?;
        atomic_write(path, &content)
    }
}
