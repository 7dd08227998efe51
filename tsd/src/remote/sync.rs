//! Incremental pull into the local mirror

use syncstore::{DataStore, ResourceType, StoreError};
use thiserror::Error;
use tracing::{debug, info};

use super::{RemoteApi, RemoteError};

#[derive(Debug, Error)]
pub enum PullError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullSummary {
    /// The cached collections were replaced rather than merged
    pub full: bool,
    pub items: usize,
    pub projects: usize,
    pub sections: usize,
    pub labels: usize,
}

/// Pull `types` from the earliest stored checkpoint and fold the result into `store`
///
/// A `'*'` token, or a response the remote flags as a full sync, overwrites
/// the cached collections; anything else is merged by id.
pub async fn pull_into(
    remote: &dyn RemoteApi,
    store: &mut DataStore,
    types: &[ResourceType],
) -> Result<PullSummary, PullError> {
    let token = store.tokens().get(types);
    debug!(token = %token.token, ?types, "pull_into: called");

    let payload = remote.pull(&token.token, types).await?;
    let summary = PullSummary {
        full: token.is_full() || payload.full_sync,
        items: payload.items.as_ref().map_or(0, Vec::len),
        projects: payload.projects.as_ref().map_or(0, Vec::len),
        sections: payload.sections.as_ref().map_or(0, Vec::len),
        labels: payload.labels.as_ref().map_or(0, Vec::len),
    };

    if summary.full {
        store.overwrite(payload, types)?;
    } else {
        store.update(payload, types)?;
    }
    info!(?summary, "Pull applied to mirror");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::api::mock::MockRemote;
    use syncstore::{Item, Project, SyncPayload};

    fn full_payload() -> SyncPayload {
        SyncPayload {
            sync_token: "tok-1".to_string(),
            full_sync: true,
            items: Some(vec![Item::new("1", "one", "10"), Item::new("2", "two", "10")]),
            projects: Some(vec![Project::new("10", "Inbox")]),
            sections: Some(vec![]),
            labels: Some(vec![]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_first_pull_is_full_and_overwrites() {
        let remote = MockRemote::new();
        remote.queue_pull(Ok(full_payload()));
        let mut store = DataStore::in_memory();

        let summary = pull_into(&remote, &mut store, &ResourceType::ALL).await.unwrap();
        assert!(summary.full);
        assert_eq!(summary.items, 2);
        assert_eq!(remote.pull_tokens(), vec!["*".to_string()]);
        assert_eq!(store.tokens().get(&ResourceType::ALL).token, "tok-1");
    }

    #[tokio::test]
    async fn test_incremental_pull_merges() {
        let remote = MockRemote::new();
        remote.queue_pull(Ok(full_payload()));
        remote.queue_pull(Ok(SyncPayload {
            sync_token: "tok-2".to_string(),
            items: Some(vec![Item::new("2", "two (edited)", "10"), Item::new("3", "three", "10")]),
            ..Default::default()
        }));
        let mut store = DataStore::in_memory();

        pull_into(&remote, &mut store, &ResourceType::ALL).await.unwrap();
        let summary = pull_into(&remote, &mut store, &ResourceType::ALL).await.unwrap();

        assert!(!summary.full);
        assert_eq!(remote.pull_tokens(), vec!["*".to_string(), "tok-1".to_string()]);
        assert_eq!(store.items().len(), 3);
        assert_eq!(store.item("2").unwrap().content, "two (edited)");
        assert_eq!(store.projects().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_pull_keeps_token() {
        let remote = MockRemote::new();
        remote.queue_pull(Ok(full_payload()));
        remote.queue_pull(Err(RemoteError::Status {
            status: 503,
            body: "down".to_string(),
        }));
        let mut store = DataStore::in_memory();

        pull_into(&remote, &mut store, &ResourceType::ALL).await.unwrap();
        let err = pull_into(&remote, &mut store, &ResourceType::ALL).await.unwrap_err();
        assert!(matches!(err, PullError::Remote(_)));
        assert_eq!(store.tokens().get(&ResourceType::ALL).token, "tok-1");
        assert_eq!(store.items().len(), 2);
    }
}
