//! SyncStore - local mirror of remote task-service entities
//!
//! Caches the remote service's items, projects, sections and labels on disk,
//! together with one incremental sync token per resource type, so lookups
//! (project name to id, section within project) never need a network round trip.
//!
//! # Architecture
//!
//! ```text
//! ~/.todoist/
//! ├── items.json        # JSON array keyed by `id`
//! ├── projects.json
//! ├── sections.json
//! ├── labels.json
//! ├── sync_tokens.json  # {resource_type: {token, timestamp}}
//! └── .lock             # held exclusively by the owning daemon
//! ```
//!
//! # Example
//!
//! ```ignore
//! use syncstore::{DataStore, ResourceType};
//!
//! let mut store = DataStore::open("~/.todoist")?;
//! let token = store.tokens().get(&ResourceType::ALL);
//! if token.is_full() {
//!     store.overwrite(payload, &ResourceType::ALL)?;
//! } else {
//!     store.update(payload, &ResourceType::ALL)?;
//! }
//! let inbox = store.inbox();
//! ```

pub mod cli;
pub mod config;
mod entities;
mod error;
mod store;
mod tokens;

pub use entities::{Due, Entity, Item, Label, Project, ResourceType, Section, SyncPayload};
pub use error::StoreError;
pub use store::{DataStore, atomic_write};
pub use tokens::{FULL_SYNC_TOKEN, SyncToken, SyncTokens};

/// Name of the reserved project every remote account has
pub const INBOX_PROJECT_NAME: &str = "Inbox";
