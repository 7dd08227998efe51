//! Neutral task model shared by the adapter, the daemon and the hooks

mod datetime;
mod task;

pub use datetime::{DateKind, DateParseError, SyncDateTime, local_zone, zone_from_sources};
pub use task::{Priority, REMOTE_NO_PRIORITY, TaskParseError, TaskRecord, TaskStatus, remote_task_uuid};
