//! The long-lived sync daemon: batching, flushing and id backfill

pub mod backfill;
pub mod batch;
pub mod daemon;
pub mod retry;

pub use backfill::{LocalBackfill, TaskwarriorBackfill};
pub use batch::CommandLog;
pub use daemon::{Control, Daemon, DaemonSettings, DaemonState, FEEDBACK_PREFIX};
pub use retry::Backoff;
