//! tasksync - batching sync between a local task database and a remote task service
//!
//! The local database invokes a hook on every add and modify. The hook forwards
//! the event over a Unix socket to a long-running daemon, which diffs the task
//! snapshots into remote commands, batches them, and flushes the batch when the
//! socket has been idle for a while or on shutdown.
//!
//! # Modules
//!
//! - [`domain`] - Task snapshots and the three date kinds
//! - [`adapter`] - Diffing old/new snapshots into remote commands
//! - [`remote`] - Remote command types and the HTTP sync transport
//! - [`ipc`] - Length-prefixed, acknowledged framing over the daemon socket
//! - [`server`] - The daemon state machine, batching and retry
//! - [`hook`] - The hook client shared by the hook binaries
//! - [`daemon`] - PID file and process control
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod adapter;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod domain;
pub mod hook;
pub mod ipc;
pub mod logging;
pub mod remote;
pub mod server;
