//! Remote Transport: command envelopes, the sync endpoint and pull bookkeeping

pub mod api;
pub mod command;
pub mod error;
pub mod http;
pub mod sync;

pub use api::{PushResponse, RemoteApi};
pub use command::{
    Command, ItemAddArgs, ItemCompleteArgs, ItemMoveArgs, ItemRef, ItemUpdateArgs, Operation, ProjectAddArgs,
    SectionAddArgs,
};
pub use error::RemoteError;
pub use http::HttpRemote;
pub use sync::{PullError, PullSummary, pull_into};
