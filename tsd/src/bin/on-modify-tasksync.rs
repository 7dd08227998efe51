//! on-modify hook: forwards the old and new task snapshots to the tasksync daemon

use tasksync::hook::{self, HookKind};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    std::process::exit(hook::main(HookKind::OnModify).await);
}
