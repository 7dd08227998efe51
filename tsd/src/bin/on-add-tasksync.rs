//! on-add hook: forwards a newly added task to the tasksync daemon

use tasksync::hook::{self, HookKind};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    std::process::exit(hook::main(HookKind::OnAdd).await);
}
