//! Pending-operation queue
//!
//! Commands accumulate here between flushes. The batch is a replay queue:
//! the local task database already holds every edit, so a failed push just
//! leaves the queue intact for the next attempt.

use crate::remote::Command;

#[derive(Debug, Default)]
pub struct CommandLog {
    commands: Vec<Command>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, commands: impl IntoIterator<Item = Command>) {
        self.commands.extend(commands);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Take every queued command, leaving the log empty
    pub fn drain(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }
}
