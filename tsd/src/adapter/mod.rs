//! Diff/Adapter engine
//!
//! Turns a local task event (add, or old/new snapshots for a modify) into the
//! remote commands that replay it, plus a one-line summary for the user.
//! Projects and sections the commands create are staged in the mirror so
//! later events in the same batch resolve them by name.

mod ops;

use std::fmt;

use syncstore::{DataStore, Project, Section};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::TaskRecord;
use crate::remote::{Command, Operation};

pub use ops::{add, complete, delete, move_item, uncomplete, update};

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Data integrity error: no Inbox project in the local mirror")]
    NoInbox,

    #[error("Data integrity error: task {0} has no remote id")]
    MissingRemoteId(Uuid),

    #[error("Data integrity error: create command without a temp id")]
    MissingTempId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Updated,
    Moved,
    Deleted,
    Completed,
    Uncompleted,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Updated => "updated",
            Action::Moved => "moved",
            Action::Deleted => "deleted",
            Action::Completed => "completed",
            Action::Uncompleted => "uncompleted",
        })
    }
}

/// What an event did, phrased for the hook's output line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    Created,
    /// A modify for a task the remote never heard of
    CreatedMissing,
    Changed(Vec<Action>),
    NotRequired,
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feedback::Created => f.write_str("item created"),
            Feedback::CreatedMissing => f.write_str("item created (did not exist)"),
            Feedback::NotRequired => f.write_str("update not required"),
            Feedback::Changed(actions) => {
                let words: Vec<String> = actions.iter().map(Action::to_string).collect();
                let joined = match words.as_slice() {
                    [] => return f.write_str("update not required"),
                    [one] => one.clone(),
                    [a, b] => format!("{} and {}", a, b),
                    [init @ .., last] => format!("{}, and {}", init.join(", "), last),
                };
                write!(f, "item {}", joined)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub commands: Vec<Command>,
    pub feedback: Feedback,
}

/// Stateless translator from task events to remote commands
#[derive(Debug, Clone, Copy, Default)]
pub struct Adapter;

impl Adapter {
    pub fn new() -> Self {
        Self
    }

    pub fn on_add(&self, task: &TaskRecord, store: &mut DataStore) -> Result<Outcome, AdapterError> {
        debug!(uuid = %task.uuid, "Adapter::on_add: called");
        let commands = add(task, store)?;
        stage_creates(&commands, store);
        info!(uuid = %task.uuid, count = commands.len(), "Translated add");
        Ok(Outcome {
            commands,
            feedback: Feedback::Created,
        })
    }

    pub fn on_modify(&self, old: &TaskRecord, new: &TaskRecord, store: &mut DataStore) -> Result<Outcome, AdapterError> {
        debug!(uuid = %new.uuid, "Adapter::on_modify: called");
        if new.remote_id.is_none() {
            let mut outcome = self.on_add(new, store)?;
            outcome.feedback = Feedback::CreatedMissing;
            return Ok(outcome);
        }

        let mut commands = Vec::new();
        let mut actions = Vec::new();

        let updated = update(old, new, store)?;
        if !updated.is_empty() {
            actions.push(Action::Updated);
        }
        commands.extend(updated);

        let moved = move_item(old, new, store)?;
        if !moved.is_empty() {
            actions.push(Action::Moved);
        }
        commands.extend(moved);

        // A single status means at most one of these is non-empty
        for (action, ops) in [
            (Action::Deleted, delete(old, new, store)?),
            (Action::Completed, complete(old, new, store)?),
            (Action::Uncompleted, uncomplete(old, new, store)?),
        ] {
            if !ops.is_empty() {
                actions.push(action);
                commands.extend(ops);
                break;
            }
        }

        stage_creates(&commands, store);
        let feedback = if actions.is_empty() {
            Feedback::NotRequired
        } else {
            Feedback::Changed(actions)
        };
        info!(uuid = %new.uuid, count = commands.len(), %feedback, "Translated modify");
        Ok(Outcome { commands, feedback })
    }
}

fn stage_creates(commands: &[Command], store: &mut DataStore) {
    for command in commands {
        let Some(temp_id) = &command.temp_id else {
            continue;
        };
        match &command.op {
            Operation::ProjectAdd(args) => store.stage_project(Project::new(temp_id.clone(), args.name.clone())),
            Operation::SectionAdd(args) => store.stage_section(Section::new(
                temp_id.clone(),
                args.name.clone(),
                args.project_id.clone(),
            )),
            _ => {}
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::TaskStatus;
    use chrono_tz::Tz;
    use proptest::prelude::*;
    use syncstore::{ResourceType, SyncPayload};

    pub(crate) const TASK_LINE: &str = r#"{"id":2,"description":"Test case w/ due_date","due":"20230828T040000Z","entry":"20230827T212930Z","modified":"20230827T212931Z","project":"Inbox","priority":"M","status":"pending","timezone":"America/New_York","todoist":"7173209653","uuid":"2d0fc886-3a8e-478c-a323-5d13de45e254","tags":["test2"],"urgency":13.2049}"#;

    pub(crate) fn fixture_store() -> DataStore {
        let mut store = DataStore::in_memory();
        let mut inbox = Project::new("1000000000", "Inbox");
        inbox.inbox_project = true;
        let payload = SyncPayload {
            sync_token: "fixture".to_string(),
            projects: Some(vec![inbox, Project::new("1000000001", "Personal")]),
            sections: Some(vec![Section::new("100000000", "Recents", "1000000000")]),
            ..Default::default()
        };
        store
            .overwrite(payload, &[ResourceType::Projects, ResourceType::Sections])
            .unwrap();
        store
    }

    pub(crate) fn fixture_task() -> TaskRecord {
        TaskRecord::from_json(TASK_LINE, Tz::UTC).unwrap()
    }

    #[test]
    fn test_feedback_phrasing() {
        assert_eq!(Feedback::Created.to_string(), "item created");
        assert_eq!(Feedback::CreatedMissing.to_string(), "item created (did not exist)");
        assert_eq!(Feedback::NotRequired.to_string(), "update not required");
        assert_eq!(Feedback::Changed(vec![Action::Updated]).to_string(), "item updated");
        assert_eq!(
            Feedback::Changed(vec![Action::Updated, Action::Moved]).to_string(),
            "item updated and moved"
        );
        assert_eq!(
            Feedback::Changed(vec![Action::Updated, Action::Moved, Action::Completed]).to_string(),
            "item updated, moved, and completed"
        );
    }

    #[test]
    fn test_on_add_stages_new_project() {
        let mut store = fixture_store();
        let mut task = fixture_task();
        task.remote_id = None;
        task.project = Some("Work".to_string());

        let outcome = Adapter::new().on_add(&task, &mut store).unwrap();
        assert_eq!(outcome.feedback, Feedback::Created);
        assert_eq!(outcome.commands.len(), 2);
        assert_eq!(store.staged_len(), 1);

        // A second task in the same batch reuses the staged project
        let mut second = TaskRecord::new("Second", Tz::UTC);
        second.project = Some("Work".to_string());
        let outcome2 = Adapter::new().on_add(&second, &mut store).unwrap();
        assert_eq!(outcome2.commands.len(), 1);
        let args = serde_json::to_value(&outcome2.commands[0]).unwrap()["args"].clone();
        assert_eq!(args["project_id"].as_str(), outcome.commands[0].temp_id.as_deref());
    }

    #[test]
    fn test_on_modify_without_remote_id_creates() {
        let mut store = fixture_store();
        let old = TaskRecord {
            remote_id: None,
            ..fixture_task()
        };
        let new = TaskRecord {
            description: "Renamed".to_string(),
            ..old.clone()
        };
        let outcome = Adapter::new().on_modify(&old, &new, &mut store).unwrap();
        assert_eq!(outcome.feedback, Feedback::CreatedMissing);
        assert_eq!(outcome.commands.len(), 1);
        assert_eq!(outcome.commands[0].kind(), "item_add");
    }

    #[test]
    fn test_on_modify_orders_commands() {
        let mut store = fixture_store();
        let old = fixture_task();
        let new = TaskRecord {
            description: "Done and moved".to_string(),
            project: Some("Personal".to_string()),
            status: TaskStatus::Completed,
            ..old.clone()
        };
        let outcome = Adapter::new().on_modify(&old, &new, &mut store).unwrap();
        let kinds: Vec<_> = outcome.commands.iter().map(Command::kind).collect();
        assert_eq!(kinds, vec!["item_update", "item_move", "item_complete"]);
        assert_eq!(outcome.feedback.to_string(), "item updated, moved, and completed");
    }

    #[test]
    fn test_on_modify_delete_only() {
        let mut store = fixture_store();
        let old = fixture_task();
        let new = TaskRecord {
            status: TaskStatus::Deleted,
            ..old.clone()
        };
        let outcome = Adapter::new().on_modify(&old, &new, &mut store).unwrap();
        assert_eq!(outcome.commands.len(), 1);
        assert_eq!(outcome.feedback.to_string(), "item deleted");
    }

    #[test]
    fn test_on_modify_data_integrity() {
        let mut store = DataStore::in_memory();
        let old = TaskRecord {
            project: Some("Personal".to_string()),
            ..fixture_task()
        };
        let new = TaskRecord {
            project: None,
            ..old.clone()
        };
        let err = Adapter::new().on_modify(&old, &new, &mut store).unwrap_err();
        assert!(matches!(err, AdapterError::NoInbox));
        assert_eq!(store.staged_len(), 0);
    }

    fn arb_task() -> impl Strategy<Value = TaskRecord> {
        (
            "[a-zA-Z ]{0,20}",
            prop::option::of(prop::sample::select(vec!["Inbox", "Personal", "Work"])),
            prop::option::of(prop::sample::select(vec!["Recents", "Backlog"])),
            prop::collection::btree_set("[a-z]{1,6}", 0..3),
            prop::sample::select(vec![
                TaskStatus::Pending,
                TaskStatus::Completed,
                TaskStatus::Deleted,
                TaskStatus::Waiting,
            ]),
        )
            .prop_map(|(description, project, section, tags, status)| TaskRecord {
                description,
                project: project.map(str::to_string),
                section: section.map(str::to_string),
                tags,
                status,
                ..fixture_task()
            })
    }

    proptest! {
        #[test]
        fn prop_identical_snapshots_need_no_commands(task in arb_task()) {
            let mut store = fixture_store();
            let outcome = Adapter::new().on_modify(&task, &task, &mut store).unwrap();
            prop_assert!(outcome.commands.is_empty());
            prop_assert_eq!(outcome.feedback.to_string(), "update not required");
            prop_assert_eq!(store.staged_len(), 0);
        }
    }
}
