//! Field-level diff functions
//!
//! Each function compares snapshots (and consults the mirror for names) and
//! returns the remote commands that bring the remote item in line. None of
//! them touch the mirror; staging created entities is the caller's job.

use syncstore::DataStore;
use tracing::debug;

use super::AdapterError;
use crate::domain::{REMOTE_NO_PRIORITY, TaskRecord, TaskStatus};
use crate::remote::{
    Command, ItemAddArgs, ItemCompleteArgs, ItemMoveArgs, ItemRef, ItemUpdateArgs, Operation,
};

fn remote_ref(task: &TaskRecord) -> Result<&str, AdapterError> {
    task.remote_id
        .as_deref()
        .ok_or(AdapterError::MissingRemoteId(task.uuid))
}

/// Id of the project named `name`, queueing a `project_add` if the mirror has none
fn resolve_project(name: &str, store: &DataStore, ops: &mut Vec<Command>) -> Result<String, AdapterError> {
    if let Some(project) = store.find_project(name) {
        return Ok(project.id.clone());
    }
    if let Some(pending) = ops.iter().find(|c| matches!(&c.op, Operation::ProjectAdd(a) if a.name == name)) {
        return pending.temp_id.clone().ok_or(AdapterError::MissingTempId);
    }
    let create = Command::project_add(name);
    let temp_id = create.temp_id.clone().ok_or(AdapterError::MissingTempId)?;
    debug!(name, %temp_id, "resolve_project: creating project");
    ops.push(create);
    Ok(temp_id)
}

/// Id of the target project, `None` meaning the Inbox
fn resolve_target_project(
    name: Option<&str>,
    store: &DataStore,
    ops: &mut Vec<Command>,
) -> Result<String, AdapterError> {
    match name {
        Some(name) => resolve_project(name, store, ops),
        None => store
            .inbox()
            .map(|p| p.id.clone())
            .ok_or(AdapterError::NoInbox),
    }
}

/// Id of section `name` within `project_id`, queueing a `section_add` if missing
fn resolve_section(
    name: &str,
    project_id: &str,
    store: &DataStore,
    ops: &mut Vec<Command>,
) -> Result<String, AdapterError> {
    if let Some(section) = store.find_section(name, project_id) {
        return Ok(section.id.clone());
    }
    let create = Command::section_add(name, project_id);
    let temp_id = create.temp_id.clone().ok_or(AdapterError::MissingTempId)?;
    debug!(name, project_id, %temp_id, "resolve_section: creating section");
    ops.push(create);
    Ok(temp_id)
}

/// Create `new` remotely under its uuid as temp id
pub fn add(new: &TaskRecord, store: &DataStore) -> Result<Vec<Command>, AdapterError> {
    debug!(uuid = %new.uuid, "add: called");
    let mut ops = Vec::new();

    let project_id = match &new.project {
        Some(name) => Some(resolve_project(name, store, &mut ops)?),
        None => None,
    };
    let section_id = match &new.section {
        Some(name) => {
            let owner = match &project_id {
                Some(id) => id.clone(),
                None => resolve_target_project(None, store, &mut ops)?,
            };
            Some(resolve_section(name, &owner, store, &mut ops)?)
        }
        None => None,
    };

    let args = ItemAddArgs {
        content: new.description.clone(),
        project_id,
        section_id,
        due: new.due.as_ref().map(|d| d.to_remote_due()),
        priority: new.priority.map(|p| p.to_remote()),
        labels: (!new.tags.is_empty()).then(|| new.tags.iter().cloned().collect()),
    };
    ops.push(Command::with_temp_id(Operation::ItemAdd(args), new.uuid.to_string()));
    Ok(ops)
}

/// At most one `item_update` covering content, due, priority and labels
pub fn update(old: &TaskRecord, new: &TaskRecord, _store: &DataStore) -> Result<Vec<Command>, AdapterError> {
    let mut args = ItemUpdateArgs {
        id: remote_ref(new)?.to_string(),
        ..Default::default()
    };

    if old.description != new.description {
        args.content = Some(new.description.clone());
    }

    let old_due = old.due.as_ref().map(|d| d.to_remote_due());
    let new_due = new.due.as_ref().map(|d| d.to_remote_due());
    match (&old_due, &new_due) {
        (_, Some(due)) if old_due.as_ref() != Some(due) => args.due = Some(Some(due.clone())),
        (Some(_), None) => args.due = Some(None),
        _ => {}
    }

    match (old.priority, new.priority) {
        (_, Some(p)) if old.priority != Some(p) => args.priority = Some(p.to_remote()),
        (Some(_), None) => args.priority = Some(REMOTE_NO_PRIORITY),
        _ => {}
    }

    let old_tags = !old.tags.is_empty();
    let new_tags = !new.tags.is_empty();
    if new_tags && old.tags != new.tags {
        args.labels = Some(new.tags.iter().cloned().collect());
    } else if old_tags && !new_tags {
        args.labels = Some(Vec::new());
    }

    if args.is_empty() {
        return Ok(Vec::new());
    }
    debug!(id = %args.id, "update: fields changed");
    Ok(vec![Command::new(Operation::ItemUpdate(args))])
}

/// `item_move` when the effective project or section changed
pub fn move_item(old: &TaskRecord, new: &TaskRecord, store: &DataStore) -> Result<Vec<Command>, AdapterError> {
    let project_changed = old.project != new.project;
    let section_changed = old.section != new.section;
    if !project_changed && !section_changed {
        return Ok(Vec::new());
    }
    debug!(old_project = ?old.project, new_project = ?new.project, old_section = ?old.section, new_section = ?new.section, "move_item: location changed");

    let mut ops = Vec::new();
    let project_id = resolve_target_project(new.project.as_deref(), store, &mut ops)?;
    let mut args = ItemMoveArgs {
        id: remote_ref(new)?.to_string(),
        ..Default::default()
    };
    if project_changed {
        args.project_id = Some(project_id.clone());
    }

    match &new.section {
        Some(name) => {
            // section_id implies the project, and the remote refuses both
            args.section_id = Some(resolve_section(name, &project_id, store, &mut ops)?);
            args.project_id = None;
        }
        None if section_changed => {
            // Leaving a section needs the owning project spelled out
            args.project_id = Some(project_id);
        }
        None => {}
    }

    ops.push(Command::new(Operation::ItemMove(args)));
    Ok(ops)
}

pub fn delete(old: &TaskRecord, new: &TaskRecord, _store: &DataStore) -> Result<Vec<Command>, AdapterError> {
    if old.status == TaskStatus::Deleted || new.status != TaskStatus::Deleted {
        return Ok(Vec::new());
    }
    let id = remote_ref(new)?.to_string();
    Ok(vec![Command::new(Operation::ItemDelete(ItemRef { id }))])
}

pub fn complete(old: &TaskRecord, new: &TaskRecord, _store: &DataStore) -> Result<Vec<Command>, AdapterError> {
    if old.status == TaskStatus::Completed || new.status != TaskStatus::Completed {
        return Ok(Vec::new());
    }
    let args = ItemCompleteArgs {
        id: remote_ref(new)?.to_string(),
        date_completed: new.end.as_ref().map(|end| end.to_fixed_string()),
    };
    Ok(vec![Command::new(Operation::ItemComplete(args))])
}

pub fn uncomplete(old: &TaskRecord, new: &TaskRecord, _store: &DataStore) -> Result<Vec<Command>, AdapterError> {
    if old.status != TaskStatus::Completed || new.status == TaskStatus::Completed {
        return Ok(Vec::new());
    }
    let id = remote_ref(new)?.to_string();
    Ok(vec![Command::new(Operation::ItemUncomplete(ItemRef { id }))])
}
