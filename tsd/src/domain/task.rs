//! TaskRecord: a snapshot of one local task

use std::collections::BTreeSet;
use std::fmt;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use syncstore::{DataStore, Item};
use thiserror::Error;
use uuid::Uuid;

use super::datetime::{DateParseError, SyncDateTime};

#[derive(Debug, Error)]
pub enum TaskParseError {
    #[error("Invalid task JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid {field}: {source}")]
    Date {
        field: &'static str,
        #[source]
        source: DateParseError,
    },

    #[error("Invalid priority '{0}'")]
    Priority(String),

    #[error("Unknown time zone '{0}'")]
    Zone(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Deleted,
    Waiting,
    Recurring,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Deleted => "deleted",
            TaskStatus::Waiting => "waiting",
            TaskStatus::Recurring => "recurring",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local priority; the remote scale is the same shifted up by one,
/// with remote 1 meaning "none"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    L = 1,
    M = 2,
    H = 3,
}

impl Priority {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "L" => Some(Priority::L),
            "M" => Some(Priority::M),
            "H" => Some(Priority::H),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Priority::L => "L",
            Priority::M => "M",
            Priority::H => "H",
        }
    }

    pub fn value(&self) -> u8 {
        *self as u8
    }

    pub fn to_remote(&self) -> u8 {
        self.value() + 1
    }

    pub fn from_remote(value: u8) -> Option<Self> {
        match value {
            2 => Some(Priority::L),
            3 => Some(Priority::M),
            4 => Some(Priority::H),
            _ => None,
        }
    }
}

/// Remote priority meaning "no priority"
pub const REMOTE_NO_PRIORITY: u8 = 1;

/// Wire shape of a task as the local database exports it
#[derive(Debug, Deserialize)]
struct TaskJson {
    uuid: Uuid,
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    description: String,
    status: TaskStatus,
    #[serde(default)]
    entry: Option<String>,
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    due: Option<String>,
    #[serde(default)]
    until: Option<String>,
    #[serde(default)]
    wait: Option<String>,
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    section: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    todoist: Option<RemoteIdJson>,
    #[serde(default)]
    timezone: Option<String>,
}

/// The remote id attribute may be declared as a string or a numeric attribute
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RemoteIdJson {
    Text(String),
    Number(serde_json::Number),
}

impl RemoteIdJson {
    fn into_id(self) -> Option<String> {
        let id = match self {
            RemoteIdJson::Text(s) => s.trim().to_string(),
            RemoteIdJson::Number(n) => match n.as_u64() {
                Some(v) => v.to_string(),
                None => n.as_f64().map(|f| format!("{:.0}", f)).unwrap_or_default(),
            },
        };
        (!id.is_empty()).then_some(id)
    }
}

/// Snapshot of a local task
///
/// Built fresh from every hook payload and never mutated afterwards; an edit
/// produces an "old" and a "new" instance.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub uuid: Uuid,
    pub id: Option<u64>,
    pub description: String,
    pub status: TaskStatus,
    pub entry: Option<SyncDateTime>,
    pub start: Option<SyncDateTime>,
    pub end: Option<SyncDateTime>,
    pub due: Option<SyncDateTime>,
    pub until: Option<SyncDateTime>,
    pub wait: Option<SyncDateTime>,
    pub project: Option<String>,
    pub section: Option<String>,
    pub tags: BTreeSet<String>,
    pub priority: Option<Priority>,
    /// `None` until the task has been pushed to the remote service
    pub remote_id: Option<String>,
    pub timezone: Tz,
}

impl TaskRecord {
    pub fn new(description: impl Into<String>, timezone: Tz) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            id: None,
            description: description.into(),
            status: TaskStatus::Pending,
            entry: None,
            start: None,
            end: None,
            due: None,
            until: None,
            wait: None,
            project: None,
            section: None,
            tags: BTreeSet::new(),
            priority: None,
            remote_id: None,
            timezone,
        }
    }

    /// Parse one exported task line; tasks without a zone use `default_tz`
    pub fn from_json(line: &str, default_tz: Tz) -> Result<Self, TaskParseError> {
        let raw: TaskJson = serde_json::from_str(line.trim())?;
        Self::from_task_json(raw, default_tz)
    }

    pub fn from_value(value: Value, default_tz: Tz) -> Result<Self, TaskParseError> {
        let raw: TaskJson = serde_json::from_value(value)?;
        Self::from_task_json(raw, default_tz)
    }

    fn from_task_json(raw: TaskJson, default_tz: Tz) -> Result<Self, TaskParseError> {
        let timezone = match non_empty(raw.timezone) {
            Some(name) => name.parse::<Tz>().map_err(|_| TaskParseError::Zone(name))?,
            None => default_tz,
        };
        let date = |field: &'static str, value: Option<String>| -> Result<Option<SyncDateTime>, TaskParseError> {
            non_empty(value)
                .map(|v| SyncDateTime::parse_local(&v, timezone))
                .transpose()
                .map_err(|source| TaskParseError::Date { field, source })
        };
        let priority = match non_empty(raw.priority) {
            Some(code) => Some(Priority::from_code(&code).ok_or(TaskParseError::Priority(code))?),
            None => None,
        };

        Ok(Self {
            uuid: raw.uuid,
            id: raw.id.filter(|id| *id != 0),
            description: raw.description,
            status: raw.status,
            entry: date("entry", raw.entry)?,
            start: date("start", raw.start)?,
            end: date("end", raw.end)?,
            due: date("due", raw.due)?,
            until: date("until", raw.until)?,
            wait: date("wait", raw.wait)?,
            project: non_empty(raw.project),
            section: non_empty(raw.section),
            tags: raw.tags.into_iter().filter(|t| !t.is_empty()).collect(),
            priority,
            remote_id: raw.todoist.and_then(RemoteIdJson::into_id),
            timezone,
        })
    }

    /// Build the local view of a remote item, resolving project and section names from the mirror
    pub fn from_remote(item: &Item, store: &DataStore, default_tz: Tz) -> Result<Self, TaskParseError> {
        let due = item
            .due
            .as_ref()
            .map(|d| SyncDateTime::from_remote_due(d, default_tz))
            .transpose()
            .map_err(|source| TaskParseError::Date { field: "due", source })?;
        let timezone = due.as_ref().map(|d| d.timezone()).unwrap_or(default_tz);
        let instant = |field: &'static str, raw: Option<&str>| -> Result<Option<SyncDateTime>, TaskParseError> {
            raw.map(|r| SyncDateTime::parse_instant(r, timezone))
                .transpose()
                .map_err(|source| TaskParseError::Date { field, source })
        };

        let status = if item.is_deleted {
            TaskStatus::Deleted
        } else if item.is_completed() {
            TaskStatus::Completed
        } else {
            TaskStatus::Pending
        };

        Ok(Self {
            uuid: remote_task_uuid(&item.id),
            id: None,
            description: item.content.clone(),
            status,
            entry: instant("entry", item.extra.get("added_at").and_then(Value::as_str))?,
            start: None,
            end: instant("end", item.completed_at.as_deref())?,
            due,
            until: None,
            wait: None,
            project: store
                .project(&item.project_id)
                .filter(|p| store.inbox().is_none_or(|inbox| inbox.id != p.id))
                .map(|p| p.name.clone()),
            section: item
                .section_id
                .as_deref()
                .and_then(|id| store.section(id))
                .map(|s| s.name.clone()),
            tags: item.labels.iter().cloned().collect(),
            priority: Priority::from_remote(item.priority),
            remote_id: Some(item.id.clone()),
            timezone,
        })
    }

    /// Serialise back into the local database's import format
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("uuid".into(), json!(self.uuid.to_string()));
        if let Some(id) = self.id {
            obj.insert("id".into(), json!(id));
        }
        obj.insert("description".into(), json!(self.description));
        obj.insert("status".into(), json!(self.status.as_str()));
        for (field, value) in [
            ("entry", &self.entry),
            ("start", &self.start),
            ("end", &self.end),
            ("due", &self.due),
            ("until", &self.until),
            ("wait", &self.wait),
        ] {
            if let Some(dt) = value {
                obj.insert(field.into(), json!(dt.to_local_string()));
            }
        }
        if let Some(project) = &self.project {
            obj.insert("project".into(), json!(project));
        }
        if let Some(section) = &self.section {
            obj.insert("section".into(), json!(section));
        }
        if !self.tags.is_empty() {
            obj.insert("tags".into(), json!(self.tags));
        }
        if let Some(priority) = self.priority {
            obj.insert("priority".into(), json!(priority.code()));
        }
        if let Some(remote_id) = &self.remote_id {
            obj.insert("todoist".into(), json!(remote_id));
        }
        obj.insert("timezone".into(), json!(self.timezone.name()));
        Value::Object(obj)
    }

    pub fn is_synced(&self) -> bool {
        self.remote_id.is_some()
    }
}

/// Stable local uuid for a remote item, so repeated exports update the same task
pub fn remote_task_uuid(remote_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("todoist:{}", remote_id).as_bytes())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
