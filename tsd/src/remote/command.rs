//! Remote command envelopes
//!
//! Every mutation sent to the remote service is a `Command`:
//! `{type, uuid, temp_id?, args}`. The operation and its arguments are a
//! closed enum so an envelope can never carry arguments for the wrong type.

use serde::Serialize;
use syncstore::Due;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    /// Client-chosen operation id; the remote deduplicates retries by it
    #[serde(rename = "uuid")]
    pub operation_id: Uuid,

    /// Placeholder id for the entity a create-type operation makes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,

    #[serde(flatten)]
    pub op: Operation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "args", rename_all = "snake_case")]
pub enum Operation {
    ItemAdd(ItemAddArgs),
    ItemUpdate(ItemUpdateArgs),
    ItemMove(ItemMoveArgs),
    ItemDelete(ItemRef),
    ItemComplete(ItemCompleteArgs),
    ItemUncomplete(ItemRef),
    ProjectAdd(ProjectAddArgs),
    SectionAdd(SectionAddArgs),
}

impl Operation {
    /// The envelope `type` string
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::ItemAdd(_) => "item_add",
            Operation::ItemUpdate(_) => "item_update",
            Operation::ItemMove(_) => "item_move",
            Operation::ItemDelete(_) => "item_delete",
            Operation::ItemComplete(_) => "item_complete",
            Operation::ItemUncomplete(_) => "item_uncomplete",
            Operation::ProjectAdd(_) => "project_add",
            Operation::SectionAdd(_) => "section_add",
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(
            self,
            Operation::ItemAdd(_) | Operation::ProjectAdd(_) | Operation::SectionAdd(_)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemAddArgs {
    pub content: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<Due>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

/// Only fields that are `Some` are sent; `due: Some(None)` sends an explicit null
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemUpdateArgs {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<Option<Due>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

impl ItemUpdateArgs {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.due.is_none() && self.priority.is_none() && self.labels.is_none()
    }
}

/// `section_id` and `project_id` are mutually exclusive on the remote side
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemMoveArgs {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemCompleteArgs {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_completed: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectAddArgs {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionAddArgs {
    pub name: String,
    pub project_id: String,
}

impl Command {
    pub fn new(op: Operation) -> Self {
        Self {
            operation_id: Uuid::new_v4(),
            temp_id: None,
            op,
        }
    }

    pub fn with_temp_id(op: Operation, temp_id: impl Into<String>) -> Self {
        Self {
            operation_id: Uuid::new_v4(),
            temp_id: Some(temp_id.into()),
            op,
        }
    }

    /// `project_add` under a fresh temp id
    pub fn project_add(name: impl Into<String>) -> Self {
        Self::with_temp_id(
            Operation::ProjectAdd(ProjectAddArgs { name: name.into() }),
            Uuid::new_v4().to_string(),
        )
    }

    /// `section_add` under a fresh temp id
    pub fn section_add(name: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self::with_temp_id(
            Operation::SectionAdd(SectionAddArgs {
                name: name.into(),
                project_id: project_id.into(),
            }),
            Uuid::new_v4().to_string(),
        )
    }

    pub fn kind(&self) -> &'static str {
        self.op.kind()
    }
}
