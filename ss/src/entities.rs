//! Remote entity types as they appear in sync payloads and cache files

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Kinds of remote resources the mirror tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Items,
    Projects,
    Sections,
    Labels,
}

impl ResourceType {
    pub const ALL: [ResourceType; 4] = [
        ResourceType::Items,
        ResourceType::Projects,
        ResourceType::Sections,
        ResourceType::Labels,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Items => "items",
            ResourceType::Projects => "projects",
            ResourceType::Sections => "sections",
            ResourceType::Labels => "labels",
        }
    }

    /// Cache file holding this resource's collection
    pub fn file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "items" => Ok(ResourceType::Items),
            "projects" => Ok(ResourceType::Projects),
            "sections" => Ok(ResourceType::Sections),
            "labels" => Ok(ResourceType::Labels),
            other => Err(StoreError::UnknownResource(other.to_string())),
        }
    }
}

/// Common behaviour of mirrored entities: identity by remote id plus
/// pass-through storage for fields this crate does not model.
pub trait Entity: Clone + Serialize + DeserializeOwned {
    const RESOURCE: ResourceType;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    fn extra_mut(&mut self) -> &mut Map<String, Value>;
}

/// Due value in the remote wire format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Due {
    /// `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS` or a UTC instant, depending on kind
    pub date: String,

    /// Present only for fixed (zoned) due values
    #[serde(default)]
    pub timezone: Option<String>,

    #[serde(default)]
    pub is_recurring: bool,

    /// Human readable form the remote derives from `date`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub inbox_project: bool,

    #[serde(default)]
    pub is_deleted: bool,

    #[serde(default)]
    pub is_archived: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Project {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: None,
            inbox_project: false,
            is_deleted: false,
            is_archived: false,
            extra: Map::new(),
        }
    }
}

impl Entity for Project {
    const RESOURCE: ResourceType = ResourceType::Projects;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn extra_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.extra
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub name: String,
    pub project_id: String,

    #[serde(default)]
    pub is_deleted: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Section {
    pub fn new(id: impl Into<String>, name: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            project_id: project_id.into(),
            is_deleted: false,
            extra: Map::new(),
        }
    }
}

impl Entity for Section {
    const RESOURCE: ResourceType = ResourceType::Sections;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn extra_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.extra
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub is_deleted: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for Label {
    const RESOURCE: ResourceType = ResourceType::Labels;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn extra_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.extra
    }
}

fn default_priority() -> u8 {
    1
}

/// A remote task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub content: String,

    #[serde(default)]
    pub description: String,

    pub project_id: String,

    #[serde(default)]
    pub section_id: Option<String>,

    #[serde(default)]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub due: Option<Due>,

    /// 1 (none) through 4 (urgent)
    #[serde(default = "default_priority")]
    pub priority: u8,

    #[serde(default)]
    pub labels: Vec<String>,

    #[serde(default)]
    pub checked: bool,

    #[serde(default)]
    pub is_deleted: bool,

    #[serde(default)]
    pub completed_at: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Item {
    pub fn new(id: impl Into<String>, content: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            description: String::new(),
            project_id: project_id.into(),
            section_id: None,
            parent_id: None,
            due: None,
            priority: default_priority(),
            labels: Vec::new(),
            checked: false,
            is_deleted: false,
            completed_at: None,
            extra: Map::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.checked || self.completed_at.is_some()
    }
}

impl Entity for Item {
    const RESOURCE: ResourceType = ResourceType::Items;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn extra_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.extra
    }
}

/// Body of a sync (pull) response
///
/// Each collection is present only when it was requested and changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncPayload {
    pub sync_token: String,

    #[serde(default)]
    pub full_sync: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Item>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<Project>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<Section>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<Label>>,

    #[serde(default)]
    pub temp_id_mapping: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_parse_and_display() {
        for rt in ResourceType::ALL {
            let parsed: ResourceType = rt.as_str().parse().unwrap();
            assert_eq!(parsed, rt);
            assert_eq!(rt.to_string(), rt.as_str());
        }
        assert!("notes".parse::<ResourceType>().is_err());
    }

    #[test]
    fn test_item_keeps_unknown_fields() {
        let json = r#"{
            "id": "7173209653",
            "content": "Test case w/ due_date",
            "project_id": "2299975638",
            "priority": 3,
            "labels": ["test2"],
            "child_order": 13,
            "added_by_uid": "41348840"
        }"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.priority, 3);
        assert_eq!(item.extra.get("child_order"), Some(&Value::from(13)));

        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back["added_by_uid"], "41348840");
    }

    #[test]
    fn test_item_priority_defaults_to_none_sentinel() {
        let item: Item = serde_json::from_str(r#"{"id": "1", "content": "x", "project_id": "2"}"#).unwrap();
        assert_eq!(item.priority, 1);
        assert!(!item.is_completed());
    }

    #[test]
    fn test_due_serializes_null_timezone() {
        let due = Due {
            date: "2023-08-28".to_string(),
            timezone: None,
            is_recurring: false,
            string: None,
            lang: None,
        };
        let json = serde_json::to_value(&due).unwrap();
        assert_eq!(json["timezone"], Value::Null);
        assert!(json.get("string").is_none());
    }

    #[test]
    fn test_payload_missing_collections() {
        let payload: SyncPayload = serde_json::from_str(r#"{"sync_token": "abc", "full_sync": false}"#).unwrap();
        assert_eq!(payload.sync_token, "abc");
        assert!(payload.items.is_none());
        assert!(payload.temp_id_mapping.is_empty());
    }
}
