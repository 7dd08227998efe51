//! DataStore: in-memory collections backed by per-resource JSON files

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::INBOX_PROJECT_NAME;
use crate::entities::{Entity, Item, Label, Project, ResourceType, Section, SyncPayload};
use crate::error::StoreError;
use crate::tokens::SyncTokens;

const TOKENS_FILE: &str = "sync_tokens.json";
const LOCK_FILE: &str = ".lock";

/// Write `contents` to `path` via a temp file in the same directory and a rename
pub fn atomic_write(path: &Path, contents: &str) -> Result<(), StoreError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("unknown");
    let temp_path = parent.join(format!(".{}.tmp.{}", file_name, std::process::id()));

    fs::write(&temp_path, contents).map_err(|e| StoreError::io(&temp_path, e))?;
    fs::rename(&temp_path, path).map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

/// Local mirror of the remote account
///
/// Projects and sections created by operations that have not been pushed yet
/// live in a staging overlay under their temp ids. Lookups see them, cache
/// files never do.
#[derive(Debug, Default)]
pub struct DataStore {
    basedir: Option<PathBuf>,
    items: Vec<Item>,
    projects: Vec<Project>,
    sections: Vec<Section>,
    labels: Vec<Label>,
    staged_projects: Vec<Project>,
    staged_sections: Vec<Section>,
    tokens: SyncTokens,
    _lock: Option<File>,
}

impl DataStore {
    /// A mirror that is never persisted
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open (creating if needed) the mirror rooted at `basedir`
    pub fn open(basedir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let basedir = basedir.as_ref().to_path_buf();
        debug!(?basedir, "DataStore::open: called");
        fs::create_dir_all(&basedir).map_err(|e| StoreError::io(&basedir, e))?;

        let store = Self {
            items: load_collection(&basedir)?,
            projects: load_collection(&basedir)?,
            sections: load_collection(&basedir)?,
            labels: load_collection(&basedir)?,
            tokens: SyncTokens::load(&basedir.join(TOKENS_FILE))?,
            basedir: Some(basedir),
            ..Self::default()
        };
        debug!(
            items = store.items.len(),
            projects = store.projects.len(),
            sections = store.sections.len(),
            labels = store.labels.len(),
            "DataStore::open: loaded"
        );
        Ok(store)
    }

    /// Take the mirror's lock file; held until the store is dropped
    pub fn lock_exclusive(&mut self) -> Result<(), StoreError> {
        let Some(basedir) = &self.basedir else {
            return Ok(());
        };
        let path = basedir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;
        file.try_lock_exclusive()
            .map_err(|_| StoreError::Locked(basedir.clone()))?;
        debug!(?path, "DataStore::lock_exclusive: acquired");
        self._lock = Some(file);
        Ok(())
    }

    pub fn basedir(&self) -> Option<&Path> {
        self.basedir.as_deref()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn tokens(&self) -> &SyncTokens {
        &self.tokens
    }

    /// Merge an incremental pull response and persist it
    pub fn update(&mut self, payload: SyncPayload, types: &[ResourceType]) -> Result<(), StoreError> {
        self.apply(payload, types, false)
    }

    /// Replace the cached collections with a full-sync response and persist it
    pub fn overwrite(&mut self, payload: SyncPayload, types: &[ResourceType]) -> Result<(), StoreError> {
        self.apply(payload, types, true)
    }

    fn apply(&mut self, mut payload: SyncPayload, types: &[ResourceType], full: bool) -> Result<(), StoreError> {
        debug!(?types, full, token = %payload.sync_token, "DataStore::apply: called");
        for rt in types {
            match rt {
                ResourceType::Items => absorb(&mut self.items, payload.items.take(), full),
                ResourceType::Projects => absorb(&mut self.projects, payload.projects.take(), full),
                ResourceType::Sections => absorb(&mut self.sections, payload.sections.take(), full),
                ResourceType::Labels => absorb(&mut self.labels, payload.labels.take(), full),
            }
        }
        self.save(types)?;

        // Tokens only advance once the collections they cover are on disk
        self.tokens.set(&payload.sync_token, types);
        self.save_tokens()?;
        info!(?types, full, "Mirror updated");
        Ok(())
    }

    /// Persist the given collections
    pub fn save(&self, types: &[ResourceType]) -> Result<(), StoreError> {
        let Some(basedir) = &self.basedir else {
            return Ok(());
        };
        for rt in types {
            let path = basedir.join(rt.file_name());
            let content = match rt {
                ResourceType::Items => serde_json::to_string_pretty(&self.items)?,
                ResourceType::Projects => serde_json::to_string_pretty(&self.projects)?,
                ResourceType::Sections => serde_json::to_string_pretty(&self.sections)?,
                ResourceType::Labels => serde_json::to_string_pretty(&self.labels)?,
            };
            atomic_write(&path, &content)?;
            debug!(?path, "DataStore::save: wrote collection");
        }
        Ok(())
    }

    pub fn save_tokens(&self) -> Result<(), StoreError> {
        match &self.basedir {
            Some(basedir) => self.tokens.save(&basedir.join(TOKENS_FILE)),
            None => Ok(()),
        }
    }

    /// Forget the sync tokens for `types` so the next pull is a full one
    pub fn reset_tokens(&mut self, types: &[ResourceType]) -> Result<(), StoreError> {
        self.tokens.reset(types);
        self.save_tokens()
    }

    /// First element of `resource` whose fields equal every `(field, value)` pair
    pub fn find(&self, resource: ResourceType, fields: &[(&str, Value)]) -> Option<Value> {
        self.values(resource).into_iter().find(|v| matches_fields(v, fields))
    }

    /// Every element of `resource` whose fields equal every `(field, value)` pair
    pub fn find_all(&self, resource: ResourceType, fields: &[(&str, Value)]) -> Vec<Value> {
        self.values(resource)
            .into_iter()
            .filter(|v| matches_fields(v, fields))
            .collect()
    }

    fn values(&self, resource: ResourceType) -> Vec<Value> {
        let converted = match resource {
            ResourceType::Items => to_values(&self.items),
            ResourceType::Projects => to_values(self.projects.iter().chain(&self.staged_projects)),
            ResourceType::Sections => to_values(self.sections.iter().chain(&self.staged_sections)),
            ResourceType::Labels => to_values(&self.labels),
        };
        converted.unwrap_or_else(|e| {
            warn!(%resource, error = %e, "Failed to convert mirror entities for lookup");
            Vec::new()
        })
    }

    /// Live project named `name`, staged projects included
    pub fn find_project(&self, name: &str) -> Option<&Project> {
        self.projects
            .iter()
            .chain(&self.staged_projects)
            .find(|p| p.name == name && !p.is_deleted)
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().chain(&self.staged_projects).find(|p| p.id == id)
    }

    /// Live section named `name` within project `project_id`, staged sections included
    pub fn find_section(&self, name: &str, project_id: &str) -> Option<&Section> {
        self.sections
            .iter()
            .chain(&self.staged_sections)
            .find(|s| s.name == name && s.project_id == project_id && !s.is_deleted)
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().chain(&self.staged_sections).find(|s| s.id == id)
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    /// The account's reserved Inbox project
    pub fn inbox(&self) -> Option<&Project> {
        self.projects
            .iter()
            .find(|p| p.inbox_project && !p.is_deleted)
            .or_else(|| self.find_project(INBOX_PROJECT_NAME))
    }

    /// Record a project whose creation is pending, keyed by its temp id
    pub fn stage_project(&mut self, project: Project) {
        debug!(id = %project.id, name = %project.name, "DataStore::stage_project");
        self.staged_projects.push(project);
    }

    /// Record a section whose creation is pending, keyed by its temp id
    pub fn stage_section(&mut self, section: Section) {
        debug!(id = %section.id, name = %section.name, "DataStore::stage_section");
        self.staged_sections.push(section);
    }

    pub fn staged_len(&self) -> usize {
        self.staged_projects.len() + self.staged_sections.len()
    }

    /// Move staged entities into the mirror under their real ids
    ///
    /// Called after a successful push. Staged entities missing from the
    /// mapping were rejected by the remote and are dropped.
    pub fn commit_staged(&mut self, temp_id_mapping: &HashMap<String, String>) -> Result<(), StoreError> {
        if self.staged_len() == 0 {
            return Ok(());
        }
        debug!(staged = self.staged_len(), "DataStore::commit_staged: called");

        let projects = resolve_staged(std::mem::take(&mut self.staged_projects), temp_id_mapping);
        merge_by_id(&mut self.projects, projects);

        let sections = resolve_staged(std::mem::take(&mut self.staged_sections), temp_id_mapping)
            .into_iter()
            .map(|mut s| {
                if let Some(real) = temp_id_mapping.get(&s.project_id) {
                    s.project_id = real.clone();
                }
                s
            })
            .collect();
        merge_by_id(&mut self.sections, sections);

        self.save(&[ResourceType::Projects, ResourceType::Sections])
    }
}

fn load_collection<T: Entity>(basedir: &Path) -> Result<Vec<T>, StoreError> {
    let path = basedir.join(T::RESOURCE.file_name());
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
    serde_json::from_str(&content).map_err(|source| StoreError::Corrupt { path, source })
}

fn absorb<T: Entity>(collection: &mut Vec<T>, incoming: Option<Vec<T>>, full: bool) {
    let Some(incoming) = incoming else {
        return;
    };
    if full {
        *collection = incoming;
    } else {
        merge_by_id(collection, incoming);
    }
}

/// Replace-by-id merge: matching ids take the incoming fields, the rest are appended
fn merge_by_id<T: Entity>(collection: &mut Vec<T>, incoming: Vec<T>) {
    for mut element in incoming {
        match collection.iter_mut().find(|e| e.id() == element.id()) {
            Some(current) => {
                let mut extra = std::mem::take(current.extra_mut());
                extra.extend(std::mem::take(element.extra_mut()));
                *element.extra_mut() = extra;
                *current = element;
            }
            None => collection.push(element),
        }
    }
}

fn resolve_staged<T: Entity>(staged: Vec<T>, mapping: &HashMap<String, String>) -> Vec<T> {
    staged
        .into_iter()
        .filter_map(|mut e| match mapping.get(e.id()) {
            Some(real) => {
                e.set_id(real.clone());
                Some(e)
            }
            None => {
                warn!(temp_id = %e.id(), "Staged entity has no real id after push, dropping");
                None
            }
        })
        .collect()
}

fn to_values<'a, T: Entity + 'a>(entities: impl IntoIterator<Item = &'a T>) -> Result<Vec<Value>, serde_json::Error> {
    entities.into_iter().map(serde_json::to_value).collect()
}

fn matches_fields(value: &Value, fields: &[(&str, Value)]) -> bool {
    fields.iter().all(|(field, expected)| value.get(field) == Some(expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn fixture_payload() -> SyncPayload {
        let mut inbox = Project::new("1000000000", "Inbox");
        inbox.inbox_project = true;
        SyncPayload {
            sync_token: "token-1".to_string(),
            full_sync: true,
            projects: Some(vec![inbox, Project::new("1000000001", "Personal")]),
            sections: Some(vec![Section::new("100000000", "Recents", "1000000000")]),
            items: Some(vec![Item::new("7173209653", "Test case w/ due_date", "1000000000")]),
            labels: Some(vec![]),
            ..Default::default()
        }
    }

    #[test]
    fn test_open_empty_dir() {
        let temp = TempDir::new().unwrap();
        let store = DataStore::open(temp.path().join("cache")).unwrap();
        assert!(store.items().is_empty());
        assert!(store.tokens().get(&ResourceType::ALL).is_full());
        assert!(temp.path().join("cache").is_dir());
    }

    #[test]
    fn test_overwrite_persists_and_reloads() {
        let temp = TempDir::new().unwrap();
        let mut store = DataStore::open(temp.path()).unwrap();
        store.overwrite(fixture_payload(), &ResourceType::ALL).unwrap();

        let reopened = DataStore::open(temp.path()).unwrap();
        assert_eq!(reopened.projects().len(), 2);
        assert_eq!(reopened.sections().len(), 1);
        assert_eq!(reopened.tokens().get(&ResourceType::ALL).token, "token-1");
        assert!(temp.path().join("items.json").exists());
        assert!(temp.path().join("sync_tokens.json").exists());
    }

    #[test]
    fn test_update_merges_by_id() {
        let mut store = DataStore::in_memory();
        store.overwrite(fixture_payload(), &ResourceType::ALL).unwrap();

        let mut renamed = Item::new("7173209653", "Renamed", "1000000001");
        renamed.extra.insert("child_order".to_string(), json!(4));
        let payload = SyncPayload {
            sync_token: "token-2".to_string(),
            items: Some(vec![renamed, Item::new("42", "Brand new", "1000000000")]),
            ..Default::default()
        };
        store.update(payload, &[ResourceType::Items]).unwrap();

        assert_eq!(store.items().len(), 2);
        let item = store.item("7173209653").unwrap();
        assert_eq!(item.content, "Renamed");
        assert_eq!(item.project_id, "1000000001");
        assert_eq!(item.extra["child_order"], json!(4));
        assert_eq!(store.tokens().get(&[ResourceType::Items]).token, "token-2");
        assert_eq!(store.tokens().get(&[ResourceType::Projects]).token, "token-1");
    }

    #[test]
    fn test_overwrite_replaces_collection() {
        let mut store = DataStore::in_memory();
        store.overwrite(fixture_payload(), &ResourceType::ALL).unwrap();
        let payload = SyncPayload {
            sync_token: "token-3".to_string(),
            full_sync: true,
            projects: Some(vec![Project::new("9", "Solo")]),
            ..Default::default()
        };
        store.overwrite(payload, &[ResourceType::Projects]).unwrap();
        assert_eq!(store.projects().len(), 1);
        assert_eq!(store.items().len(), 1);
    }

    #[test]
    fn test_find_by_fields() {
        let mut store = DataStore::in_memory();
        store.overwrite(fixture_payload(), &ResourceType::ALL).unwrap();

        let found = store.find(ResourceType::Projects, &[("name", json!("Personal"))]).unwrap();
        assert_eq!(found["id"], "1000000001");

        let found = store.find(
            ResourceType::Sections,
            &[("name", json!("Recents")), ("project_id", json!("1000000000"))],
        );
        assert!(found.is_some());
        assert!(
            store
                .find(ResourceType::Sections, &[("name", json!("Recents")), ("project_id", json!("x"))])
                .is_none()
        );
        assert_eq!(store.find_all(ResourceType::Projects, &[]).len(), 2);
    }

    #[test]
    fn test_inbox_lookup() {
        let mut store = DataStore::in_memory();
        assert!(store.inbox().is_none());
        store.overwrite(fixture_payload(), &ResourceType::ALL).unwrap();
        assert_eq!(store.inbox().unwrap().id, "1000000000");
    }

    #[test]
    fn test_inbox_found_by_name_without_flag() {
        let mut store = DataStore::in_memory();
        let payload = SyncPayload {
            sync_token: "t".to_string(),
            projects: Some(vec![Project::new("5", "Inbox")]),
            ..Default::default()
        };
        store.update(payload, &[ResourceType::Projects]).unwrap();
        assert_eq!(store.inbox().unwrap().id, "5");
    }

    #[test]
    fn test_deleted_project_not_found_by_name() {
        let mut store = DataStore::in_memory();
        let mut gone = Project::new("7", "Work");
        gone.is_deleted = true;
        let payload = SyncPayload {
            sync_token: "t".to_string(),
            projects: Some(vec![gone]),
            ..Default::default()
        };
        store.update(payload, &[ResourceType::Projects]).unwrap();
        assert!(store.find_project("Work").is_none());
        assert!(store.project("7").is_some());
    }

    #[test]
    fn test_staged_entities_visible_then_committed() {
        let temp = TempDir::new().unwrap();
        let mut store = DataStore::open(temp.path()).unwrap();
        store.stage_project(Project::new("tmp-p", "Work"));
        store.stage_section(Section::new("tmp-s", "Backlog", "tmp-p"));

        assert_eq!(store.find_project("Work").unwrap().id, "tmp-p");
        assert!(store.find_section("Backlog", "tmp-p").is_some());

        let mapping = HashMap::from([
            ("tmp-p".to_string(), "2000".to_string()),
            ("tmp-s".to_string(), "3000".to_string()),
        ]);
        store.commit_staged(&mapping).unwrap();

        assert_eq!(store.staged_len(), 0);
        assert_eq!(store.find_project("Work").unwrap().id, "2000");
        let section = store.find_section("Backlog", "2000").unwrap();
        assert_eq!(section.id, "3000");

        let reopened = DataStore::open(temp.path()).unwrap();
        assert_eq!(reopened.projects().len(), 1);
        assert_eq!(reopened.sections().len(), 1);
    }

    #[test]
    fn test_commit_drops_unmapped_staged() {
        let mut store = DataStore::in_memory();
        store.stage_project(Project::new("tmp-p", "Work"));
        store.commit_staged(&HashMap::new()).unwrap();
        assert!(store.find_project("Work").is_none());
        assert_eq!(store.staged_len(), 0);
    }

    #[test]
    fn test_lock_is_exclusive() {
        let temp = TempDir::new().unwrap();
        let mut first = DataStore::open(temp.path()).unwrap();
        first.lock_exclusive().unwrap();

        let mut second = DataStore::open(temp.path()).unwrap();
        assert!(matches!(second.lock_exclusive(), Err(StoreError::Locked(_))));

        drop(first);
        second.lock_exclusive().unwrap();
    }

    #[test]
    fn test_corrupt_collection_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("projects.json"), "{not an array").unwrap();
        assert!(matches!(DataStore::open(temp.path()), Err(StoreError::Corrupt { .. })));
    }
}
