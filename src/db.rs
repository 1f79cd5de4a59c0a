//! JSON file database.
//!
//! This module provides the `Database` struct holding tasks, projects and
//! tags in memory, loaded from and saved to a single JSON file. It is the
//! [`TaskStore`] the command line uses.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::store::{StoreResult, TaskFilter, TaskStore};
use crate::task::{Project, Tag, Task, TaskId};

/// In-memory database for storing and managing tasks.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Database {
    pub tasks: BTreeMap<TaskId, Task>,
    #[serde(default)]
    pub projects: BTreeMap<String, Project>,
    #[serde(default)]
    pub tags: BTreeMap<String, Tag>,
}

impl Database {
    /// Load the database from a JSON file. A missing file is an empty
    /// database; an unreadable or malformed one is an error.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let buf = match fs::read_to_string(path) {
            Ok(buf) => buf,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no database yet, starting empty");
                return Ok(Database::default());
            }
            Err(e) => return Err(e.into()),
        };
        let db: Database = serde_json::from_str(&buf)?;
        debug!(path = %path.display(), tasks = db.tasks.len(), "loaded database");
        Ok(db)
    }

    /// Save the database to a JSON file using atomic write (temp file + rename).
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(self)?;
        let mut f = File::create(&tmp)?;
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, path)?;
        debug!(path = %path.display(), tasks = self.tasks.len(), "saved database");
        Ok(())
    }
}

impl TaskStore for Database {
    fn insert(&mut self, task: Task) -> StoreResult<TaskId> {
        let id = task.id;
        if self.tasks.contains_key(&id) {
            return Err(StoreError::Duplicate(id));
        }
        self.tasks.insert(id, task);
        Ok(id)
    }

    fn get(&self, id: TaskId) -> StoreResult<Task> {
        self.tasks.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    fn find(&self, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        Ok(self.tasks.values().filter(|t| filter.matches(t)).cloned().collect())
    }

    fn update(&mut self, task: &Task) -> StoreResult<()> {
        let slot = self.tasks.get_mut(&task.id).ok_or(StoreError::NotFound(task.id))?;
        *slot = task.clone();
        Ok(())
    }

    fn ids_with_prefix(&self, prefix: &str) -> StoreResult<Vec<TaskId>> {
        let prefix = prefix.to_uppercase();
        Ok(self
            .tasks
            .keys()
            .filter(|id| id.to_string().starts_with(&prefix))
            .copied()
            .collect())
    }

    fn last_id(&self) -> StoreResult<Option<TaskId>> {
        Ok(self.tasks.keys().next_back().copied())
    }

    fn ensure_project(&mut self, name: &str) -> StoreResult<()> {
        if !self.projects.contains_key(name) {
            debug!(project = name, "created project");
            self.projects.insert(
                name.to_string(),
                Project { name: name.to_string(), description: None },
            );
        }
        Ok(())
    }

    fn ensure_tag(&mut self, name: &str) -> StoreResult<()> {
        if !self.tags.contains_key(name) {
            debug!(tag = name, "created tag");
            self.tags.insert(name.to_string(), Tag { name: name.to_string(), description: None });
        }
        Ok(())
    }

    fn projects(&self) -> StoreResult<Vec<Project>> {
        Ok(self.projects.values().cloned().collect())
    }

    fn tags(&self) -> StoreResult<Vec<Tag>> {
        Ok(self.tags.values().cloned().collect())
    }
}
