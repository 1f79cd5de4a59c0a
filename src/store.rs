//! Storage contract consumed by the lifecycle manager.
//!
//! Each call is synchronous and atomic on its own. A cascade is a sequence of
//! separate calls; nothing here groups them into a transaction.

use crate::error::StoreError;
use crate::fields::State;
use crate::task::{Project, Tag, Task, TaskId};

pub type StoreResult<T> = Result<T, StoreError>;

/// Task persistence.
pub trait TaskStore {
    /// Store a new task and return its identifier.
    ///
    /// Fails with [`StoreError::Duplicate`] if the identifier is taken.
    fn insert(&mut self, task: Task) -> StoreResult<TaskId>;

    /// Fetch one task, [`StoreError::NotFound`] if absent.
    fn get(&self, id: TaskId) -> StoreResult<Task>;

    /// All tasks matching `filter`, ordered by identifier.
    fn find(&self, filter: &TaskFilter) -> StoreResult<Vec<Task>>;

    /// Replace the stored record with `task`.
    fn update(&mut self, task: &Task) -> StoreResult<()>;

    /// Identifiers whose textual form starts with `prefix` (case-insensitive).
    fn ids_with_prefix(&self, prefix: &str) -> StoreResult<Vec<TaskId>>;

    /// The newest identifier handed out so far.
    fn last_id(&self) -> StoreResult<Option<TaskId>>;

    /// Create the project if it does not exist yet.
    fn ensure_project(&mut self, name: &str) -> StoreResult<()>;

    /// Create the tag if it does not exist yet.
    fn ensure_tag(&mut self, name: &str) -> StoreResult<()>;

    fn projects(&self) -> StoreResult<Vec<Project>>;

    fn tags(&self) -> StoreResult<Vec<Tag>>;
}

/// Conjunction of optional task predicates. The default matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub states: Vec<State>,
    pub parent: Option<TaskId>,
    pub template: Option<TaskId>,
    pub templates_only: Option<bool>,
    pub project: Option<String>,
    pub tag: Option<String>,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_states(mut self, states: impl IntoIterator<Item = State>) -> Self {
        self.states = states.into_iter().collect();
        self
    }

    /// Tasks directly below `id`: its sub-tasks and, for a template, its
    /// instances.
    pub fn children_of(id: TaskId) -> Self {
        TaskFilter { parent: Some(id), ..Self::default() }
    }

    pub fn instances_of(template: TaskId) -> Self {
        TaskFilter { template: Some(template), ..Self::default() }
    }

    pub fn templates(mut self, only_templates: bool) -> Self {
        self.templates_only = Some(only_templates);
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        if !self.states.is_empty() && !self.states.contains(&task.state) {
            return false;
        }
        if let Some(parent) = self.parent {
            if task.parent != Some(parent) && task.template() != Some(parent) {
                return false;
            }
        }
        if let Some(template) = self.template {
            if task.template() != Some(template) {
                return false;
            }
        }
        if let Some(only_templates) = self.templates_only {
            if task.is_template() != only_templates {
                return false;
            }
        }
        if let Some(project) = &self.project {
            if task.project.as_ref() != Some(project) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !task.tags.contains(tag) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Kind;
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn task(description: &str) -> Task {
        let created = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid date");
        Task::new(TaskId::from_ulid(Ulid::new()), description, created)
    }

    #[test]
    fn default_filter_matches_everything() {
        let mut closed = task("closed");
        closed.state = State::Deleted;
        assert!(TaskFilter::new().matches(&task("open")));
        assert!(TaskFilter::new().matches(&closed));
    }

    #[test]
    fn children_filter_covers_subtasks_and_instances() {
        let parent = task("parent");
        let mut subtask = task("subtask");
        subtask.parent = Some(parent.id);
        let mut instance = task("instance");
        instance.kind = Kind::Instance { template: parent.id };
        let unrelated = task("unrelated");

        let filter = TaskFilter::children_of(parent.id);
        assert!(filter.matches(&subtask));
        assert!(filter.matches(&instance));
        assert!(!filter.matches(&unrelated));
        assert!(!TaskFilter::instances_of(parent.id).matches(&subtask));
    }

    #[test]
    fn predicates_combine() {
        let mut t = task("tagged");
        t.project = Some("home".into());
        t.tags.insert("errand".into());

        assert!(TaskFilter::new().with_project("home").with_tag("errand").matches(&t));
        assert!(!TaskFilter::new().with_project("work").with_tag("errand").matches(&t));
        assert!(!TaskFilter::new().with_states([State::Frozen]).matches(&t));
        assert!(TaskFilter::new().templates(false).matches(&t));
    }
}
