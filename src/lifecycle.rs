//! Task lifecycle manager.
//!
//! Applies parsed attribute sets to stored tasks, enforces the state machine
//! and cascades operations over parent/child relationships:
//!
//! | from        | operation | to        |
//! |-------------|-----------|-----------|
//! | open        | freeze    | frozen    |
//! | frozen      | unfreeze  | open      |
//! | open/frozen | complete  | completed |
//! | open/frozen | delete    | deleted   |
//!
//! Completed and deleted tasks never change again. Closing an instance of a
//! recurring template spawns the next instance.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDateTime;
use mockable::Clock;
use tracing::debug;
use ulid::Ulid;

use crate::dates::midnight;
use crate::error::{LifecycleError, StoreError};
use crate::fields::{Priority, RecurrenceType, State};
use crate::parser::{parse, Attributes, Change, ParsedArgs, RecurrenceDirective};
use crate::recurrence::Recurrence;
use crate::store::{TaskFilter, TaskStore};
use crate::task::{Kind, Task, TaskId};

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Deepest parent/child chain a cascade will walk.
pub const MAX_CASCADE_DEPTH: usize = 32;

/// Defaults the manager falls back on when a command leaves them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub default_priority: Option<Priority>,
    /// Type given to a bare `recur:<n><unit>` on a new template.
    pub default_recurrence_type: RecurrenceType,
}

impl Default for Settings {
    fn default() -> Self {
        Settings { default_priority: None, default_recurrence_type: RecurrenceType::Repeating }
    }
}

/// Tasks touched by one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Tasks modified or transitioned, in the order they were written.
    pub changed: Vec<TaskId>,
    /// Instances created for recurring templates.
    pub spawned: Vec<TaskId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Freeze,
    Unfreeze,
    Complete,
    Delete,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::Freeze => "freeze",
            Operation::Unfreeze => "unfreeze",
            Operation::Complete => "complete",
            Operation::Delete => "delete",
        }
    }

    fn past(self) -> &'static str {
        match self {
            Operation::Freeze => "Froze",
            Operation::Unfreeze => "Unfroze",
            Operation::Complete => "Completed",
            Operation::Delete => "Deleted",
        }
    }

    fn target(self) -> State {
        match self {
            Operation::Freeze => State::Frozen,
            Operation::Unfreeze => State::Open,
            Operation::Complete => State::Completed,
            Operation::Delete => State::Deleted,
        }
    }

    /// Whether a task in `state` can take this operation.
    fn accepts(self, state: State) -> bool {
        match self {
            Operation::Freeze => state == State::Open,
            Operation::Unfreeze => state == State::Frozen,
            Operation::Complete | Operation::Delete => !state.is_terminal(),
        }
    }

    fn closes(self) -> bool {
        self.target().is_terminal()
    }
}

/// Task lifecycle orchestration over a [`TaskStore`].
pub struct TaskManager<S, C>
where
    S: TaskStore,
    C: Clock,
{
    store: S,
    clock: Arc<C>,
    settings: Settings,
}

impl<S, C> TaskManager<S, C>
where
    S: TaskStore,
    C: Clock,
{
    pub fn new(store: S, clock: Arc<C>) -> Self {
        TaskManager { store, clock, settings: Settings::default() }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current local time, the anchor for relative dates.
    pub fn now(&self) -> NaiveDateTime {
        self.clock.local().naive_local()
    }

    /// Parse `tokens` and create the task they describe.
    ///
    /// With a recurrence the new task is a template and its first instance is
    /// created alongside it; the template id is returned.
    pub fn add<T: AsRef<str>>(&mut self, tokens: &[T]) -> LifecycleResult<TaskId> {
        let args = parse(tokens, self.now())?;
        self.add_parsed(args)
    }

    pub fn add_parsed(&mut self, args: ParsedArgs) -> LifecycleResult<TaskId> {
        let description = args
            .description
            .filter(|d| !d.trim().is_empty())
            .ok_or(LifecycleError::EmptyDescription)?;
        let attributes = args.attributes;
        let now = self.now();

        let mut task = Task::new(self.next_id()?, description, now);
        task.priority = self.settings.default_priority;
        if let Some(Change::Set(parent)) = &attributes.parent {
            task.parent = Some(self.resolve_parent(parent, None)?);
        }
        self.apply_fields(&mut task, &attributes)?;

        let Some(directive) = attributes.recur else {
            let id = self.store.insert(task)?;
            debug!(%id, "Added task");
            return Ok(id);
        };

        let recurrence = self.recurrence_from(directive, self.settings.default_recurrence_type);
        let first_due = task.due.unwrap_or_else(|| midnight(now.date()));
        task.due = Some(first_due);
        task.kind = Kind::Template { recurrence };
        let id = self.store.insert(task.clone())?;
        debug!(%id, "Added recurring template");
        self.spawn_instance(&task, first_due)?;
        Ok(id)
    }

    /// Parse `tokens` and apply them to the task named by `reference`.
    pub fn modify<T: AsRef<str>>(&mut self, reference: &str, tokens: &[T]) -> LifecycleResult<Outcome> {
        let args = parse(tokens, self.now())?;
        self.modify_parsed(reference, args, false)
    }

    /// Like [`modify`](Self::modify), additionally copying project, priority,
    /// due, wait and tag changes to every open or frozen descendant.
    pub fn modify_parent<T: AsRef<str>>(
        &mut self,
        reference: &str,
        tokens: &[T],
    ) -> LifecycleResult<Outcome> {
        let args = parse(tokens, self.now())?;
        self.modify_parsed(reference, args, true)
    }

    pub fn modify_parsed(
        &mut self,
        reference: &str,
        args: ParsedArgs,
        cascade: bool,
    ) -> LifecycleResult<Outcome> {
        let mut task = self.resolve(reference)?;
        ensure_not_terminal(&task)?;
        let attributes = args.attributes;

        if let Some(description) = args.description {
            task.description = description;
        }
        match &attributes.parent {
            Some(Change::Set(parent)) => task.parent = Some(self.resolve_parent(parent, Some(task.id))?),
            Some(Change::Clear) => task.parent = None,
            None => {}
        }
        if let Some(directive) = attributes.recur.clone() {
            let Kind::Template { recurrence } = &task.kind else {
                return Err(LifecycleError::NotATemplate(task.id));
            };
            let recurrence = self.recurrence_from(directive, recurrence.recurrence_type);
            task.kind = Kind::Template { recurrence };
        }
        self.apply_fields(&mut task, &attributes)?;
        self.store.update(&task)?;
        debug!(id = %task.id, "Modified task");

        let mut outcome = Outcome { changed: vec![task.id], spawned: Vec::new() };
        if cascade && attributes.has_inheritable() {
            let inherited = attributes.inheritable();
            for mut child in self.open_descendants(task.id)? {
                self.apply_fields(&mut child, &inherited)?;
                self.store.update(&child)?;
                debug!(id = %child.id, parent = %task.id, "Modified child task");
                outcome.changed.push(child.id);
            }
        }
        Ok(outcome)
    }

    pub fn freeze(&mut self, reference: &str, cascade: bool) -> LifecycleResult<Outcome> {
        self.transition(reference, Operation::Freeze, cascade)
    }

    pub fn unfreeze(&mut self, reference: &str, cascade: bool) -> LifecycleResult<Outcome> {
        self.transition(reference, Operation::Unfreeze, cascade)
    }

    /// Complete a task. Children are left alone unless `cascade` is set, in
    /// which case they are completed first.
    pub fn complete(&mut self, reference: &str, cascade: bool) -> LifecycleResult<Outcome> {
        self.transition(reference, Operation::Complete, cascade)
    }

    /// Delete a task. Without `cascade`, open or frozen children make this
    /// fail with [`LifecycleError::HasOpenChildren`].
    pub fn delete(&mut self, reference: &str, cascade: bool) -> LifecycleResult<Outcome> {
        self.transition(reference, Operation::Delete, cascade)
    }

    /// Resolve a full identifier or a unique prefix of one.
    ///
    /// A full identifier matches any task. A prefix only considers tasks that
    /// are not deleted and fails with [`LifecycleError::AmbiguousId`] when
    /// more than one matches.
    pub fn resolve(&self, reference: &str) -> LifecycleResult<Task> {
        let reference = reference.trim();
        let not_found = || LifecycleError::NotFound(reference.to_string());
        if reference.is_empty() {
            return Err(not_found());
        }

        if let Ok(id) = reference.parse::<TaskId>() {
            match self.store.get(id) {
                Ok(task) => return Ok(task),
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let mut candidates = Vec::new();
        for id in self.store.ids_with_prefix(reference)? {
            let task = self.store.get(id)?;
            if task.state != State::Deleted {
                candidates.push(task);
            }
        }
        match candidates.len() {
            0 => Err(not_found()),
            1 => candidates.pop().ok_or_else(not_found),
            _ => Err(LifecycleError::AmbiguousId {
                prefix: reference.to_string(),
                matches: candidates.iter().map(|t| t.id).collect(),
            }),
        }
    }

    pub fn resolve_id(&self, reference: &str) -> LifecycleResult<TaskId> {
        self.resolve(reference).map(|t| t.id)
    }

    fn transition(
        &mut self,
        reference: &str,
        operation: Operation,
        cascade: bool,
    ) -> LifecycleResult<Outcome> {
        let task = self.resolve(reference)?;
        ensure_not_terminal(&task)?;
        // A template only completes together with its series.
        let template_alone = operation == Operation::Complete && task.is_template() && !cascade;
        if !operation.accepts(task.state) || template_alone {
            return Err(LifecycleError::InvalidTransition {
                id: task.id,
                state: task.state,
                operation: operation.name(),
            });
        }

        let mut outcome = Outcome::default();
        if operation == Operation::Delete && !cascade {
            let pending = self.open_descendants(task.id)?;
            if !pending.is_empty() {
                return Err(LifecycleError::HasOpenChildren { id: task.id, count: pending.len() });
            }
        }

        if cascade {
            let pending = self.open_descendants(task.id)?;
            let affected: HashSet<TaskId> =
                pending.iter().map(|t| t.id).chain([task.id]).collect();
            // Deepest first so that children close before their parents.
            for child in pending.into_iter().rev() {
                if operation.accepts(child.state) {
                    self.apply_transition(child, operation, &affected, &mut outcome)?;
                }
            }
            self.apply_transition(task, operation, &affected, &mut outcome)?;
        } else {
            let affected = HashSet::from([task.id]);
            self.apply_transition(task, operation, &affected, &mut outcome)?;
        }
        Ok(outcome)
    }

    /// Write one transition. `affected` holds every task of the running
    /// cascade; instances whose template is among them do not respawn.
    fn apply_transition(
        &mut self,
        mut task: Task,
        operation: Operation,
        affected: &HashSet<TaskId>,
        outcome: &mut Outcome,
    ) -> LifecycleResult<()> {
        let now = self.now();
        task.state = operation.target();
        if operation.closes() {
            task.closed = Some(now);
        }
        self.store.update(&task)?;
        debug!(id = %task.id, state = %task.state, "{} task", operation.past());
        outcome.changed.push(task.id);

        if operation.closes() {
            if let Some(template) = task.template().filter(|t| !affected.contains(t)) {
                if let Some(spawned) = self.spawn_successor(&task, template, now)? {
                    outcome.spawned.push(spawned);
                }
            }
        }
        Ok(())
    }

    fn spawn_successor(
        &mut self,
        instance: &Task,
        template_id: TaskId,
        closed_at: NaiveDateTime,
    ) -> LifecycleResult<Option<TaskId>> {
        let template = self.store.get(template_id)?;
        let Some(recurrence) = template.recurrence() else {
            return Err(LifecycleError::NotATemplate(template_id));
        };
        if template.state != State::Open {
            debug!(template = %template_id, state = %template.state, "Series paused, no successor");
            return Ok(None);
        }

        let reference = match recurrence.recurrence_type {
            RecurrenceType::Recurring => instance.due.unwrap_or(closed_at),
            RecurrenceType::Repeating => closed_at,
        };
        let due = recurrence.next(reference)?;
        self.spawn_instance(&template, due).map(Some)
    }

    /// Create an open instance of `template` due at `due`.
    fn spawn_instance(&mut self, template: &Task, due: NaiveDateTime) -> LifecycleResult<TaskId> {
        let mut instance = Task::new(self.next_id()?, template.description.clone(), self.now());
        instance.project = template.project.clone();
        instance.tags = template.tags.clone();
        instance.priority = template.priority;
        instance.parent = template.parent;
        instance.kind = Kind::Instance { template: template.id };
        instance.due = Some(due);
        instance.wait = match (template.due, template.wait) {
            (Some(template_due), Some(wait)) => due.checked_sub_signed(template_due - wait),
            _ => None,
        };
        let id = self.store.insert(instance)?;
        debug!(%id, template = %template.id, %due, "Spawned instance");
        Ok(id)
    }

    /// Set project, priority, dates and tags, creating projects and tags on
    /// first use.
    fn apply_fields(&mut self, task: &mut Task, attributes: &Attributes) -> LifecycleResult<()> {
        if let Some(project) = &attributes.project {
            if let Change::Set(name) = project {
                self.store.ensure_project(name)?;
            }
            task.project = project.clone().into_option();
        }
        if let Some(priority) = &attributes.priority {
            task.priority = priority.clone().into_option();
        }
        if let Some(due) = &attributes.due {
            task.due = due.clone().into_option();
        }
        if let Some(wait) = &attributes.wait {
            task.wait = wait.clone().into_option();
        }
        for tag in &attributes.tags.add {
            self.store.ensure_tag(tag)?;
        }
        attributes.tags.apply(&mut task.tags);
        Ok(())
    }

    fn recurrence_from(&self, directive: RecurrenceDirective, fallback: RecurrenceType) -> Recurrence {
        Recurrence::new(directive.recurrence_type.unwrap_or(fallback), directive.rule)
    }

    /// Resolve `reference` as the parent of `child`, refusing deleted tasks
    /// and anything that would close a loop.
    fn resolve_parent(&self, reference: &str, child: Option<TaskId>) -> LifecycleResult<TaskId> {
        let parent = self.resolve(reference)?;
        if parent.state == State::Deleted {
            return Err(LifecycleError::NotFound(reference.to_string()));
        }
        if let Some(child) = child {
            let loops = parent.id == child
                || self.descendants(child)?.iter().any(|t| t.id == parent.id);
            if loops {
                return Err(LifecycleError::CyclicParent { id: child, parent: parent.id });
            }
        }
        Ok(parent.id)
    }

    /// Every task below `root`, breadth first, each listed once. Fails with
    /// [`LifecycleError::CyclicParent`] when the tree runs deeper than
    /// [`MAX_CASCADE_DEPTH`] levels.
    fn descendants(&self, root: TaskId) -> LifecycleResult<Vec<Task>> {
        let mut seen = HashSet::from([root]);
        let mut found = Vec::new();
        let mut frontier = vec![root];
        let mut depth = 0;
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for id in frontier {
                for child in self.store.find(&TaskFilter::children_of(id))? {
                    if seen.insert(child.id) {
                        next.push(child.id);
                        found.push(child);
                    }
                }
            }
            if let Some(&deepest) = next.first() {
                depth += 1;
                if depth > MAX_CASCADE_DEPTH {
                    return Err(LifecycleError::CyclicParent { id: root, parent: deepest });
                }
            }
            frontier = next;
        }
        Ok(found)
    }

    fn open_descendants(&self, root: TaskId) -> LifecycleResult<Vec<Task>> {
        let mut tasks = self.descendants(root)?;
        tasks.retain(|t| !t.state.is_terminal());
        Ok(tasks)
    }

    /// A fresh ULID, bumped past the newest stored id so ids sort by creation.
    fn next_id(&self) -> LifecycleResult<TaskId> {
        let mut ulid = Ulid::from_datetime(self.clock.utc().into());
        if let Some(last) = self.store.last_id()? {
            if ulid <= last.ulid() {
                ulid = last.ulid().increment().unwrap_or(ulid);
            }
        }
        Ok(TaskId::from_ulid(ulid))
    }
}

fn ensure_not_terminal(task: &Task) -> LifecycleResult<()> {
    if task.state.is_terminal() {
        return Err(LifecycleError::TerminalState { id: task.id, state: task.state });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::fields::Unit;
    use crate::recurrence::RecurrenceRule;
    use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
    use rstest::{fixture, rstest};
    use std::collections::BTreeSet;
    use std::sync::RwLock;

    /// Clock frozen at a settable local time.
    struct FixedClock(RwLock<NaiveDateTime>);

    impl FixedClock {
        fn set(&self, now: NaiveDateTime) {
            *self.0.write().expect("clock lock") = now;
        }
    }

    impl Clock for FixedClock {
        fn local(&self) -> DateTime<Local> {
            let now = *self.0.read().expect("clock lock");
            Local.from_local_datetime(&now).earliest().expect("representable local time")
        }

        fn utc(&self) -> DateTime<Utc> {
            self.local().with_timezone(&Utc)
        }
    }

    type Manager = TaskManager<Database, FixedClock>;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .and_then(|day| day.and_hms_opt(h, 0, 0))
            .expect("valid date")
    }

    fn day(d: u32) -> NaiveDateTime {
        at(d, 0)
    }

    #[fixture]
    fn clock() -> Arc<FixedClock> {
        // Wednesday 2024-01-10, noon.
        Arc::new(FixedClock(RwLock::new(at(10, 12))))
    }

    #[fixture]
    fn manager(clock: Arc<FixedClock>) -> Manager {
        TaskManager::new(Database::default(), clock)
    }

    fn get(manager: &Manager, id: TaskId) -> Task {
        manager.store().get(id).expect("stored task")
    }

    fn state(manager: &Manager, id: TaskId) -> State {
        get(manager, id).state
    }

    fn child_of(manager: &mut Manager, parent: TaskId, description: &str) -> TaskId {
        let parent = format!("parent:{parent}");
        manager.add(&[description, parent.as_str()]).expect("child added")
    }

    fn instances(manager: &Manager, template: TaskId) -> Vec<Task> {
        manager.store().find(&TaskFilter::instances_of(template)).expect("query")
    }

    fn open_instance(manager: &Manager, template: TaskId) -> Task {
        let mut open: Vec<Task> = instances(manager, template)
            .into_iter()
            .filter(|t| t.state == State::Open)
            .collect();
        assert_eq!(open.len(), 1, "exactly one open instance");
        open.remove(0)
    }

    #[rstest]
    fn add_buy_milk(mut manager: Manager) {
        let id = manager
            .add(&["Buy", "milk", "project:home", "+errand", "due:tomorrow"])
            .expect("task added");

        let task = get(&manager, id);
        assert_eq!(task.description, "Buy milk");
        assert_eq!(task.project.as_deref(), Some("home"));
        assert_eq!(task.tags, BTreeSet::from(["errand".to_string()]));
        assert_eq!(task.due, Some(day(11)));
        assert_eq!(task.state, State::Open);
        assert_eq!(task.kind, Kind::Task);
        assert_eq!(manager.store().projects().expect("projects")[0].name, "home");
        assert_eq!(manager.store().tags().expect("tags")[0].name, "errand");
    }

    #[rstest]
    fn add_requires_description(mut manager: Manager) {
        let result = manager.add(&["project:home", "+errand"]);
        assert!(matches!(result, Err(LifecycleError::EmptyDescription)));
    }

    #[rstest]
    fn add_propagates_parse_errors(mut manager: Manager) {
        let result = manager.add(&["thing", "size:big"]);
        assert!(matches!(result, Err(LifecycleError::Parse(_))));
    }

    #[rstest]
    fn add_applies_configured_default_priority(clock: Arc<FixedClock>) {
        let settings = Settings { default_priority: Some(Priority::Medium), ..Settings::default() };
        let mut manager = TaskManager::new(Database::default(), clock).with_settings(settings);

        let plain = manager.add(&["plain"]).expect("added");
        let explicit = manager.add(&["explicit", "pri:high"]).expect("added");
        assert_eq!(get(&manager, plain).priority, Some(Priority::Medium));
        assert_eq!(get(&manager, explicit).priority, Some(Priority::High));
    }

    #[rstest]
    fn ids_increase_with_creation_order(mut manager: Manager) {
        let ids: Vec<TaskId> = (0..5)
            .map(|n| manager.add(&[format!("task {n}")]).expect("added"))
            .collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[rstest]
    fn add_with_parent_links_to_existing_task(mut manager: Manager) {
        let parent = manager.add(&["parent"]).expect("added");
        let child = child_of(&mut manager, parent, "child");
        assert_eq!(get(&manager, child).parent, Some(parent));
    }

    #[rstest]
    fn add_with_unknown_or_deleted_parent_fails(mut manager: Manager) {
        assert!(matches!(
            manager.add(&["orphan", "parent:01ZZZ"]),
            Err(LifecycleError::NotFound(_))
        ));

        let gone = manager.add(&["gone"]).expect("added");
        manager.delete(&gone.to_string(), false).expect("deleted");
        let parent = format!("parent:{gone}");
        assert!(matches!(
            manager.add(&["orphan", parent.as_str()]),
            Err(LifecycleError::NotFound(_))
        ));
    }

    #[rstest]
    fn resolve_by_unique_prefix(mut manager: Manager) {
        let mut db = Database::default();
        for (text, description) in [
            ("01ABCDE0000000000000000000", "first"),
            ("01ABCDF0000000000000000000", "second"),
        ] {
            let id: TaskId = text.parse().expect("valid ulid");
            db.insert(Task::new(id, description, at(1, 0))).expect("insert");
        }
        manager = TaskManager::new(db, manager.clock.clone());

        assert!(matches!(
            manager.resolve("01ABCD"),
            Err(LifecycleError::AmbiguousId { ref matches, .. }) if matches.len() == 2
        ));
        assert_eq!(manager.resolve("01ABCDE").expect("unique").description, "first");
        assert_eq!(manager.resolve("01abcdf").expect("unique").description, "second");
        assert!(matches!(manager.resolve("01ABCDX"), Err(LifecycleError::NotFound(_))));
    }

    #[rstest]
    fn deleted_tasks_do_not_make_prefixes_ambiguous(mut manager: Manager) {
        let mut db = Database::default();
        let kept: TaskId = "01ABCDE0000000000000000000".parse().expect("valid ulid");
        let deleted: TaskId = "01ABCDF0000000000000000000".parse().expect("valid ulid");
        db.insert(Task::new(kept, "kept", at(1, 0))).expect("insert");
        let mut gone = Task::new(deleted, "gone", at(1, 0));
        gone.state = State::Deleted;
        db.insert(gone).expect("insert");
        manager = TaskManager::new(db, manager.clock.clone());

        assert_eq!(manager.resolve_id("01ABCD").expect("unique"), kept);
        assert_eq!(manager.resolve_id(&deleted.to_string()).expect("full id"), deleted);
    }

    #[rstest]
    fn modify_applies_delta(mut manager: Manager) {
        let id = manager.add(&["draft", "+a", "+b", "pro:home", "due:today"]).expect("added");
        let reference = id.to_string();
        manager
            .modify(&reference, &["final", "text", "-a", "+c", "project:", "pri:low", "due:"])
            .expect("modified");

        let task = get(&manager, id);
        assert_eq!(task.description, "final text");
        assert_eq!(task.tags, BTreeSet::from(["b", "c"].map(String::from)));
        assert_eq!(task.project, None);
        assert_eq!(task.priority, Some(Priority::Low));
        assert_eq!(task.due, None);
    }

    #[rstest]
    fn modify_without_description_keeps_it(mut manager: Manager) {
        let id = manager.add(&["keep", "me"]).expect("added");
        manager.modify(&id.to_string(), &["+tagged"]).expect("modified");
        assert_eq!(get(&manager, id).description, "keep me");
    }

    #[rstest]
    fn modify_unknown_id_fails(mut manager: Manager) {
        assert!(matches!(
            manager.modify("01NOPE", &["x"]),
            Err(LifecycleError::NotFound(_))
        ));
    }

    #[rstest]
    fn modify_rejects_conflicting_tags(mut manager: Manager) {
        let id = manager.add(&["tagged", "+a"]).expect("added");
        let result = manager.modify(&id.to_string(), &["+a", "-a"]);
        assert!(matches!(
            result,
            Err(LifecycleError::Parse(crate::error::ParseError::ConflictingTagDirective(_)))
        ));
    }

    #[rstest]
    fn modify_parent_cascades_scalars_not_structure(mut manager: Manager) {
        let root = manager.add(&["root"]).expect("added");
        let child = child_of(&mut manager, root, "child");
        let grandchild = child_of(&mut manager, child, "grandchild");
        let done = child_of(&mut manager, root, "done");
        manager.complete(&done.to_string(), false).expect("completed");

        let outcome = manager
            .modify_parent(&root.to_string(), &["renamed", "pro:work", "+q1", "pri:high"])
            .expect("modified");

        assert_eq!(outcome.changed.len(), 3);
        for id in [root, child, grandchild] {
            let task = get(&manager, id);
            assert_eq!(task.project.as_deref(), Some("work"));
            assert!(task.tags.contains("q1"));
            assert_eq!(task.priority, Some(Priority::High));
        }
        assert_eq!(get(&manager, root).description, "renamed");
        assert_eq!(get(&manager, child).description, "child");
        assert_eq!(get(&manager, child).parent, Some(root));
        assert_eq!(get(&manager, done).project, None);
    }

    #[rstest]
    fn reparenting_under_a_descendant_is_cyclic(mut manager: Manager) {
        let root = manager.add(&["root"]).expect("added");
        let child = child_of(&mut manager, root, "child");
        let grandchild = child_of(&mut manager, child, "grandchild");

        let to_grandchild = format!("parent:{grandchild}");
        assert!(matches!(
            manager.modify(&root.to_string(), &[to_grandchild.as_str()]),
            Err(LifecycleError::CyclicParent { id, parent }) if id == root && parent == grandchild
        ));
        let to_self = format!("parent:{root}");
        assert!(matches!(
            manager.modify(&root.to_string(), &[to_self.as_str()]),
            Err(LifecycleError::CyclicParent { .. })
        ));
        assert_eq!(get(&manager, root).parent, None);
    }

    #[rstest]
    fn reparenting_elsewhere_and_clearing(mut manager: Manager) {
        let a = manager.add(&["a"]).expect("added");
        let b = manager.add(&["b"]).expect("added");
        let child = child_of(&mut manager, a, "child");

        let to_b = format!("parent:{b}");
        manager.modify(&child.to_string(), &[to_b.as_str()]).expect("moved");
        assert_eq!(get(&manager, child).parent, Some(b));

        manager.modify(&child.to_string(), &["parent:"]).expect("detached");
        assert_eq!(get(&manager, child).parent, None);
    }

    #[rstest]
    fn recurrence_on_a_plain_task_is_rejected(mut manager: Manager) {
        let id = manager.add(&["plain"]).expect("added");
        assert!(matches!(
            manager.modify(&id.to_string(), &["recur:1w"]),
            Err(LifecycleError::NotATemplate(t)) if t == id
        ));
    }

    #[rstest]
    #[case(Operation::Freeze)]
    #[case(Operation::Unfreeze)]
    #[case(Operation::Complete)]
    #[case(Operation::Delete)]
    fn terminal_tasks_reject_every_operation(mut manager: Manager, #[case] operation: Operation) {
        for closing in [Operation::Complete, Operation::Delete] {
            let id = manager.add(&["closed"]).expect("added");
            let reference = id.to_string();
            manager.transition(&reference, closing, false).expect("closed");

            assert!(matches!(
                manager.transition(&reference, operation, false),
                Err(LifecycleError::TerminalState { .. })
            ));
            assert!(matches!(
                manager.modify(&reference, &["again"]),
                Err(LifecycleError::TerminalState { .. })
            ));
            assert_eq!(state(&manager, id), closing.target());
        }
    }

    #[rstest]
    fn freeze_unfreeze_round_trip(mut manager: Manager) {
        let id = manager.add(&["pausable"]).expect("added");
        let reference = id.to_string();

        manager.freeze(&reference, false).expect("frozen");
        assert_eq!(state(&manager, id), State::Frozen);
        assert!(matches!(
            manager.freeze(&reference, false),
            Err(LifecycleError::InvalidTransition { operation: "freeze", .. })
        ));

        manager.unfreeze(&reference, false).expect("unfrozen");
        assert_eq!(state(&manager, id), State::Open);
        assert!(matches!(
            manager.unfreeze(&reference, false),
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[rstest]
    fn frozen_tasks_can_be_closed(mut manager: Manager) {
        let id = manager.add(&["frozen"]).expect("added");
        manager.freeze(&id.to_string(), false).expect("frozen");
        manager.complete(&id.to_string(), false).expect("completed");
        let task = get(&manager, id);
        assert_eq!(task.state, State::Completed);
        assert_eq!(task.closed, Some(at(10, 12)));
    }

    #[rstest]
    fn freeze_and_complete_leave_children_alone_without_cascade(mut manager: Manager) {
        let parent = manager.add(&["parent"]).expect("added");
        let child = child_of(&mut manager, parent, "child");

        manager.freeze(&parent.to_string(), false).expect("frozen");
        assert_eq!(state(&manager, child), State::Open);
        manager.complete(&parent.to_string(), false).expect("completed");
        assert_eq!(state(&manager, child), State::Open);
    }

    #[rstest]
    fn freeze_cascade_reaches_all_descendants(mut manager: Manager) {
        let parent = manager.add(&["parent"]).expect("added");
        let child = child_of(&mut manager, parent, "child");
        let grandchild = child_of(&mut manager, child, "grandchild");
        let closed = child_of(&mut manager, parent, "closed");
        manager.complete(&closed.to_string(), false).expect("completed");

        manager.freeze(&parent.to_string(), true).expect("frozen");
        for id in [parent, child, grandchild] {
            assert_eq!(state(&manager, id), State::Frozen);
        }
        assert_eq!(state(&manager, closed), State::Completed);

        manager.unfreeze(&parent.to_string(), true).expect("unfrozen");
        for id in [parent, child, grandchild] {
            assert_eq!(state(&manager, id), State::Open);
        }
    }

    #[rstest]
    fn delete_with_open_children_requires_cascade(mut manager: Manager) {
        let parent = manager.add(&["parent"]).expect("added");
        let child = child_of(&mut manager, parent, "child");

        assert!(matches!(
            manager.delete(&parent.to_string(), false),
            Err(LifecycleError::HasOpenChildren { count: 1, .. })
        ));
        assert_eq!(state(&manager, parent), State::Open);

        let outcome = manager.delete(&parent.to_string(), true).expect("deleted");
        assert_eq!(outcome.changed, vec![child, parent]);
        assert_eq!(state(&manager, child), State::Deleted);
        assert_eq!(state(&manager, parent), State::Deleted);
    }

    #[rstest]
    fn delete_with_only_closed_children_succeeds(mut manager: Manager) {
        let parent = manager.add(&["parent"]).expect("added");
        let child = child_of(&mut manager, parent, "child");
        manager.complete(&child.to_string(), false).expect("completed");

        manager.delete(&parent.to_string(), false).expect("deleted");
        assert_eq!(state(&manager, child), State::Completed);
    }

    #[rstest]
    fn complete_cascade_closes_children_first(mut manager: Manager) {
        let parent = manager.add(&["parent"]).expect("added");
        let child = child_of(&mut manager, parent, "child");
        let grandchild = child_of(&mut manager, child, "grandchild");

        let outcome = manager.complete(&parent.to_string(), true).expect("completed");
        assert_eq!(outcome.changed, vec![grandchild, child, parent]);
    }

    #[rstest]
    fn repeating_successor_counts_from_completion(clock: Arc<FixedClock>) {
        let mut manager = TaskManager::new(Database::default(), clock.clone());
        clock.set(at(1, 9));
        let template = manager.add(&["water", "plants", "recur:7d", "due:2024-01-03"]).expect("added");
        let first = open_instance(&manager, template);
        assert_eq!(first.due, Some(day(3)));

        clock.set(at(10, 18));
        let outcome = manager.complete(&first.id.to_string(), false).expect("completed");

        assert_eq!(outcome.spawned.len(), 1);
        let second = get(&manager, outcome.spawned[0]);
        assert_eq!(second.due, Some(day(17)));
        assert_eq!(second.template(), Some(template));
        assert_eq!(second.state, State::Open);
    }

    #[rstest]
    fn recurring_successor_keeps_the_calendar(clock: Arc<FixedClock>) {
        let mut manager = TaskManager::new(Database::default(), clock.clone());
        clock.set(at(1, 9));
        // 2024-01-08 is a Monday.
        let template = manager
            .add(&["standup", "notes", "recur:mon", "due:2024-01-08", "pro:team", "+meeting", "pri:h"])
            .expect("added");
        let first = open_instance(&manager, template);

        // Completed late, on Wednesday the 10th.
        clock.set(at(10, 15));
        manager.complete(&first.id.to_string(), false).expect("completed");

        let second = open_instance(&manager, template);
        assert_eq!(second.due, Some(day(15)));
        assert_eq!(second.description, "standup notes");
        assert_eq!(second.project.as_deref(), Some("team"));
        assert_eq!(second.tags, BTreeSet::from(["meeting".to_string()]));
        assert_eq!(second.priority, Some(Priority::High));
    }

    #[rstest]
    fn template_records_its_recurrence(mut manager: Manager) {
        let template = manager.add(&["pay", "rent", "rec:1m", "due:2024-02-01"]).expect("added");
        let task = get(&manager, template);
        assert_eq!(
            task.recurrence(),
            Some(&Recurrence::new(
                RecurrenceType::Recurring,
                RecurrenceRule::Every { count: 1, unit: Unit::Month }
            ))
        );
        assert_eq!(task.due, Some(midnight(NaiveDate::from_ymd_opt(2024, 2, 1).expect("valid date"))));
    }

    #[rstest]
    fn bare_interval_uses_configured_type(clock: Arc<FixedClock>) {
        let settings = Settings {
            default_recurrence_type: RecurrenceType::Recurring,
            ..Settings::default()
        };
        let mut manager = TaskManager::new(Database::default(), clock).with_settings(settings);
        let template = manager.add(&["review", "recur:2w"]).expect("added");
        let recurrence = get(&manager, template).recurrence().cloned().expect("template");
        assert_eq!(recurrence.recurrence_type, RecurrenceType::Recurring);
    }

    #[rstest]
    fn template_without_due_starts_today(mut manager: Manager) {
        let template = manager.add(&["daily", "thing", "recur:daily"]).expect("added");
        assert_eq!(open_instance(&manager, template).due, Some(day(10)));
    }

    #[rstest]
    fn deleting_an_instance_skips_to_the_next_slot(mut manager: Manager) {
        let template = manager
            .add(&["gym", "recur:mon,thu", "due:2024-01-11"])
            .expect("added");
        let first = open_instance(&manager, template);
        manager.delete(&first.id.to_string(), false).expect("deleted");

        assert_eq!(state(&manager, first.id), State::Deleted);
        assert_eq!(open_instance(&manager, template).due, Some(day(15)));
    }

    #[rstest]
    fn instances_keep_the_wait_offset(mut manager: Manager) {
        let template = manager
            .add(&["report", "rec:1w", "due:2024-01-12", "wait:2024-01-10"])
            .expect("added");
        let first = open_instance(&manager, template);
        assert_eq!(first.wait, Some(day(10)));

        manager.complete(&first.id.to_string(), false).expect("completed");
        let second = open_instance(&manager, template);
        assert_eq!(second.due, Some(day(19)));
        assert_eq!(second.wait, Some(day(17)));
    }

    #[rstest]
    fn frozen_template_pauses_the_series(mut manager: Manager) {
        let template = manager.add(&["pause", "recur:1d"]).expect("added");
        let first = open_instance(&manager, template);

        manager.freeze(&template.to_string(), false).expect("frozen");
        let outcome = manager.complete(&first.id.to_string(), false).expect("completed");
        assert!(outcome.spawned.is_empty());
        assert_eq!(instances(&manager, template).len(), 1);
    }

    #[rstest]
    fn template_delete_needs_cascade_while_an_instance_is_open(mut manager: Manager) {
        let template = manager.add(&["series", "recur:1w"]).expect("added");
        let first = open_instance(&manager, template);

        assert!(matches!(
            manager.delete(&template.to_string(), false),
            Err(LifecycleError::HasOpenChildren { .. })
        ));

        let outcome = manager.delete(&template.to_string(), true).expect("deleted");
        assert!(outcome.spawned.is_empty());
        assert_eq!(state(&manager, first.id), State::Deleted);
        assert_eq!(state(&manager, template), State::Deleted);
        assert_eq!(instances(&manager, template).len(), 1);
    }

    #[rstest]
    fn recurrence_can_be_changed_on_a_template(mut manager: Manager) {
        let template = manager.add(&["water", "rep:3d"]).expect("added");
        manager.modify(&template.to_string(), &["recur:5d"]).expect("modified");

        let recurrence = get(&manager, template).recurrence().cloned().expect("template");
        assert_eq!(recurrence.recurrence_type, RecurrenceType::Repeating);
        assert_eq!(recurrence.rule, RecurrenceRule::Every { count: 5, unit: Unit::Day });
    }

    #[rstest]
    fn modify_parent_on_template_reaches_open_instance(mut manager: Manager) {
        let template = manager.add(&["series", "recur:1w"]).expect("added");
        manager.modify_parent(&template.to_string(), &["pro:home"]).expect("modified");
        assert_eq!(open_instance(&manager, template).project.as_deref(), Some("home"));
    }

    #[rstest]
    fn hierarchies_at_the_depth_limit_still_work(mut manager: Manager) {
        let root = manager.add(&["level 0"]).expect("added");
        let mut parent = root;
        for level in 1..=MAX_CASCADE_DEPTH {
            parent = child_of(&mut manager, parent, &format!("level {level}"));
        }
        let deepest = parent;

        let outcome = manager.freeze(&root.to_string(), true).expect("cascaded");
        assert_eq!(outcome.changed.len(), MAX_CASCADE_DEPTH + 1);
        assert_eq!(state(&manager, deepest), State::Frozen);

        manager.unfreeze(&root.to_string(), false).expect("unfrozen alone");
        manager.complete(&root.to_string(), false).expect("completed alone");
        assert_eq!(state(&manager, deepest), State::Frozen);
    }

    #[rstest]
    fn non_cascading_operations_ignore_runaway_depth(mut manager: Manager) {
        let root = manager.add(&["level 0"]).expect("added");
        let mut parent = root;
        for level in 1..=MAX_CASCADE_DEPTH + 1 {
            parent = child_of(&mut manager, parent, &format!("level {level}"));
        }
        manager.freeze(&root.to_string(), false).expect("frozen alone");
        manager.complete(&root.to_string(), false).expect("completed alone");
        assert_eq!(state(&manager, parent), State::Open);
    }

    #[rstest]
    fn templates_only_complete_with_their_series(mut manager: Manager) {
        let template = manager.add(&["series", "recur:1w"]).expect("added");
        let first = open_instance(&manager, template);

        assert!(matches!(
            manager.complete(&template.to_string(), false),
            Err(LifecycleError::InvalidTransition { operation: "complete", .. })
        ));
        assert_eq!(state(&manager, template), State::Open);

        let outcome = manager.complete(&template.to_string(), true).expect("completed");
        assert!(outcome.spawned.is_empty());
        assert_eq!(state(&manager, first.id), State::Completed);
        assert_eq!(state(&manager, template), State::Completed);
    }

    #[rstest]
    fn runaway_hierarchies_are_cut_off(mut manager: Manager) {
        let root = manager.add(&["level 0"]).expect("added");
        let mut parent = root;
        for level in 1..=MAX_CASCADE_DEPTH + 1 {
            parent = child_of(&mut manager, parent, &format!("level {level}"));
        }
        assert!(matches!(
            manager.freeze(&root.to_string(), true),
            Err(LifecycleError::CyclicParent { .. })
        ));
    }

    #[rstest]
    fn closing_stamps_the_clock_time(clock: Arc<FixedClock>) {
        let mut manager = TaskManager::new(Database::default(), clock.clone());
        let id = manager.add(&["stamp"]).expect("added");
        let later = at(20, 8) + Duration::minutes(5);
        clock.set(later);

        manager.complete(&id.to_string(), false).expect("completed");
        let task = get(&manager, id);
        assert_eq!(task.created, at(10, 12));
        assert_eq!(task.closed, Some(later));
        assert_eq!(manager.now(), later);
    }
}
