//! Task data structure and related functionality.
//!
//! This module defines the core `Task` struct that represents a single work
//! item with its metadata, its place in the parent/child hierarchy and, for
//! recurring work, its role as a template or as one dated instance.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::fields::*;
use crate::recurrence::Recurrence;

/// Lexicographically sortable task identifier.
///
/// The textual form is the 26 character Crockford base32 ULID, so sorting the
/// strings sorts tasks by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Ulid);

impl TaskId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        TaskId(ulid)
    }

    pub fn ulid(self) -> Ulid {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(TaskId)
    }
}

/// What role a task plays with respect to recurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Kind {
    /// A plain, one-off task.
    Task,
    /// A recurring definition. Never actioned itself; it spawns instances.
    Template { recurrence: Recurrence },
    /// One dated occurrence spawned from a template.
    Instance { template: TaskId },
}

/// A work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    pub project: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub priority: Option<Priority>,
    pub due: Option<NaiveDateTime>,
    pub wait: Option<NaiveDateTime>,
    pub state: State,
    pub parent: Option<TaskId>,
    pub kind: Kind,
    pub created: NaiveDateTime,
    #[serde(default)]
    pub closed: Option<NaiveDateTime>,
}

impl Task {
    /// A new open, one-off task with no metadata.
    pub fn new(id: TaskId, description: impl Into<String>, created: NaiveDateTime) -> Self {
        Task {
            id,
            description: description.into(),
            project: None,
            tags: BTreeSet::new(),
            priority: None,
            due: None,
            wait: None,
            state: State::Open,
            parent: None,
            kind: Kind::Task,
            created,
            closed: None,
        }
    }

    pub fn is_template(&self) -> bool {
        matches!(self.kind, Kind::Template { .. })
    }

    pub fn recurrence(&self) -> Option<&Recurrence> {
        match &self.kind {
            Kind::Template { recurrence } => Some(recurrence),
            _ => None,
        }
    }

    /// The template this task was spawned from, if it is an instance.
    pub fn template(&self) -> Option<TaskId> {
        match self.kind {
            Kind::Instance { template } => Some(template),
            _ => None,
        }
    }

    /// Hidden tasks have a wait date in the future.
    pub fn is_waiting(&self, now: NaiveDateTime) -> bool {
        self.wait.is_some_and(|w| w > now)
    }
}

/// A named grouping of tasks, created on first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A label attached to tasks, created on first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}
