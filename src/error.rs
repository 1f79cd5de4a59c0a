//! Error types for attribute parsing, recurrence, storage and the task
//! lifecycle.

use thiserror::Error;

use crate::fields::State;
use crate::task::TaskId;

/// Errors raised while turning command tokens into an attribute set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// A `key:value` token used a key outside the recognised set.
    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),

    /// A date value could not be understood.
    #[error("invalid date '{0}'")]
    InvalidDate(String),

    /// The same tag was both added and removed in one command.
    #[error("tag '{0}' is both added and removed")]
    ConflictingTagDirective(String),

    /// A recurrence value did not match any rule form.
    #[error("invalid recurrence '{0}'")]
    InvalidRecurrenceSyntax(String),

    /// A bare `+` or `-` token.
    #[error("empty tag name")]
    EmptyTag,

    /// A recognised key carried a value of the wrong shape.
    #[error("invalid value '{value}' for attribute '{key}'")]
    InvalidValue { key: String, value: String },
}

/// Errors raised by the recurrence calculator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecurrenceError {
    /// The rule cannot produce a date after the reference.
    #[error("invalid recurrence rule: {0}")]
    InvalidRule(String),
}

/// Errors returned by [`TaskStore`](crate::store::TaskStore) implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("duplicate task identifier: {0}")]
    Duplicate(TaskId),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Errors raised by the task lifecycle manager.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// No task matches the identifier.
    #[error("no task matches '{0}'")]
    NotFound(String),

    /// An identifier prefix matches more than one task.
    #[error("'{prefix}' matches {} tasks: {}", .matches.len(), format_ids(.matches))]
    AmbiguousId { prefix: String, matches: Vec<TaskId> },

    /// The task is completed or deleted.
    #[error("task {id} is {state} and cannot change")]
    TerminalState { id: TaskId, state: State },

    /// The task still has children that are not closed.
    #[error("task {id} has {count} open child task(s); use --parent to cascade")]
    HasOpenChildren { id: TaskId, count: usize },

    /// The requested parent would make the task its own ancestor.
    #[error("task {parent} cannot be the parent of {id}: it is the task itself or one of its descendants")]
    CyclicParent { id: TaskId, parent: TaskId },

    /// The operation does not apply to the current state, or is a complete of a
    /// template without its instances.
    #[error("cannot {operation} task {id} while it is {state}")]
    InvalidTransition { id: TaskId, state: State, operation: &'static str },

    /// `add` without any description text.
    #[error("task description must not be empty")]
    EmptyDescription,

    /// A recurrence was given for a task that is not a recurring template.
    #[error("task {0} is not a recurring template")]
    NotATemplate(TaskId),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Recurrence(#[from] RecurrenceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn format_ids(ids: &[TaskId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse configuration {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
