//! Enumerations and field types for task tracking.
//!
//! This module defines the closed value sets used across the crate: task
//! lifecycle states, priorities, recurrence types and the calendar units that
//! relative dates and recurrence rules are expressed in.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
///
/// `Completed` and `Deleted` are terminal: once reached, no further
/// transition is accepted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum State {
    Open,
    Frozen,
    Completed,
    Deleted,
}

impl State {
    /// Whether the state is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Completed | State::Deleted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            State::Open => "open",
            State::Frozen => "frozen",
            State::Completed => "completed",
            State::Deleted => "deleted",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordinal task priority. Ordering follows importance, `Low < High`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = ();

    /// Accepts the full names, their initials and the numeric ranks 1-3.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "l" | "1" => Ok(Priority::Low),
            "medium" | "med" | "m" | "2" => Ok(Priority::Medium),
            "high" | "h" | "3" => Ok(Priority::High),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a recurring template schedules its next instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum RecurrenceType {
    /// Fixed calendar slots counted from the previous due date.
    Recurring,
    /// Interval counted from the moment the previous instance was closed.
    Repeating,
}

impl RecurrenceType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecurrenceType::Recurring => "recurring",
            RecurrenceType::Repeating => "repeating",
        }
    }
}

impl FromStr for RecurrenceType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "recurring" => Ok(RecurrenceType::Recurring),
            "repeating" => Ok(RecurrenceType::Repeating),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RecurrenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calendar unit of an interval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Unit {
    Day,
    Week,
    Month,
    Year,
}

impl Unit {
    /// Parse the short suffix used in `<n><unit>` values.
    ///
    /// `m` means months here; minutes are not a scheduling unit.
    pub fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "d" => Some(Unit::Day),
            "w" => Some(Unit::Week),
            "m" | "mo" => Some(Unit::Month),
            "y" => Some(Unit::Year),
            _ => None,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Unit::Day => "d",
            Unit::Week => "w",
            Unit::Month => "m",
            Unit::Year => "y",
        }
    }
}
