//! Recurrence rules and the calculator that schedules the next instance of a
//! recurring template.
//!
//! Two flavours exist. A `recurring` template is pinned to the calendar: the
//! next slot is computed from the previous instance's due date, so finishing
//! late never shifts the schedule. A `repeating` template drifts: the next due
//! date is counted from the moment the previous instance was closed.

use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::dates::{add_interval, days_in_month, midnight, parse_weekday, split_count};
use crate::error::{ParseError, RecurrenceError};
use crate::fields::{RecurrenceType, Unit};

/// The recurrence attached to a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub recurrence_type: RecurrenceType,
    pub rule: RecurrenceRule,
}

impl Recurrence {
    pub fn new(recurrence_type: RecurrenceType, rule: RecurrenceRule) -> Self {
        Recurrence { recurrence_type, rule }
    }

    /// Next due date given the reference that matches this recurrence type.
    pub fn next(&self, reference: NaiveDateTime) -> Result<NaiveDateTime, RecurrenceError> {
        next(&self.rule, reference, self.recurrence_type)
    }
}

/// When the next occurrence falls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "kebab-case")]
pub enum RecurrenceRule {
    /// Every `count` units: `7d`, `2w`, `monthly`.
    Every { count: u32, unit: Unit },
    /// On each listed weekday: `mon,thu`, `weekdays`.
    Weekdays { days: Vec<Weekday> },
    /// On a fixed day of every month: `1st`, `15th`. Clamped to short months.
    MonthDay { day: u32 },
}

/// Whether a rule was written as a plain interval or as a calendar anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleForm {
    Interval,
    Calendar,
}

impl RecurrenceRule {
    /// Build a weekday rule, sorted Monday first and without duplicates.
    pub fn weekdays(days: impl IntoIterator<Item = Weekday>) -> Self {
        let mut days: Vec<Weekday> = days.into_iter().collect();
        days.sort_by_key(|d| d.num_days_from_monday());
        days.dedup();
        RecurrenceRule::Weekdays { days }
    }

    /// Parse a rule value.
    ///
    /// `<n><unit>` is an interval; weekday lists, `weekdays`, `weekends`,
    /// day-of-month ordinals and `daily`/`weekly`/`monthly`/`yearly` are
    /// calendar anchors.
    pub fn parse(value: &str) -> Result<(Self, RuleForm), ParseError> {
        let s = value.trim().to_lowercase();
        let invalid = || ParseError::InvalidRecurrenceSyntax(value.to_string());

        let every = |unit| RecurrenceRule::Every { count: 1, unit };
        let named = match s.as_str() {
            "daily" => Some(every(Unit::Day)),
            "weekly" => Some(every(Unit::Week)),
            "monthly" => Some(every(Unit::Month)),
            "yearly" | "annually" => Some(every(Unit::Year)),
            "weekdays" => Some(Self::weekdays([
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ])),
            "weekends" => Some(Self::weekdays([Weekday::Sat, Weekday::Sun])),
            _ => None,
        };
        if let Some(rule) = named {
            return Ok((rule, RuleForm::Calendar));
        }

        if let Some((count, suffix)) = split_count(&s) {
            if let Some(unit) = Unit::from_suffix(suffix) {
                if count == 0 {
                    return Err(invalid());
                }
                return Ok((RecurrenceRule::Every { count, unit }, RuleForm::Interval));
            }
            if matches!(suffix, "st" | "nd" | "rd" | "th") && (1..=31).contains(&count) {
                return Ok((RecurrenceRule::MonthDay { day: count }, RuleForm::Calendar));
            }
            return Err(invalid());
        }

        let days = s
            .split(',')
            .map(parse_weekday)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(invalid)?;
        Ok((Self::weekdays(days), RuleForm::Calendar))
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrenceRule::Every { count, unit } => write!(f, "{count}{}", unit.suffix()),
            RecurrenceRule::Weekdays { days } => {
                let names: Vec<String> = days.iter().map(|d| d.to_string().to_lowercase()).collect();
                f.write_str(&names.join(","))
            }
            RecurrenceRule::MonthDay { day } => {
                let suffix = match (day % 10, day % 100) {
                    (_, 11..=13) => "th",
                    (1, _) => "st",
                    (2, _) => "nd",
                    (3, _) => "rd",
                    _ => "th",
                };
                write!(f, "{day}{suffix}")
            }
        }
    }
}

/// Compute the next occurrence strictly after `reference`.
///
/// For `recurring` rules `reference` is the previous due date and its time of
/// day is kept. For `repeating` rules it is the completion timestamp and the
/// result lands at midnight, matching how day offsets are entered by hand.
pub fn next(
    rule: &RecurrenceRule,
    reference: NaiveDateTime,
    recurrence_type: RecurrenceType,
) -> Result<NaiveDateTime, RecurrenceError> {
    let slot = match rule {
        RecurrenceRule::Every { count: 0, .. } => {
            return Err(RecurrenceError::InvalidRule(format!("zero interval in '{rule}'")))
        }
        RecurrenceRule::Every { count, unit } => add_interval(reference, *count, *unit),
        RecurrenceRule::Weekdays { days } if days.is_empty() => {
            return Err(RecurrenceError::InvalidRule("empty weekday list".into()))
        }
        RecurrenceRule::Weekdays { days } => (1..=7)
            .map_while(|offset| reference.checked_add_signed(Duration::days(offset)))
            .find(|candidate| days.contains(&candidate.weekday())),
        RecurrenceRule::MonthDay { day } if !(1..=31).contains(day) => {
            return Err(RecurrenceError::InvalidRule(format!("day of month {day} out of range")))
        }
        RecurrenceRule::MonthDay { day } => next_month_day(reference.date(), *day)
            .map(|date| date.and_time(reference.time())),
    };

    let slot = slot
        .map(|s| match recurrence_type {
            RecurrenceType::Recurring => s,
            RecurrenceType::Repeating => midnight(s.date()),
        })
        .ok_or_else(|| RecurrenceError::InvalidRule(format!("'{rule}' overflows the calendar")))?;

    if slot <= reference {
        return Err(RecurrenceError::InvalidRule(format!(
            "'{rule}' produced {slot}, not after {reference}"
        )));
    }
    Ok(slot)
}

/// First date strictly after `after` whose day of month is `day`, clamped to
/// the last day of shorter months.
fn next_month_day(after: NaiveDate, day: u32) -> Option<NaiveDate> {
    let in_month = |first: NaiveDate| -> Option<NaiveDate> {
        let last = days_in_month(first)?;
        first.with_day(day.min(last))
    };
    let this_month = in_month(after.with_day(1)?)?;
    if this_month > after {
        return Some(this_month);
    }
    let next_first = after.with_day(1)?.checked_add_months(chrono::Months::new(1))?;
    in_month(next_first)
}
