//! Human date parsing and calendar arithmetic.
//!
//! Dates are naive local date-times. Values naming a day (`today`, a weekday,
//! an ISO date, `3d`) resolve to midnight of that day, while `now` and hour
//! offsets keep the current time of day.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

use crate::error::ParseError;
use crate::fields::Unit;

/// Parse a human date value relative to `now`.
///
/// Supports:
/// - "now", "today", "tomorrow", "yesterday"
/// - weekday names ("mon", "monday", ...), resolving to the next occurrence
///   strictly after today
/// - "eow" / "eom" for the end of the current week or month
/// - "3d", "2w", "1m" / "1mo", "1y" day-level offsets and "4h" hour offsets
/// - "YYYY-MM-DD" and "YYYY-MM-DDTHH:MM"
pub fn parse_date(input: &str, now: NaiveDateTime) -> Result<NaiveDateTime, ParseError> {
    let s = input.trim().to_lowercase();
    let today = now.date();
    let invalid = || ParseError::InvalidDate(input.to_string());

    match s.as_str() {
        "now" => return Ok(now),
        "today" => return Ok(midnight(today)),
        "tomorrow" => return today.succ_opt().map(midnight).ok_or_else(invalid),
        "yesterday" => return today.pred_opt().map(midnight).ok_or_else(invalid),
        "eow" => {
            let (_, end) = start_end_of_week(today).ok_or_else(invalid)?;
            return Ok(midnight(end));
        }
        "eom" => return end_of_month(today).map(midnight).ok_or_else(invalid),
        _ => {}
    }

    if let Some(weekday) = parse_weekday(&s) {
        return next_weekday(today, weekday).map(midnight).ok_or_else(invalid);
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(&s, "%Y-%m-%dt%H:%M") {
        return Ok(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        return Ok(midnight(date));
    }

    let (count, suffix) = split_count(&s).ok_or_else(invalid)?;
    if suffix == "h" {
        return now.checked_add_signed(Duration::hours(i64::from(count))).ok_or_else(invalid);
    }
    let unit = Unit::from_suffix(suffix).ok_or_else(invalid)?;
    add_interval(midnight(today), count, unit).ok_or_else(invalid)
}

/// Parse a weekday from its English name or three letter abbreviation.
pub fn parse_weekday(s: &str) -> Option<Weekday> {
    let weekdays = [
        ("monday", "mon", Weekday::Mon),
        ("tuesday", "tue", Weekday::Tue),
        ("wednesday", "wed", Weekday::Wed),
        ("thursday", "thu", Weekday::Thu),
        ("friday", "fri", Weekday::Fri),
        ("saturday", "sat", Weekday::Sat),
        ("sunday", "sun", Weekday::Sun),
    ];
    let s = s.trim().to_lowercase();
    weekdays
        .iter()
        .find(|(long, short, _)| s == *long || s == *short)
        .map(|(_, _, day)| *day)
}

/// Split `"12w"` into `(12, "w")`. The count must be present and positive.
pub fn split_count(s: &str) -> Option<(u32, &str)> {
    let digits = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if digits == 0 {
        return None;
    }
    let (count, suffix) = s.split_at(digits);
    let count = count.parse::<u32>().ok()?;
    Some((count, suffix))
}

/// The first day strictly after `from` falling on `weekday`. `None` past the
/// end of the calendar.
pub fn next_weekday(from: NaiveDate, weekday: Weekday) -> Option<NaiveDate> {
    let current = i64::from(from.weekday().num_days_from_monday());
    let target = i64::from(weekday.num_days_from_monday());
    let ahead = (target - current).rem_euclid(7);
    from.checked_add_signed(Duration::days(if ahead == 0 { 7 } else { ahead }))
}

/// Add `count` units to `base`, clamping month ends ("Jan 31 + 1m" is the
/// last day of February). `None` on overflow.
pub fn add_interval(base: NaiveDateTime, count: u32, unit: Unit) -> Option<NaiveDateTime> {
    match unit {
        Unit::Day => base.checked_add_signed(Duration::days(i64::from(count))),
        Unit::Week => base.checked_add_signed(Duration::weeks(i64::from(count))),
        Unit::Month => base.checked_add_months(Months::new(count)),
        Unit::Year => base.checked_add_months(Months::new(count.checked_mul(12)?)),
    }
}

/// Calculate the start and end dates of the ISO week (Monday to Sunday)
/// containing `today`.
pub fn start_end_of_week(today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let weekday = i64::from(today.weekday().num_days_from_monday());
    let start = today.checked_sub_signed(Duration::days(weekday))?;
    let end = start.checked_add_signed(Duration::days(6))?;
    Some((start, end))
}

/// Last day of the month containing `day`.
pub fn end_of_month(day: NaiveDate) -> Option<NaiveDate> {
    let first = day.with_day(1)?;
    first.checked_add_months(Months::new(1))?.pred_opt()
}

/// Number of days in the month containing `day`.
pub fn days_in_month(day: NaiveDate) -> Option<u32> {
    end_of_month(day).map(|d| d.day())
}

pub fn midnight(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::MIN)
}

/// Format a due date relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: Option<NaiveDateTime>, today: NaiveDate) -> String {
    match due {
        None => "-".into(),
        Some(d) => {
            let delta = (d.date() - today).num_days();
            if delta == 0 {
                "today".into()
            } else if delta == 1 {
                "tomorrow".into()
            } else if delta > 1 {
                format!("in {delta}d")
            } else {
                format!("{}d late", -delta)
            }
        }
    }
}
