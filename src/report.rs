//! Plain-text reports.
//!
//! Renderers return the table as a `String`; the command layer prints it.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

use chrono::NaiveDate;

use crate::dates::format_due_relative;
use crate::task::{Project, Tag, Task, TaskId};

/// Shortest prefix of each identifier that no other identifier in `ids`
/// shares.
pub fn short_ids(ids: &[TaskId]) -> HashMap<TaskId, String> {
    let mut texts: Vec<(TaskId, String)> = ids.iter().map(|id| (*id, id.to_string())).collect();
    texts.sort_by(|a, b| a.1.cmp(&b.1));
    texts.dedup_by(|a, b| a.0 == b.0);

    let common = |a: &str, b: &str| a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count();
    let mut out = HashMap::with_capacity(texts.len());
    for (i, (id, text)) in texts.iter().enumerate() {
        let before = i.checked_sub(1).map_or(0, |j| common(&texts[j].1, text));
        let after = texts.get(i + 1).map_or(0, |next| common(&next.1, text));
        let len = (before.max(after) + 1).min(text.len());
        out.insert(*id, text[..len].to_string());
    }
    out
}

/// Order for task listings: earliest due first, undated last, then higher
/// priority, then creation order.
pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by_key(|t| (t.due.is_none(), t.due, Reverse(t.priority), t.id));
}

/// Table of tasks with relative due dates.
pub fn task_table(tasks: &[Task], short: &HashMap<TaskId, String>, today: NaiveDate) -> String {
    let id_width = id_width(tasks, short);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<id_width$} {:<6} {:<10} {:<14} {}",
        "ID", "Pri", "Due", "Project", "Description [tags]"
    );
    for t in tasks {
        let _ = writeln!(
            out,
            "{:<id_width$} {:<6} {:<10} {:<14} {}{}",
            display_id(t.id, short),
            t.priority.map_or("-", |p| p.as_str()),
            format_due_relative(t.due, today),
            truncate(t.project.as_deref().unwrap_or("-"), 14),
            t.description,
            tag_suffix(t),
        );
    }
    out
}

/// Table of recurring templates with their rule and anchor date.
pub fn template_table(templates: &[Task], short: &HashMap<TaskId, String>, date_format: &str) -> String {
    let id_width = id_width(templates, short);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<id_width$} {:<12} {:<16} {:<14} {}",
        "ID", "Rule", "Due", "Project", "Description [tags]"
    );
    for t in templates {
        let rule = t.recurrence().map(|r| r.rule.to_string()).unwrap_or_default();
        let due = t.due.map_or_else(|| "-".to_string(), |d| d.format(date_format).to_string());
        let _ = writeln!(
            out,
            "{:<id_width$} {:<12} {:<16} {:<14} {}{}",
            display_id(t.id, short),
            truncate(&rule, 12),
            due,
            truncate(t.project.as_deref().unwrap_or("-"), 14),
            t.description,
            tag_suffix(t),
        );
    }
    out
}

/// Open task count per project. Known projects without open tasks count 0.
pub fn project_counts(open: &[Task], projects: &[Project]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> =
        projects.iter().map(|p| (p.name.clone(), 0)).collect();
    for t in open {
        if let Some(project) = &t.project {
            *counts.entry(project.clone()).or_default() += 1;
        }
    }
    counts
}

/// Open task count per tag. Known tags without open tasks count 0.
pub fn tag_counts(open: &[Task], tags: &[Tag]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = tags.iter().map(|t| (t.name.clone(), 0)).collect();
    for t in open {
        for tag in &t.tags {
            *counts.entry(tag.clone()).or_default() += 1;
        }
    }
    counts
}

pub fn count_table(heading: &str, counts: &BTreeMap<String, usize>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<16} {}", heading, "Tasks");
    for (name, count) in counts {
        let _ = writeln!(out, "{:<16} {}", truncate(name, 16), count);
    }
    out
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn display_id(id: TaskId, short: &HashMap<TaskId, String>) -> String {
    short.get(&id).cloned().unwrap_or_else(|| id.to_string())
}

fn id_width(tasks: &[Task], short: &HashMap<TaskId, String>) -> usize {
    tasks.iter().map(|t| display_id(t.id, short).len()).max().unwrap_or(0).max(2)
}

fn tag_suffix(t: &Task) -> String {
    if t.tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", t.tags.iter().cloned().collect::<Vec<_>>().join(","))
    }
}
