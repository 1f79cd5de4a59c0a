//! Attribute language for `add` and `mod`.
//!
//! Command arguments are a flat list of tokens in any order:
//!
//! - `key:value` sets a scalar attribute. An empty value clears it.
//! - `+tag` adds a tag, `-tag` removes one.
//! - anything else is description text, joined with single spaces.
//!
//! The parser is pure. Names are not resolved to projects, tags or tasks
//! here; that is left to the lifecycle manager.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::NaiveDateTime;

use crate::dates::parse_date;
use crate::error::ParseError;
use crate::fields::{Priority, RecurrenceType};
use crate::recurrence::{RecurrenceRule, RuleForm};

/// A requested change to one scalar attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<T> {
    Set(T),
    Clear,
}

impl<T> Change<T> {
    /// The new value, `None` when clearing.
    pub fn into_option(self) -> Option<T> {
        match self {
            Change::Set(value) => Some(value),
            Change::Clear => None,
        }
    }
}

/// Recurrence requested through `recur:`, `rec:` or `rep:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceDirective {
    pub rule: RecurrenceRule,
    /// `None` for a bare `recur:<n><unit>`, which takes the configured
    /// default type.
    pub recurrence_type: Option<RecurrenceType>,
}

/// Tags to add and remove. The two sets are always disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDelta {
    pub add: BTreeSet<String>,
    pub remove: BTreeSet<String>,
}

impl TagDelta {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    /// Apply the delta to an existing tag set.
    pub fn apply(&self, tags: &mut BTreeSet<String>) {
        for tag in &self.remove {
            tags.remove(tag);
        }
        tags.extend(self.add.iter().cloned());
    }
}

/// Typed attribute set produced by [`parse`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    pub project: Option<Change<String>>,
    pub priority: Option<Change<Priority>>,
    pub due: Option<Change<NaiveDateTime>>,
    pub wait: Option<Change<NaiveDateTime>>,
    /// Raw identifier or prefix; resolved by the lifecycle manager.
    pub parent: Option<Change<String>>,
    pub recur: Option<RecurrenceDirective>,
    pub tags: TagDelta,
}

impl Attributes {
    /// Whether any attribute that may cascade to children is present.
    pub fn has_inheritable(&self) -> bool {
        self.project.is_some()
            || self.priority.is_some()
            || self.due.is_some()
            || self.wait.is_some()
            || !self.tags.is_empty()
    }

    /// Only the attributes that `modify_parent` copies to descendants.
    pub fn inheritable(&self) -> Attributes {
        Attributes {
            project: self.project.clone(),
            priority: self.priority.clone(),
            due: self.due.clone(),
            wait: self.wait.clone(),
            parent: None,
            recur: None,
            tags: self.tags.clone(),
        }
    }
}

/// Parsed command arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    /// Free text, `None` when no description token was given.
    pub description: Option<String>,
    pub attributes: Attributes,
}

/// The closed set of recognised keys, with their short aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeKey {
    Project,
    Priority,
    Due,
    Wait,
    Parent,
    Recur,
    Recurring,
    Repeating,
}

impl FromStr for AttributeKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" | "pro" => Ok(AttributeKey::Project),
            "priority" | "pri" => Ok(AttributeKey::Priority),
            "due" => Ok(AttributeKey::Due),
            "wait" => Ok(AttributeKey::Wait),
            "parent" => Ok(AttributeKey::Parent),
            "recur" => Ok(AttributeKey::Recur),
            "rec" => Ok(AttributeKey::Recurring),
            "rep" => Ok(AttributeKey::Repeating),
            _ => Err(ParseError::UnknownAttribute(s.to_string())),
        }
    }
}

/// Parse command tokens into a description and typed attributes.
///
/// `now` anchors relative dates. When a key appears more than once the last
/// occurrence wins.
pub fn parse<S: AsRef<str>>(tokens: &[S], now: NaiveDateTime) -> Result<ParsedArgs, ParseError> {
    let mut description: Vec<&str> = Vec::new();
    let mut attributes = Attributes::default();

    for token in tokens {
        let token = token.as_ref();
        if let Some(tag) = token.strip_prefix('+') {
            attributes.tags.add.insert(tag_name(tag)?);
        } else if let Some(tag) = token.strip_prefix('-') {
            attributes.tags.remove.insert(tag_name(tag)?);
        } else if let Some((key, value)) = split_attribute(token) {
            apply(&mut attributes, key.parse()?, key, value, now)?;
        } else {
            description.push(token);
        }
    }

    if let Some(tag) = attributes.tags.add.intersection(&attributes.tags.remove).next() {
        return Err(ParseError::ConflictingTagDirective(tag.clone()));
    }

    let description = (!description.is_empty()).then(|| description.join(" "));
    Ok(ParsedArgs { description, attributes })
}

/// Split `key:value` when the token starts with an alphabetic key. Values
/// starting with `//` are URLs and stay in the description.
fn split_attribute(token: &str) -> Option<(&str, &str)> {
    let (key, value) = token.split_once(':')?;
    let is_key = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphabetic());
    (is_key && !value.starts_with("//")).then_some((key, value))
}

fn tag_name(raw: &str) -> Result<String, ParseError> {
    let tag = raw.trim();
    if tag.is_empty() {
        return Err(ParseError::EmptyTag);
    }
    Ok(tag.to_string())
}

fn apply(
    attributes: &mut Attributes,
    key: AttributeKey,
    raw_key: &str,
    value: &str,
    now: NaiveDateTime,
) -> Result<(), ParseError> {
    let value = value.trim();
    match key {
        AttributeKey::Project => attributes.project = Some(text(value)),
        AttributeKey::Parent => attributes.parent = Some(text(value)),
        AttributeKey::Priority => {
            attributes.priority = Some(if value.is_empty() {
                Change::Clear
            } else {
                let priority = value.parse::<Priority>().map_err(|_| ParseError::InvalidValue {
                    key: raw_key.to_string(),
                    value: value.to_string(),
                })?;
                Change::Set(priority)
            });
        }
        AttributeKey::Due => attributes.due = Some(date(value, now)?),
        AttributeKey::Wait => attributes.wait = Some(date(value, now)?),
        AttributeKey::Recur | AttributeKey::Recurring | AttributeKey::Repeating => {
            let (rule, form) = RecurrenceRule::parse(value)?;
            let recurrence_type = match (key, form) {
                (AttributeKey::Recurring, _) => Some(RecurrenceType::Recurring),
                (AttributeKey::Repeating, _) => Some(RecurrenceType::Repeating),
                (_, RuleForm::Calendar) => Some(RecurrenceType::Recurring),
                (_, RuleForm::Interval) => None,
            };
            attributes.recur = Some(RecurrenceDirective { rule, recurrence_type });
        }
    }
    Ok(())
}

fn text(value: &str) -> Change<String> {
    if value.is_empty() {
        Change::Clear
    } else {
        Change::Set(value.to_string())
    }
}

fn date(value: &str, now: NaiveDateTime) -> Result<Change<NaiveDateTime>, ParseError> {
    if value.is_empty() {
        return Ok(Change::Clear);
    }
    parse_date(value, now).map(Change::Set)
}
