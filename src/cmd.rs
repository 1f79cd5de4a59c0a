//! Command implementations for the CLI interface.
//!
//! Each handler drives the [`TaskManager`] or renders a report, and tells the
//! caller whether the database changed and needs saving.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::Subcommand;
use clap_complete::{generate, Shell};
use mockable::Clock;

use crate::config::Config;
use crate::db::Database;
use crate::fields::{RecurrenceType, State};
use crate::lifecycle::{Outcome, TaskManager};
use crate::report::{
    count_table, project_counts, short_ids, sort_tasks, tag_counts, task_table, template_table,
};
use crate::store::{TaskFilter, TaskStore};
use crate::task::{Task, TaskId};

#[derive(Subcommand)]
pub enum Commands {
    /// Add a task: description words mixed with key:value, +tag and -tag tokens.
    Add {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        tokens: Vec<String>,
    },

    /// Modify a task.
    #[command(visible_alias = "modify")]
    Mod {
        /// Also apply project, priority, dates and tags to all open descendants.
        #[arg(long)]
        parent: bool,
        /// Task identifier or unique prefix.
        id: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        tokens: Vec<String>,
    },

    /// Delete a task.
    #[command(visible_alias = "delete")]
    Del {
        /// Delete all open descendants too.
        #[arg(long)]
        parent: bool,
        id: String,
    },

    /// Complete a task.
    #[command(visible_alias = "complete")]
    Done {
        /// Complete all open descendants too.
        #[arg(long)]
        parent: bool,
        id: String,
    },

    /// Freeze a task. Freezing a template pauses its series.
    Freeze {
        /// Freeze all open descendants too.
        #[arg(long)]
        parent: bool,
        id: String,
    },

    /// Unfreeze a frozen task.
    Unfreeze {
        /// Unfreeze all frozen descendants too.
        #[arg(long)]
        parent: bool,
        id: String,
    },

    /// List open tasks that are not waiting.
    Open,

    /// List frozen tasks.
    Frozen,

    /// List recurring templates.
    Recurring,

    /// List repeating templates.
    Repeating,

    /// Open task count per project.
    Projects,

    /// Open task count per tag.
    Tags,

    /// Dump every task as JSON to stdout.
    Export,

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Run one command. Returns whether the database changed.
pub fn run_command<C: Clock>(
    manager: &mut TaskManager<Database, C>,
    config: &Config,
    command: Commands,
) -> Result<bool> {
    match command {
        Commands::Add { tokens } => cmd_add(manager, &tokens).map(|()| true),
        Commands::Mod { parent, id, tokens } => cmd_modify(manager, &id, &tokens, parent).map(|()| true),
        Commands::Del { parent, id } => {
            let outcome = manager.delete(&id, parent).with_context(|| format!("cannot delete '{id}'"))?;
            print_outcome("Deleted", &outcome);
            Ok(true)
        }
        Commands::Done { parent, id } => {
            let outcome =
                manager.complete(&id, parent).with_context(|| format!("cannot complete '{id}'"))?;
            print_outcome("Completed", &outcome);
            Ok(true)
        }
        Commands::Freeze { parent, id } => {
            let outcome = manager.freeze(&id, parent).with_context(|| format!("cannot freeze '{id}'"))?;
            print_outcome("Froze", &outcome);
            Ok(true)
        }
        Commands::Unfreeze { parent, id } => {
            let outcome =
                manager.unfreeze(&id, parent).with_context(|| format!("cannot unfreeze '{id}'"))?;
            print_outcome("Unfroze", &outcome);
            Ok(true)
        }
        Commands::Open => cmd_open(manager).map(|()| false),
        Commands::Frozen => cmd_frozen(manager).map(|()| false),
        Commands::Recurring => cmd_templates(manager, config, RecurrenceType::Recurring).map(|()| false),
        Commands::Repeating => cmd_templates(manager, config, RecurrenceType::Repeating).map(|()| false),
        Commands::Projects => cmd_projects(manager).map(|()| false),
        Commands::Tags => cmd_tags(manager).map(|()| false),
        Commands::Export => cmd_export(manager.store()).map(|()| false),
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(false)
        }
    }
}

pub fn cmd_add<C: Clock>(manager: &mut TaskManager<Database, C>, tokens: &[String]) -> Result<()> {
    let id = manager.add(tokens).context("cannot add task")?;
    let task = manager.store().get(id)?;
    if task.is_template() {
        println!("Created recurring template {id}.");
    } else {
        println!("Created task {id}.");
    }
    Ok(())
}

pub fn cmd_modify<C: Clock>(
    manager: &mut TaskManager<Database, C>,
    id: &str,
    tokens: &[String],
    parent: bool,
) -> Result<()> {
    let outcome = if parent {
        manager.modify_parent(id, tokens)
    } else {
        manager.modify(id, tokens)
    }
    .with_context(|| format!("cannot modify '{id}'"))?;
    print_outcome("Modified", &outcome);
    Ok(())
}

pub fn cmd_open<C: Clock>(manager: &TaskManager<Database, C>) -> Result<()> {
    let mut tasks = open_tasks(manager.store(), manager.now())?;
    sort_tasks(&mut tasks);
    print!("{}", task_table(&tasks, &visible_ids(manager.store())?, manager.now().date()));
    Ok(())
}

pub fn cmd_frozen<C: Clock>(manager: &TaskManager<Database, C>) -> Result<()> {
    let mut tasks = frozen_tasks(manager.store())?;
    sort_tasks(&mut tasks);
    print!("{}", task_table(&tasks, &visible_ids(manager.store())?, manager.now().date()));
    Ok(())
}

pub fn cmd_templates<C: Clock>(
    manager: &TaskManager<Database, C>,
    config: &Config,
    recurrence_type: RecurrenceType,
) -> Result<()> {
    let templates = templates(manager.store(), recurrence_type)?;
    print!(
        "{}",
        template_table(&templates, &visible_ids(manager.store())?, &config.date_format())
    );
    Ok(())
}

/// List all projects with their open task counts.
pub fn cmd_projects<C: Clock>(manager: &TaskManager<Database, C>) -> Result<()> {
    let open = open_tasks(manager.store(), manager.now())?;
    let counts = project_counts(&open, &manager.store().projects()?);
    print!("{}", count_table("Project", &counts));
    Ok(())
}

/// List all tags with their open task counts.
pub fn cmd_tags<C: Clock>(manager: &TaskManager<Database, C>) -> Result<()> {
    let open = open_tasks(manager.store(), manager.now())?;
    let counts = tag_counts(&open, &manager.store().tags()?);
    print!("{}", count_table("Tag", &counts));
    Ok(())
}

pub fn cmd_export(store: &impl TaskStore) -> Result<()> {
    let tasks = store.find(&TaskFilter::new())?;
    println!("{}", serde_json::to_string_pretty(&tasks).context("cannot serialise tasks")?);
    Ok(())
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}

/// Open, non-template tasks whose wait date has passed.
pub fn open_tasks(store: &impl TaskStore, now: NaiveDateTime) -> Result<Vec<Task>> {
    let mut tasks = store.find(&TaskFilter::new().with_states([State::Open]).templates(false))?;
    tasks.retain(|t| !t.is_waiting(now));
    Ok(tasks)
}

pub fn frozen_tasks(store: &impl TaskStore) -> Result<Vec<Task>> {
    Ok(store.find(&TaskFilter::new().with_states([State::Frozen]).templates(false))?)
}

/// Live templates of one recurrence type.
pub fn templates(store: &impl TaskStore, recurrence_type: RecurrenceType) -> Result<Vec<Task>> {
    let mut tasks = store.find(
        &TaskFilter::new().with_states([State::Open, State::Frozen]).templates(true),
    )?;
    tasks.retain(|t| t.recurrence().is_some_and(|r| r.recurrence_type == recurrence_type));
    Ok(tasks)
}

/// Short display identifiers, unique among tasks that are not deleted.
fn visible_ids(store: &impl TaskStore) -> Result<HashMap<TaskId, String>> {
    let ids: Vec<TaskId> = store
        .find(&TaskFilter::new().with_states([State::Open, State::Frozen, State::Completed]))?
        .iter()
        .map(|t| t.id)
        .collect();
    Ok(short_ids(&ids))
}

fn print_outcome(verb: &str, outcome: &Outcome) {
    for id in &outcome.changed {
        println!("{verb} task {id}.");
    }
    for id in &outcome.spawned {
        println!("Created next instance {id}.");
    }
}
