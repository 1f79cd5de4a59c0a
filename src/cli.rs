use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Personal task tracker with attribute tokens, cascades and recurrence.
/// Storage defaults to ~/.local/share/rdo/tasks.json or a path passed via --db.
#[derive(Parser)]
#[command(name = "rdo", version, about = "Personal task tracker")]
pub struct Cli {
    /// Path to the JSON database file.
    #[arg(long, global = true, env = "RDO_DATABASE")]
    pub db: Option<PathBuf>,

    /// Path to the YAML configuration file.
    #[arg(long, global = true, env = "RDO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log debug events to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Defaults to `open`.
    #[command(subcommand)]
    pub command: Option<Commands>,
}
