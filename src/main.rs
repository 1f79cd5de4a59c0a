use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mockable::DefaultClock;
use tracing_subscriber::EnvFilter;

use rdo::cli::Cli;
use rdo::cmd::{cmd_completions, run_command, Commands};
use rdo::config::{default_config_path, Config};
use rdo::db::Database;
use rdo::lifecycle::TaskManager;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = Config::load(&config_path)?;
    init_tracing(&config, cli.verbose);

    let command = cli.command.unwrap_or(Commands::Open);
    // Completions need no database.
    if let Commands::Completions { shell } = command {
        cmd_completions(shell);
        return Ok(());
    }

    let db_path = cli.db.unwrap_or_else(|| config.storage_path());
    let db = Database::load(&db_path)
        .with_context(|| format!("cannot load database {}", db_path.display()))?;
    let mut manager = TaskManager::new(db, Arc::new(DefaultClock)).with_settings(config.settings());

    if run_command(&mut manager, &config, command)? {
        manager
            .store()
            .save(&db_path)
            .with_context(|| format!("cannot save database {}", db_path.display()))?;
    }
    Ok(())
}

/// `RUST_LOG` wins over `log.level`; `--verbose` wins over both.
fn init_tracing(config: &Config, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level()))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
