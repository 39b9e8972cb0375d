// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Perch - a self-hosted social post scheduler and account reconciler.
//!
//! Binary entry point: parses the CLI, loads and validates configuration,
//! and dispatches to the daemon or one of the one-shot commands.

mod commands;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use perch_config::{ConfigError, PerchConfig};

/// Perch - schedule posts, track engagement, reconcile account history.
#[derive(Parser, Debug)]
#[command(name = "perch", version, about, long_about = None)]
struct Cli {
    /// Path to a config file (skips the XDG lookup).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the scheduler daemon.
    Serve,
    /// Run one full history resync for an account.
    Sync {
        #[arg(long)]
        account: String,
    },
    /// Import a single post by URL.
    Import {
        url: String,
        #[arg(long)]
        account: String,
    },
    /// Publish a stored post immediately.
    PublishNow { id: i64 },
    /// Print aggregate stats and best posting hours.
    Stats {
        #[arg(long)]
        account: Option<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<PerchConfig, Vec<ConfigError>> {
    match path {
        None => perch_config::load_and_validate(),
        Some(path) => match perch_config::load_config_from_path(path) {
            Ok(config) => {
                perch_config::validation::validate_config(&config)?;
                Ok(config)
            }
            Err(err) => Err(perch_config::diagnostic::figment_to_config_errors(err, &[])),
        },
    }
}

fn init_tracing(log_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            perch_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config.daemon.log_level);

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Sync { account } => commands::run_sync(config, &account).await,
        Commands::Import { url, account } => commands::run_import(config, &url, &account).await,
        Commands::PublishNow { id } => commands::run_publish_now(config, id).await,
        Commands::Stats { account } => commands::run_stats(config, account.as_deref()).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_all_subcommands() {
        use clap::CommandFactory;
        Cli::command().debug_assert();

        let cli = Cli::parse_from(["perch", "sync", "--account", "sparrow"]);
        assert!(matches!(cli.command, Commands::Sync { ref account } if account == "sparrow"));

        let cli = Cli::parse_from(["perch", "publish-now", "42"]);
        assert!(matches!(cli.command, Commands::PublishNow { id: 42 }));

        let cli = Cli::parse_from([
            "perch",
            "import",
            "https://x.example/s/1",
            "--account",
            "sparrow",
        ]);
        assert!(matches!(cli.command, Commands::Import { .. }));
    }

    #[test]
    fn default_config_loads_without_files() {
        // No config file in the test environment: defaults must be valid.
        let config = perch_config::load_and_validate_str("").expect("defaults should validate");
        assert_eq!(config.scheduler.due_check_secs, 60);
    }
}
