//! ConvoQuery CLI — the main entry point.
//!
//! Commands:
//! - `run`      — Answer every query for every session of a message log
//! - `onboard`  — Write a default config file
//! - `config`   — Show, validate or locate the configuration
//! - `check`    — Health-check the configured completion endpoint

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod export;
mod ingest;
mod progress;

#[derive(Parser)]
#[command(
    name = "convoquery",
    about = "ConvoQuery — ask the same questions of every conversation session",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer every query for every session
    Run {
        /// Delimited file with one message per row
        #[arg(short, long)]
        messages: PathBuf,

        /// Delimited file with one query per row
        #[arg(short, long)]
        queries: PathBuf,

        /// Write results here instead of printing a table
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the number of in-flight completion calls
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Credential for the completion service
        #[arg(long, env = "CONVOQUERY_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Write a default configuration file
    Onboard,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Check that the completion endpoint is reachable
    Check,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (credential redacted)
    Show,
    /// Validate the configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            messages,
            queries,
            output,
            concurrency,
            api_key,
        } => {
            commands::run::run(commands::run::RunArgs {
                messages,
                queries,
                output,
                concurrency,
                api_key,
            })
            .await?
        }
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
        Commands::Check => commands::check::run().await?,
    }

    Ok(())
}
