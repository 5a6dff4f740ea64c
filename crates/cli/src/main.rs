//! lsfr CLI - Main Entry Point
//!
//! Command-line interface for working through lsfr challenges: scaffolding
//! a challenge directory, running stage tests against your implementation,
//! and tracking progress.

use clap::{Parser, Subcommand};
use lsfr_registry::Registry;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

mod commands;
mod progress;

/// Build complex systems from scratch
#[derive(Parser)]
#[command(name = "lsfr")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new challenge
    New {
        /// Challenge key, e.g. key-value-store
        challenge: String,

        /// Directory to create (defaults to the current directory)
        path: Option<PathBuf>,
    },

    /// Test your implementation
    Test {
        /// Stage to test (defaults to the current stage)
        stage: Option<String>,
    },

    /// Advance to the next stage
    Next,

    /// Show current progress
    Status,

    /// Show available challenges
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let registry = Registry::builtin();

    // A Ctrl-C cancels the scope so suite runs tear their processes down
    // before the CLI exits.
    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    match cli.command {
        Commands::New { challenge, path } => commands::new::execute(&registry, &challenge, path),
        Commands::Test { stage } => commands::test::execute(&registry, stage, token).await,
        Commands::Next => commands::next::execute(&registry, token).await,
        Commands::Status => commands::status::execute(&registry),
        Commands::List => commands::list::execute(&registry),
    }
}
