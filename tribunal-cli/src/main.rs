//! Tribunal CLI - Command line interface for three-axis proposal review
//!
//! Spawns correctness, test-quality and elegance reviewers for a proposal,
//! records their ACCEPT/REVISE votes and reports consensus.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tribunal_core::config::CliOverrides;
use tribunal_core::{Config, StoreBackend};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{AdvanceArgs, NameArgs, RequestArgs, StatusArgs, SyncArgs, VoteArgs};

/// Tribunal: three-axis review of proposals
#[derive(Parser, Debug)]
#[command(name = "tribunal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Task Store backend: cli, github or memory (overrides config and env)
    #[arg(long, global = true)]
    store: Option<StoreBackend>,

    /// Tracker executable for the cli backend (overrides config and env)
    #[arg(long, global = true)]
    tracker: Option<String>,

    /// Repository for the github backend, owner/repo or URL (overrides config and env)
    #[arg(long, global = true)]
    repo: Option<String>,

    /// Review state database (overrides config and env)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Review round bound (overrides config and env)
    #[arg(long, global = true)]
    max_rounds: Option<u32>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Spawn reviewers for the next round of a proposal
    #[command(visible_alias = "r")]
    Request(RequestArgs),

    /// Record a reviewer's vote
    Vote(VoteArgs),

    /// Show review state and consensus
    #[command(visible_alias = "st")]
    Status(StatusArgs),

    /// Read votes posted as comments on review tasks
    Sync(SyncArgs),

    /// Open the next round if the latest one asked for revision
    Advance(AdvanceArgs),

    /// Format or parse review task names
    Name(NameArgs),

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = Config::load_with_overrides(CliOverrides {
        backend: cli.store,
        tracker: cli.tracker.clone(),
        repo: cli.repo.clone(),
        database: cli.database.clone(),
        max_rounds: cli.max_rounds,
    })?;

    if cli.verbose {
        tracing::info!(
            backend = %config.store.backend,
            max_rounds = config.review.max_rounds,
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("tribunal {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Request(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Vote(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Status(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Sync(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Advance(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Name(args)) => {
            args.execute()?;
        }
        Some(Commands::Config) => {
            print_config(&config);
        }
        None => {
            println!("Tribunal - three-axis review of proposals");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

fn print_config(config: &Config) {
    println!("Tribunal Configuration");
    println!("======================");
    println!();
    println!("Review Settings:");
    println!("  max_rounds: {}", config.review.max_rounds);
    println!("  on_exhaustion: {}", config.review.on_exhaustion);
    println!(
        "  reviewer_timeout: {}",
        humantime::format_duration(config.review.reviewer_timeout)
    );
    println!(
        "  requirements_ref: {}",
        config.review.requirements_ref.as_deref().unwrap_or("(none)")
    );
    println!();
    println!("Task Store:");
    println!("  backend: {}", config.store.backend);
    println!("  timeout: {}", humantime::format_duration(config.store.timeout));
    match config.store.backend {
        StoreBackend::Cli => println!("  program: {}", config.store.cli.program),
        StoreBackend::Github => {
            println!(
                "  repo: {}",
                config.store.github.repo.as_deref().unwrap_or("(not set)")
            );
            println!("  label: {}", config.store.github.label);
        }
        StoreBackend::Memory => println!("  (nothing is persisted)"),
    }
    println!();
    match commands::database_path(config) {
        Ok(path) => println!("Database: {}", path.display()),
        Err(e) => println!("Database: unavailable ({})", e),
    }
    if let Some(path) = Config::default_config_path() {
        println!("Config file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - using defaults)");
        }
    }
}
