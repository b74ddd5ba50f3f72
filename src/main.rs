//! # Article Harness CLI (`articles`)
//!
//! ## Usage
//!
//! ```bash
//! articles --config ./config/articles.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `articles init` | Create the SQLite database and run schema migrations |
//! | `articles ingest` | Run one ingestion pass (subject to the startup gate) |
//! | `articles status` | Query a running server for pipeline status |
//! | `articles get <slug>` | Print a stored article |
//! | `articles stats` | Summarize stored articles |
//! | `articles serve` | Start the status server and the startup load |
//!
//! Logs go to stderr; set `RUST_LOG` to adjust verbosity.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use article_harness::{config, get, ingest, migrate, server, stats};

/// Article Harness: ingest, enrich and serve markdown articles.
#[derive(Parser)]
#[command(
    name = "articles",
    about = "Article Harness — ingest and enrich markdown articles",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/articles.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Run one ingestion pass over the content root.
    Ingest {
        /// Skip the startup gate and load even if articles already exist.
        #[arg(long)]
        force: bool,

        /// Parse and enrich locally, print the results, write nothing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Query a running server for pipeline status.
    Status,

    /// Print an article by slug.
    Get {
        /// Article slug.
        slug: String,
    },

    /// Summarize stored articles.
    Stats,

    /// Start the status server.
    ///
    /// Runs the startup load in the background and serves `/health`,
    /// `/status`, `/trigger` and `/articles/{slug}` until Ctrl-C.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { force, dry_run } => {
            ingest::run_ingest(&cfg, force, dry_run).await?;
        }
        Commands::Status => {
            let url = format!("http://{}/status", cfg.server.bind);
            let status: serde_json::Value = reqwest::get(&url)
                .await
                .with_context(|| format!("Failed to reach server at {}", url))?
                .error_for_status()?
                .json()
                .await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Get { slug } => {
            get::run_get(&cfg, &slug).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
