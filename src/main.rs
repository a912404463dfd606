//! Task Forest server binary.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use task_forest::config::Config;
use task_forest::db::Database;
use task_forest::server::{serve, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "task-forest", version, about = "Task server with a hierarchical move engine")]
struct Cli {
    /// Path to the SQLite database (overrides config).
    #[arg(long)]
    db: Option<PathBuf>,

    /// Port for the HTTP API (overrides config).
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API server (default).
    Serve,
    /// Create the database and run migrations, then exit.
    InitDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for tooling.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load_or_default();
    if let Some(db) = cli.db {
        config.server.db_path = db;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    config.ensure_db_dir()?;
    let db = Database::open(&config.server.db_path)?;
    info!(path = %config.server.db_path.display(), "database ready");

    match cli.command.unwrap_or(Command::Serve) {
        Command::InitDb => Ok(()),
        Command::Serve => {
            let port = config.server.port;
            serve(AppState::new(db, Arc::new(config)), port).await
        }
    }
}
