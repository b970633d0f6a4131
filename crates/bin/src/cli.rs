//! CLI argument definitions for the kanban-rank binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Storage backend type
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Backend {
    /// SQLite database (default, production-ready)
    Sqlite,
    /// PostgreSQL database (for shared deployments)
    Postgres,
    /// In-memory with JSON persistence (for development and ephemeral deployments)
    Inmemory,
}

/// Ordered kanban boards over HTTP
#[derive(Parser, Debug)]
#[command(name = "kanban-rank")]
#[command(about = "kanban-rank: ordered lists and cards for kanban boards")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the kanban-rank server
    Serve(ServeArgs),
    /// Check health of a running kanban-rank server
    Health(HealthArgs),
}

/// Arguments for the serve command
#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value_t = 3000, env = "KANBAN_RANK_PORT")]
    pub port: u16,

    /// Bind address
    #[arg(long, default_value = "0.0.0.0", env = "KANBAN_RANK_HOST")]
    pub host: String,

    /// Storage backend to use
    #[arg(short, long, default_value = "sqlite", env = "KANBAN_RANK_BACKEND")]
    pub backend: Backend,

    /// Data directory for storage files.
    /// For SQLite: stores kanban-rank.db
    /// For InMemory: stores kanban-rank.json
    #[arg(short = 'D', long, env = "KANBAN_RANK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// PostgreSQL connection URL (required when backend=postgres)
    #[arg(long, env = "KANBAN_RANK_POSTGRES_URL")]
    pub postgres_url: Option<String>,
}

/// Arguments for the health command
#[derive(clap::Args, Debug)]
pub struct HealthArgs {
    /// Base URL of the server to check
    #[arg(long, default_value = "http://127.0.0.1:3000", env = "KANBAN_RANK_URL")]
    pub url: String,

    /// Timeout in seconds
    #[arg(short, long, default_value_t = 5)]
    pub timeout: u64,
}
