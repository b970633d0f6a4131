//! Backend creation and utility functions.

use std::path::{Path, PathBuf};

use kanban_rank::backend::{
    BackendImpl,
    database::{InMemory, Postgres, Sqlite},
};

use crate::cli::{Backend, ServeArgs};

const SQLITE_FILE: &str = "kanban-rank.db";
const JSON_FILE: &str = "kanban-rank.json";

/// Redact credentials from a PostgreSQL connection URL for safe logging
pub fn redact_postgres_url(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        let mut redacted = parsed.clone();
        if !parsed.username().is_empty() {
            let _ = redacted.set_username("***");
        }
        if parsed.password().is_some() {
            let _ = redacted.set_password(Some("***"));
        }
        redacted.to_string()
    } else {
        "postgres://***@<unparsable-url>".to_string()
    }
}

/// Directory holding the storage files
pub fn data_dir(args: &ServeArgs) -> PathBuf {
    args.data_dir.clone().unwrap_or_else(|| PathBuf::from("."))
}

/// Path of the JSON snapshot used by the in-memory backend
pub fn snapshot_path(data_dir: &Path) -> PathBuf {
    data_dir.join(JSON_FILE)
}

/// Create the appropriate backend based on configuration
pub async fn create_backend(
    args: &ServeArgs,
) -> Result<Box<dyn BackendImpl>, Box<dyn std::error::Error>> {
    let data_dir = data_dir(args);

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir).await?;

    match args.backend {
        Backend::Sqlite => {
            let db_path = data_dir.join(SQLITE_FILE);
            tracing::info!("Using SQLite backend at {}", db_path.display());
            Ok(Box::new(Sqlite::open(&db_path).await?))
        }
        Backend::Postgres => {
            let url = args
                .postgres_url
                .as_ref()
                .ok_or("PostgreSQL backend requires --postgres-url or KANBAN_RANK_POSTGRES_URL")?;

            let display_url = redact_postgres_url(url);
            tracing::info!("Connecting to PostgreSQL backend at {}", display_url);

            match Postgres::connect(url).await {
                Ok(backend) => {
                    tracing::info!("Connected to PostgreSQL successfully");
                    Ok(Box::new(backend))
                }
                Err(e) => {
                    Err(format!("Failed to connect to PostgreSQL at {}: {}", display_url, e).into())
                }
            }
        }
        Backend::Inmemory => {
            let json_path = snapshot_path(&data_dir);
            tracing::info!(
                "Using in-memory backend with persistence at {}",
                json_path.display()
            );
            // A snapshot that exists but fails to load is an error, not a fresh start
            if !tokio::fs::try_exists(&json_path).await? {
                tracing::info!("Starting with fresh database");
                return Ok(Box::new(InMemory::new()));
            }
            match InMemory::load_from_file(&json_path).await {
                Ok(backend) => {
                    tracing::info!("Loaded existing data from {}", json_path.display());
                    Ok(Box::new(backend))
                }
                Err(e) => Err(format!("Failed to load {}: {}", json_path.display(), e).into()),
            }
        }
    }
}
