//! SQL-based backend implementations.
//!
//! This module provides SQL database backends that implement the
//! `BackendImpl` trait, storing boards, lists and cards in relational tables.
//!
//! ## Available Backends
//!
//! - **SQLite** (feature: `sqlite`): Embedded database
//! - **PostgreSQL** (feature: `postgres`): PostgreSQL database
//!
//! ## Architecture
//!
//! The SQL backend uses sqlx with `AnyPool` for multi-database support.
//! A scope transaction is an sqlx transaction whose first statement bumps the
//! scope parent's version. On PostgreSQL that statement takes the parent's row
//! lock; on SQLite it takes the database write lock. Either way, concurrent
//! transactions on the same scope wait for each other until commit or
//! rollback.
//!
//! ## Schema and Migrations
//!
//! The database schema is defined in the [`schema`] module and automatically
//! initialized when connecting.

mod storage;
mod transaction;

/// Schema definition and migration system.
pub mod schema;

use std::any::Any;
use std::sync::Arc;
#[cfg(feature = "postgres")]
use std::time::Duration;

use async_trait::async_trait;
use sqlx::AnyPool;
#[cfg(feature = "postgres")]
use sqlx::Executor;
use sqlx::any::AnyPoolOptions;

use crate::Result;
use crate::backend::errors::BackendError;
use crate::backend::{BackendImpl, ScopeTransaction};
use crate::clock::{Clock, SystemClock};
use crate::entity::{Board, BoardId, Card, CardId, CardUpdate, List, ListId, Scope, UserId};

/// Extension trait for sqlx Result types to simplify error handling.
///
/// Similar to `anyhow::Context`, this trait adds a method to convert
/// sqlx errors to `BackendError::SqlxError` with a context message.
pub(crate) trait SqlxResultExt<T> {
    /// Convert sqlx error to BackendError with context message.
    fn sql_context(self, context: &str) -> Result<T>;
}

impl<T> SqlxResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn sql_context(self, context: &str) -> Result<T> {
        self.map_err(|e| {
            BackendError::SqlxError {
                reason: format!("{context}: {e}"),
                source: Some(e),
            }
            .into()
        })
    }
}

/// Database backend kind for SQL dialect selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    /// SQLite database
    Sqlite,
    /// PostgreSQL database
    Postgres,
}

/// SQL-based backend implementing `BackendImpl` using sqlx.
///
/// This backend supports both SQLite and PostgreSQL through sqlx's `AnyPool`.
///
/// # Test Isolation
///
/// For PostgreSQL, each backend instance can use its own schema for test
/// isolation. Use `connect_isolated()` to create one.
pub struct SqlxBackend {
    pool: AnyPool,
    kind: DbKind,
    clock: Arc<dyn Clock>,
}

impl SqlxBackend {
    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Get the database kind.
    pub fn kind(&self) -> DbKind {
        self.kind
    }

    /// Check if this backend is using SQLite.
    pub fn is_sqlite(&self) -> bool {
        self.kind == DbKind::Sqlite
    }

    /// Check if this backend is using PostgreSQL.
    pub fn is_postgres(&self) -> bool {
        self.kind == DbKind::Postgres
    }

    /// Replace the clock used to stamp `created_at` / `updated_at`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) fn now(&self) -> i64 {
        self.clock.now_millis()
    }
}

// SQLite-specific implementations
#[cfg(feature = "sqlite")]
impl SqlxBackend {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use kanban_rank::backend::database::Sqlite;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let backend = Sqlite::open("kanban.db").await.unwrap();
    /// }
    /// ```
    pub async fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        // mode=rwc: read-write-create (create file if it doesn't exist)
        let url = format!("sqlite:{}?mode=rwc", path.as_ref().display());
        Self::connect_sqlite(&url).await
    }

    /// Connect to a SQLite database using a connection URL.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite:./kanban.db")
    pub async fn connect_sqlite(url: &str) -> Result<Self> {
        // Install any driver support
        sqlx::any::install_default_drivers();

        let is_in_memory = url.contains("mode=memory");

        // The in-memory database disappears with its last connection, so keep
        // one open for the lifetime of the pool.
        let pool = if is_in_memory {
            AnyPoolOptions::new()
                .max_connections(5)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(url)
                .await
                .sql_context("Failed to connect to SQLite")?
        } else {
            AnyPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .sql_context("Failed to connect to SQLite")?
        };

        if is_in_memory {
            sqlx::query("PRAGMA busy_timeout = 5000;")
                .execute(&pool)
                .await
                .sql_context("Failed to configure SQLite")?;
        } else {
            // - journal_mode=WAL: readers don't block the single writer
            // - synchronous=NORMAL: safe with WAL
            // - busy_timeout=5000: concurrent scope transactions queue on the
            //   write lock instead of failing immediately
            sqlx::query(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;",
            )
            .execute(&pool)
            .await
            .sql_context("Failed to configure SQLite")?;
        }

        let backend = Self {
            pool,
            kind: DbKind::Sqlite,
            clock: Arc::new(SystemClock),
        };

        schema::initialize(&backend).await?;

        Ok(backend)
    }

    /// Create an in-memory SQLite database.
    ///
    /// The database exists only for the lifetime of this backend instance.
    /// Useful for testing.
    pub async fn in_memory() -> Result<Self> {
        // Shared cache so all pooled connections see the same database; a
        // unique name per instance keeps tests apart.
        let unique_id = uuid::Uuid::new_v4();
        let url = format!("sqlite:file:mem_{unique_id}?mode=memory&cache=shared");
        Self::connect_sqlite(&url).await
    }
}

// PostgreSQL-specific implementations
#[cfg(feature = "postgres")]
impl SqlxBackend {
    /// Connect to a PostgreSQL database using a connection URL.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use kanban_rank::backend::database::Postgres;
    ///
    /// let backend = Postgres::connect("postgres://localhost/kanban").await.unwrap();
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_postgres_with_schema(url, None).await
    }

    /// Connect to a PostgreSQL database with a specific schema for isolation.
    async fn connect_postgres_with_schema(url: &str, schema_name: Option<String>) -> Result<Self> {
        sqlx::any::install_default_drivers();

        if let Some(ref schema) = schema_name {
            let temp_pool = AnyPoolOptions::new()
                .max_connections(1)
                .connect(url)
                .await
                .sql_context("Failed to connect to PostgreSQL")?;

            let create_schema = format!("CREATE SCHEMA IF NOT EXISTS {schema}");
            sqlx::query(&create_schema)
                .execute(&temp_pool)
                .await
                .sql_context(&format!("Failed to create schema {schema}"))?;

            temp_pool.close().await;
        }

        let schema_for_hook = schema_name.clone();
        let mut pool_options = AnyPoolOptions::new();

        if schema_name.is_some() {
            // Many isolated test backends run in parallel; keep each small and
            // wait rather than fail on connection pressure.
            pool_options = pool_options
                .max_connections(2)
                .acquire_timeout(Duration::from_secs(30));
        } else {
            pool_options = pool_options.max_connections(10);
        }

        let pool = pool_options
            .after_connect(move |conn, _meta| {
                let schema = schema_for_hook.clone();
                Box::pin(async move {
                    if let Some(ref s) = schema {
                        let set_path = format!("SET search_path TO {s}");
                        conn.execute(set_path.as_str()).await?;
                    }
                    Ok(())
                })
            })
            .connect(url)
            .await
            .sql_context("Failed to connect to PostgreSQL")?;

        let backend = Self {
            pool,
            kind: DbKind::Postgres,
            clock: Arc::new(SystemClock),
        };

        schema::initialize(&backend).await?;

        Ok(backend)
    }

    /// Connect to a PostgreSQL database in a fresh, uniquely named schema.
    ///
    /// Tests running in parallel each get their own tables.
    pub async fn connect_isolated(url: &str) -> Result<Self> {
        // PostgreSQL schema names must start with a letter and be lowercase
        let unique_id = uuid::Uuid::new_v4().simple().to_string();
        let schema_name = format!("test_{unique_id}");
        Self::connect_postgres_with_schema(url, Some(schema_name)).await
    }
}

#[async_trait]
impl BackendImpl for SqlxBackend {
    async fn begin_scope(&self, scope: &Scope) -> Result<Box<dyn ScopeTransaction>> {
        let txn = transaction::SqlxScopeTransaction::begin(self, scope).await?;
        Ok(Box::new(txn))
    }

    async fn create_board(
        &self,
        name: &str,
        created_by: UserId,
        list_titles: &[&str],
    ) -> Result<Board> {
        storage::create_board(self, name, created_by, list_titles).await
    }

    async fn get_board(&self, id: &BoardId) -> Result<Board> {
        storage::get_board(self, id).await
    }

    async fn boards_for_user(&self, user_id: &UserId) -> Result<Vec<Board>> {
        storage::boards_for_user(self, user_id).await
    }

    async fn rename_board(&self, id: &BoardId, name: &str) -> Result<Board> {
        storage::rename_board(self, id, name).await
    }

    async fn delete_board(&self, id: &BoardId) -> Result<()> {
        storage::delete_board(self, id).await
    }

    async fn update_list(&self, id: &ListId, title: &str) -> Result<List> {
        storage::update_list(self, id, title).await
    }

    async fn update_card(&self, id: &CardId, update: &CardUpdate) -> Result<Card> {
        storage::update_card(self, id, update).await
    }

    async fn get_list(&self, id: &ListId) -> Result<List> {
        storage::get_list(self, id).await
    }

    async fn get_card(&self, id: &CardId) -> Result<Card> {
        storage::get_card(self, id).await
    }

    async fn lists_in_board(&self, board_id: &BoardId) -> Result<Vec<List>> {
        storage::lists_in_board(self, board_id).await
    }

    async fn cards_in_list(&self, list_id: &ListId) -> Result<Vec<Card>> {
        storage::cards_in_list(self, list_id).await
    }

    async fn delete_list(&self, id: &ListId) -> Result<()> {
        storage::delete_list(self, id).await
    }

    async fn delete_card(&self, id: &CardId) -> Result<()> {
        storage::delete_card(self, id).await
    }

    async fn add_member(&self, board_id: &BoardId, user_id: &UserId) -> Result<()> {
        storage::add_member(self, board_id, user_id).await
    }

    async fn is_member(&self, board_id: &BoardId, user_id: &UserId) -> Result<bool> {
        storage::is_member(self, board_id, user_id).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(feature = "sqlite")]
/// Convenience type alias for SQLite backend using sqlx.
pub type Sqlite = SqlxBackend;

#[cfg(feature = "postgres")]
/// Convenience type alias for PostgreSQL backend using sqlx.
pub type Postgres = SqlxBackend;
