//! # Database Connection Pool
//!
//! SQLite pooling for the vault with the settings the scraper also uses:
//! WAL journaling, enforced foreign keys, and a busy timeout so concurrent
//! readers do not fail hard while the scraper writes.
//!
//! ## Testing
//!
//! ```rust,ignore
//! let pool = create_test_pool().await?; // in-memory, schema pre-created
//! ```

use crate::error::{Result, StoreError};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Database configuration for the vault connection pool
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL, `sqlite:<path>` or `sqlite::memory:`
    pub database_url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Maximum time to wait for a connection from the pool
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    /// Configuration for an on-disk vault.
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        let path = database_path.into();
        Self {
            database_url: format!("sqlite:{}", path.display()),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// Configuration for an in-memory database (testing).
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// Set the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Create a configured SQLite connection pool for the vault.
///
/// # Errors
///
/// Returns an error when the database file cannot be opened or the pool
/// cannot be created.
pub async fn create_pool(config: DatabaseConfig) -> Result<Pool<Sqlite>> {
    info!(database_url = %config.database_url, "Opening vault database");

    let options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|e| StoreError::Database(e.to_string()))?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

    debug!("Vault pool ready");
    Ok(pool)
}

/// Create the vault schema.
///
/// The scraper owns this schema in production; the sync engine only ever
/// runs it against test databases.
pub async fn initialize_schema(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL,
            display_name TEXT,
            avatar_media_id INTEGER,
            performer_remote_id TEXT,
            studio_remote_id TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY,
            account_id INTEGER NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            gallery_remote_id TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY,
            account_id INTEGER NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            gallery_remote_id TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attachments (
            item_kind TEXT NOT NULL,
            item_id INTEGER NOT NULL,
            pos INTEGER NOT NULL,
            media_id INTEGER,
            bundle_id INTEGER,
            aggregated_post_id INTEGER,
            PRIMARY KEY (item_kind, item_id, pos)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_mentions (
            item_kind TEXT NOT NULL,
            item_id INTEGER NOT NULL,
            account_id INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_hashtags (
            item_kind TEXT NOT NULL,
            item_id INTEGER NOT NULL,
            tag TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS media (
            id INTEGER PRIMARY KEY,
            mime_type TEXT NOT NULL,
            local_path TEXT,
            remote_link TEXT,
            is_preview INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS media_variants (
            media_id INTEGER NOT NULL,
            variant_id INTEGER NOT NULL,
            pos INTEGER NOT NULL,
            PRIMARY KEY (media_id, variant_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bundle_media (
            bundle_id INTEGER NOT NULL,
            media_id INTEGER NOT NULL,
            pos INTEGER NOT NULL,
            PRIMARY KEY (bundle_id, media_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_posts_account ON posts(account_id, created_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_messages_account ON messages(account_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create an in-memory pool with the vault schema, for tests.
pub async fn create_test_pool() -> Result<Pool<Sqlite>> {
    let pool = create_pool(DatabaseConfig::in_memory()).await?;
    initialize_schema(&pool).await?;
    Ok(pool)
}
