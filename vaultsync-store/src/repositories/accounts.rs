//! Account repository
//!
//! Accounts are read from the vault; the two remote link columns are the
//! only writes the sync engine performs on the store.

use crate::error::Result;
use crate::models::{Account, AccountId, MediaId};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Repository for account rows.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Find an account by id.
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>>;

    /// Record the catalog performer id on the account row.
    async fn set_performer_link(&self, id: AccountId, remote_id: &str) -> Result<()>;

    /// Record the catalog studio id on the account row.
    async fn set_studio_link(&self, id: AccountId, remote_id: &str) -> Result<()>;
}

/// SQLite implementation of [`AccountRepository`].
pub struct SqliteAccountRepository {
    pool: SqlitePool,
}

impl SqliteAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Account {
        Account {
            id: AccountId(row.get("id")),
            username: row.get("username"),
            display_name: row.get("display_name"),
            avatar_media_id: row.get::<Option<i64>, _>("avatar_media_id").map(MediaId),
            performer_remote_id: row.get("performer_remote_id"),
            studio_remote_id: row.get("studio_remote_id"),
        }
    }
}

const ACCOUNT_COLUMNS: &str =
    "id, username, display_name, avatar_media_id, performer_remote_id, studio_remote_id";

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE id = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::row_to_account))
    }

    async fn set_performer_link(&self, id: AccountId, remote_id: &str) -> Result<()> {
        debug!(account_id = %id, remote_id, "Linking performer to account");
        sqlx::query("UPDATE accounts SET performer_remote_id = ? WHERE id = ?")
            .bind(remote_id)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_studio_link(&self, id: AccountId, remote_id: &str) -> Result<()> {
        debug!(account_id = %id, remote_id, "Linking studio to account");
        sqlx::query("UPDATE accounts SET studio_remote_id = ? WHERE id = ?")
            .bind(remote_id)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn insert_account(pool: &SqlitePool, id: i64, username: &str) {
        sqlx::query("INSERT INTO accounts (id, username) VALUES (?, ?)")
            .bind(id)
            .bind(username)
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let pool = create_test_pool().await.unwrap();
        insert_account(&pool, 1, "alice").await;

        let repo = SqliteAccountRepository::new(pool);
        let account = repo.find_by_id(AccountId(1)).await.unwrap().unwrap();
        assert_eq!(account.username, "alice");
        assert!(account.performer_remote_id.is_none());

        assert!(repo.find_by_id(AccountId(99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_link_writeback() {
        let pool = create_test_pool().await.unwrap();
        insert_account(&pool, 3, "carol").await;

        let repo = SqliteAccountRepository::new(pool);
        repo.set_performer_link(AccountId(3), "perf-9").await.unwrap();
        repo.set_studio_link(AccountId(3), "studio-4").await.unwrap();

        let account = repo.find_by_id(AccountId(3)).await.unwrap().unwrap();
        assert_eq!(account.performer_remote_id.as_deref(), Some("perf-9"));
        assert_eq!(account.studio_remote_id.as_deref(), Some("studio-4"));
    }
}
