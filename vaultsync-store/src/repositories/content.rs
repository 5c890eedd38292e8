//! Content repository
//!
//! Loads posts and messages as `ContentItem`s with attachments, mentions
//! and hashtags eager-loaded, so the batch scheduler never touches the
//! database again mid-dispatch.

use crate::error::{Result, StoreError};
use crate::models::{
    AccountId, Attachment, AttachmentTarget, BundleId, ContentItem, ContentKind, MediaId,
};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::{Row, SqlitePool};

/// Repository for posts and messages.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// All items of one kind for an account, oldest first, fully loaded.
    async fn find_for_account(
        &self,
        account_id: AccountId,
        kind: ContentKind,
    ) -> Result<Vec<ContentItem>>;

    /// One post by id, fully loaded. Used to resolve aggregated posts.
    async fn find_post(&self, post_id: i64) -> Result<Option<ContentItem>>;

    /// Record the catalog gallery id an item resolved to.
    async fn set_gallery_link(&self, kind: ContentKind, item_id: i64, remote_id: &str)
        -> Result<()>;
}

/// SQLite implementation of [`ContentRepository`].
pub struct SqliteContentRepository {
    pool: SqlitePool,
}

impl SqliteContentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn table(kind: ContentKind) -> &'static str {
        match kind {
            ContentKind::Post => "posts",
            ContentKind::Message => "messages",
        }
    }

    async fn load_attachments(&self, kind: ContentKind, item_id: i64) -> Result<Vec<Attachment>> {
        let rows = sqlx::query(
            r#"
            SELECT pos, media_id, bundle_id, aggregated_post_id
            FROM attachments
            WHERE item_kind = ? AND item_id = ?
            ORDER BY pos ASC
            "#,
        )
        .bind(kind.as_str())
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        let mut attachments = Vec::with_capacity(rows.len());
        for row in rows {
            let pos: i64 = row.get("pos");
            let media_id: Option<i64> = row.get("media_id");
            let bundle_id: Option<i64> = row.get("bundle_id");
            let aggregated_post_id: Option<i64> = row.get("aggregated_post_id");

            let target = match (media_id, bundle_id, aggregated_post_id) {
                (Some(id), None, None) => AttachmentTarget::Media(MediaId(id)),
                (None, Some(id), None) => AttachmentTarget::Bundle(BundleId(id)),
                (None, None, Some(id)) => AttachmentTarget::AggregatedPost(id),
                _ => {
                    return Err(StoreError::InvalidRow(format!(
                        "attachment ({}, {}, pos {}) does not reference exactly one target",
                        kind, item_id, pos
                    )))
                }
            };

            attachments.push(Attachment { pos, target });
        }

        Ok(attachments)
    }

    async fn load_mentions(&self, kind: ContentKind, item_id: i64) -> Result<Vec<AccountId>> {
        let rows = sqlx::query(
            "SELECT account_id FROM content_mentions WHERE item_kind = ? AND item_id = ?",
        )
        .bind(kind.as_str())
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| AccountId(row.get("account_id")))
            .collect())
    }

    async fn load_hashtags(&self, kind: ContentKind, item_id: i64) -> Result<Vec<String>> {
        let rows =
            sqlx::query("SELECT tag FROM content_hashtags WHERE item_kind = ? AND item_id = ?")
                .bind(kind.as_str())
                .bind(item_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.iter().map(|row| row.get("tag")).collect())
    }

    async fn hydrate(
        &self,
        kind: ContentKind,
        row: &sqlx::sqlite::SqliteRow,
    ) -> Result<ContentItem> {
        let id: i64 = row.get("id");
        let created_at_secs: i64 = row.get("created_at");
        let created_at = Utc
            .timestamp_opt(created_at_secs, 0)
            .single()
            .ok_or_else(|| {
                StoreError::InvalidRow(format!(
                    "{} {} has invalid timestamp {}",
                    kind, id, created_at_secs
                ))
            })?;

        Ok(ContentItem {
            id,
            kind,
            account_id: AccountId(row.get("account_id")),
            content: row.get("content"),
            created_at,
            gallery_remote_id: row.get("gallery_remote_id"),
            attachments: self.load_attachments(kind, id).await?,
            mentions: self.load_mentions(kind, id).await?,
            hashtags: self.load_hashtags(kind, id).await?,
        })
    }
}

#[async_trait]
impl ContentRepository for SqliteContentRepository {
    async fn find_for_account(
        &self,
        account_id: AccountId,
        kind: ContentKind,
    ) -> Result<Vec<ContentItem>> {
        let rows = sqlx::query(&format!(
            "SELECT id, account_id, content, created_at, gallery_remote_id FROM {} WHERE account_id = ? ORDER BY created_at ASC, id ASC",
            Self::table(kind)
        ))
        .bind(account_id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(self.hydrate(kind, row).await?);
        }

        Ok(items)
    }

    async fn find_post(&self, post_id: i64) -> Result<Option<ContentItem>> {
        let row = sqlx::query(
            "SELECT id, account_id, content, created_at, gallery_remote_id FROM posts WHERE id = ?",
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(ContentKind::Post, &row).await?)),
            None => Ok(None),
        }
    }

    async fn set_gallery_link(
        &self,
        kind: ContentKind,
        item_id: i64,
        remote_id: &str,
    ) -> Result<()> {
        sqlx::query(&format!(
            "UPDATE {} SET gallery_remote_id = ? WHERE id = ?",
            Self::table(kind)
        ))
        .bind(remote_id)
        .bind(item_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
