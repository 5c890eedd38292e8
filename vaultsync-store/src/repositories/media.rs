//! Media repository
//!
//! Media rows are read with their variants attached; the `remote_link`
//! column is written back once the engine has matched a row to a catalog
//! image or scene, so later runs fetch by id instead of by path.

use crate::error::Result;
use crate::models::{BundleId, Media, MediaId, MediaVariant};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Repository for media rows.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// One media row with variants, highest quality first.
    async fn find_by_id(&self, id: MediaId) -> Result<Option<Media>>;

    /// All media of a bundle in stored position order.
    async fn find_bundle_media(&self, bundle_id: BundleId) -> Result<Vec<Media>>;

    /// Record the catalog image/scene id this media resolved to.
    async fn set_remote_link(&self, id: MediaId, remote_id: &str) -> Result<()>;
}

/// SQLite implementation of [`MediaRepository`].
pub struct SqliteMediaRepository {
    pool: SqlitePool,
}

impl SqliteMediaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_variants(&self, media_id: MediaId) -> Result<Vec<MediaVariant>> {
        let rows = sqlx::query(
            r#"
            SELECT m.id, m.mime_type
            FROM media_variants v
            JOIN media m ON m.id = v.variant_id
            WHERE v.media_id = ?
            ORDER BY v.pos ASC
            "#,
        )
        .bind(media_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| MediaVariant {
                id: MediaId(row.get("id")),
                mime_type: row.get("mime_type"),
            })
            .collect())
    }

    async fn hydrate(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Media> {
        let id = MediaId(row.get("id"));
        Ok(Media {
            id,
            mime_type: row.get("mime_type"),
            local_path: row.get("local_path"),
            remote_link: row.get("remote_link"),
            is_preview: row.get::<i64, _>("is_preview") != 0,
            variants: self.load_variants(id).await?,
        })
    }
}

#[async_trait]
impl MediaRepository for SqliteMediaRepository {
    async fn find_by_id(&self, id: MediaId) -> Result<Option<Media>> {
        let row = sqlx::query(
            "SELECT id, mime_type, local_path, remote_link, is_preview FROM media WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    async fn find_bundle_media(&self, bundle_id: BundleId) -> Result<Vec<Media>> {
        let rows = sqlx::query(
            r#"
            SELECT m.id, m.mime_type, m.local_path, m.remote_link, m.is_preview
            FROM bundle_media b
            JOIN media m ON m.id = b.media_id
            WHERE b.bundle_id = ?
            ORDER BY b.pos ASC
            "#,
        )
        .bind(bundle_id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut media = Vec::with_capacity(rows.len());
        for row in &rows {
            media.push(self.hydrate(row).await?);
        }

        Ok(media)
    }

    async fn set_remote_link(&self, id: MediaId, remote_id: &str) -> Result<()> {
        debug!(media_id = %id, remote_id, "Linking media to catalog object");
        sqlx::query("UPDATE media SET remote_link = ? WHERE id = ?")
            .bind(remote_id)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
