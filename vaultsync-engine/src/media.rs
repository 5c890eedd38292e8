//! Vault-media-to-catalog-visual resolution
//!
//! A vault media row corresponds to zero or more catalog visuals: images
//! for `image/*` mime types, scenes for everything else. Media the catalog
//! has not ingested yet resolves to nothing and is skipped, never failed;
//! the next run picks it up once a scan has indexed the file.

use std::sync::Arc;
use tracing::{debug, instrument};
use vaultsync_catalog::{CatalogClient, Image, PathFilter, Scene};
use vaultsync_store::{Media, MediaRepository, MimeFamily};

use crate::error::Result;

/// A catalog object backing one vault media row.
#[derive(Debug, Clone)]
pub enum ResolvedVisual {
    Image(Image),
    Scene(Scene),
}

impl ResolvedVisual {
    pub fn id(&self) -> &str {
        match self {
            ResolvedVisual::Image(image) => &image.id,
            ResolvedVisual::Scene(scene) => &scene.id,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, ResolvedVisual::Image(_))
    }
}

/// Maps vault media rows to catalog images and scenes.
pub struct MediaResolver {
    catalog: Arc<dyn CatalogClient>,
    media: Arc<dyn MediaRepository>,
}

impl MediaResolver {
    pub fn new(catalog: Arc<dyn CatalogClient>, media: Arc<dyn MediaRepository>) -> Self {
        Self { catalog, media }
    }

    /// Resolve the catalog visuals for a media row. A remote link resolves
    /// by id; otherwise the media and variant ids are matched against file
    /// paths, and the winning id is written back for the next run.
    #[instrument(skip(self, media), fields(media_id = %media.id))]
    pub async fn resolve(&self, media: &Media) -> Result<Vec<ResolvedVisual>> {
        if let Some(remote_link) = &media.remote_link {
            if let Some(visual) = self.fetch_linked(media, remote_link).await? {
                return Ok(vec![visual]);
            }
            debug!(remote_link, "Linked visual no longer resolves, falling back to path match");
        }

        let Some(filter) = PathFilter::any_of(media.path_tokens()) else {
            return Ok(vec![]);
        };

        let visuals = match media.mime_family() {
            MimeFamily::Image => self
                .catalog
                .find_images(&filter)
                .await?
                .into_iter()
                .map(ResolvedVisual::Image)
                .collect::<Vec<_>>(),
            MimeFamily::Scene => self
                .catalog
                .find_scenes(&filter)
                .await?
                .into_iter()
                .map(ResolvedVisual::Scene)
                .collect::<Vec<_>>(),
        };

        if visuals.is_empty() {
            debug!("Media not indexed by the catalog yet, skipping");
            return Ok(vec![]);
        }

        if let Some(first) = visuals.first() {
            if media.remote_link.as_deref() != Some(first.id()) {
                self.media.set_remote_link(media.id, first.id()).await?;
            }
        }

        Ok(visuals)
    }

    async fn fetch_linked(
        &self,
        media: &Media,
        remote_link: &str,
    ) -> Result<Option<ResolvedVisual>> {
        let visual = match media.mime_family() {
            MimeFamily::Image => self
                .catalog
                .find_image(remote_link)
                .await?
                .map(ResolvedVisual::Image),
            MimeFamily::Scene => self
                .catalog
                .find_scene(remote_link)
                .await?
                .map(ResolvedVisual::Scene),
        };
        Ok(visual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCatalog;
    use vaultsync_store::{create_test_pool, MediaId, SqliteMediaRepository};

    async fn setup(catalog: Arc<FakeCatalog>) -> (MediaResolver, Arc<dyn MediaRepository>) {
        let pool = create_test_pool().await.unwrap();
        sqlx::query(
            "INSERT INTO media (id, mime_type, local_path, is_preview) \
             VALUES (100, 'image/jpeg', '/vault/alice/100.jpg', 0)",
        )
        .execute(&pool)
        .await
        .unwrap();
        let media: Arc<dyn MediaRepository> = Arc::new(SqliteMediaRepository::new(pool));
        let resolver = MediaResolver::new(catalog, Arc::clone(&media));
        (resolver, media)
    }

    fn image_media() -> Media {
        Media {
            id: MediaId(100),
            mime_type: "image/jpeg".to_string(),
            local_path: Some("/vault/alice/100.jpg".to_string()),
            remote_link: None,
            is_preview: false,
            variants: vec![],
        }
    }

    #[tokio::test]
    async fn test_path_match_writes_back_link() {
        let catalog = Arc::new(FakeCatalog::new());
        let seeded = catalog.seed_image("/library/alice/100.jpg");
        let (resolver, media_repo) = setup(Arc::clone(&catalog)).await;

        let visuals = resolver.resolve(&image_media()).await.unwrap();
        assert_eq!(visuals.len(), 1);
        assert_eq!(visuals[0].id(), seeded.id);
        assert!(visuals[0].is_image());

        let stored = media_repo.find_by_id(MediaId(100)).await.unwrap().unwrap();
        assert_eq!(stored.remote_link, Some(seeded.id));
    }

    #[tokio::test]
    async fn test_linked_media_skips_path_query() {
        let catalog = Arc::new(FakeCatalog::new());
        let seeded = catalog.seed_image("/library/alice/100.jpg");
        let (resolver, _) = setup(Arc::clone(&catalog)).await;

        let mut media = image_media();
        media.remote_link = Some(seeded.id.clone());

        let visuals = resolver.resolve(&media).await.unwrap();
        assert_eq!(visuals.len(), 1);
        assert_eq!(catalog.calls(), vec!["findImage"]);
    }

    #[tokio::test]
    async fn test_unindexed_media_resolves_to_nothing() {
        let catalog = Arc::new(FakeCatalog::new());
        let (resolver, _) = setup(catalog).await;

        let visuals = resolver.resolve(&image_media()).await.unwrap();
        assert!(visuals.is_empty());
    }

    #[tokio::test]
    async fn test_video_media_queries_scenes() {
        let catalog = Arc::new(FakeCatalog::new());
        let seeded = catalog.seed_scene("/library/alice/100.mp4");
        let (resolver, _) = setup(Arc::clone(&catalog)).await;

        let mut media = image_media();
        media.mime_type = "video/mp4".to_string();

        let visuals = resolver.resolve(&media).await.unwrap();
        assert_eq!(visuals.len(), 1);
        assert_eq!(visuals[0].id(), seeded.id);
        assert!(!visuals[0].is_image());
    }
}
