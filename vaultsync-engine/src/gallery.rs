//! Gallery assembly for multi-attachment content items
//!
//! A content item with attachments becomes one catalog gallery. Attachments
//! flatten into an ordered media list: bundles expand in stored order, and
//! aggregated posts pull in their own attachments and leave a chapter at
//! the position where their images start. Every media entry is resolved to
//! catalog visuals, annotated under the merge policy, and resolved images
//! are attached to the gallery.

use std::sync::Arc;
use tracing::{debug, instrument, warn};
use vaultsync_catalog::{
    CatalogClient, ChapterCreateInput, FindFilter, Gallery, GalleryCreateInput, GalleryFilter,
    GalleryUpdateInput, ImageUpdateInput, SceneUpdateInput,
};
use vaultsync_store::{
    Account, AttachmentTarget, ContentItem, ContentRepository, Media, MediaRepository,
};

use crate::error::Result;
use crate::media::{MediaResolver, ResolvedVisual};
use crate::merge::{derive_title, MergePolicy};

/// Aggregated posts may themselves aggregate; expansion stops here.
const MAX_AGGREGATE_DEPTH: usize = 4;

/// What one assembly pass did, for progress accounting.
#[derive(Debug, Clone, Default)]
pub struct AssemblyReport {
    pub gallery_id: Option<String>,
    pub media_seen: usize,
    pub media_failed: usize,
    pub images_attached: usize,
}

/// One flattened media slot, plus the chapters discovered along the way.
struct FlattenedItem {
    media: Vec<Media>,
    /// `(title, index into media of the first entry)` per aggregated post.
    chapters: Vec<(String, usize)>,
}

/// Builds and annotates one gallery per multi-attachment item.
pub struct GalleryAssembler {
    catalog: Arc<dyn CatalogClient>,
    content: Arc<dyn ContentRepository>,
    media_repo: Arc<dyn MediaRepository>,
    media_resolver: Arc<MediaResolver>,
    merge: Arc<MergePolicy>,
}

impl GalleryAssembler {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        content: Arc<dyn ContentRepository>,
        media_repo: Arc<dyn MediaRepository>,
        media_resolver: Arc<MediaResolver>,
        merge: Arc<MergePolicy>,
    ) -> Self {
        Self {
            catalog,
            content,
            media_repo,
            media_resolver,
            merge,
        }
    }

    /// Assemble the gallery for an item. Items without attachments produce
    /// no gallery. A failure on one media entry is logged and skipped so
    /// the rest of the item still lands.
    #[instrument(skip(self, item, account), fields(item_id = item.id, kind = %item.kind.as_str()))]
    pub async fn assemble(
        &self,
        item: &ContentItem,
        account: &Account,
        url: Option<&str>,
    ) -> Result<AssemblyReport> {
        let mut report = AssemblyReport::default();
        if item.attachments.is_empty() {
            return Ok(report);
        }

        let flattened = self.flatten(item, account).await?;
        report.media_seen = flattened.media.len();
        if flattened.media.is_empty() {
            debug!("No media behind attachments, skipping gallery");
            return Ok(report);
        }

        let (mut gallery, created) = self.find_or_create(item, account, &flattened, url).await?;
        report.gallery_id = Some(gallery.id.clone());

        // Galleries are created bare; this first pass annotates them.
        if self
            .merge
            .apply(
                &mut gallery,
                item,
                account,
                flattened.media[0].id,
                false,
                None,
                url,
            )
            .await?
        {
            self.catalog
                .gallery_update(&GalleryUpdateInput::from(&gallery))
                .await?;
        }

        let mut image_ids = Vec::new();
        let mut image_positions = vec![0usize; flattened.media.len()];
        let total = flattened.media.len();
        for (idx, media) in flattened.media.iter().enumerate() {
            image_positions[idx] = image_ids.len();
            match self
                .annotate_media(item, account, media, (idx + 1, total), url)
                .await
            {
                Ok(ids) => image_ids.extend(ids),
                Err(e) => {
                    warn!(media_id = %media.id, error = %e, "Media annotation failed, continuing");
                    report.media_failed += 1;
                }
            }
        }

        if created {
            for (title, media_index) in &flattened.chapters {
                // Chapter indices are 1-based over the gallery's images.
                let image_index = image_positions[*media_index] as i64 + 1;
                self.catalog
                    .gallery_chapter_create(&ChapterCreateInput {
                        gallery_id: gallery.id.clone(),
                        title: title.clone(),
                        image_index,
                    })
                    .await?;
            }
        }

        if !image_ids.is_empty() {
            self.catalog
                .gallery_images_add(&gallery.id, &image_ids)
                .await?;
            report.images_attached = image_ids.len();
        }

        Ok(report)
    }

    /// Expand attachments into an ordered media list, recursing through
    /// bundles and aggregated posts.
    async fn flatten(&self, item: &ContentItem, account: &Account) -> Result<FlattenedItem> {
        let mut flattened = FlattenedItem {
            media: Vec::new(),
            chapters: Vec::new(),
        };
        self.flatten_into(item, account, 0, &mut flattened).await?;
        Ok(flattened)
    }

    async fn flatten_into(
        &self,
        item: &ContentItem,
        account: &Account,
        depth: usize,
        out: &mut FlattenedItem,
    ) -> Result<()> {
        for attachment in &item.attachments {
            match attachment.target {
                AttachmentTarget::Media(media_id) => {
                    if let Some(media) = self.media_repo.find_by_id(media_id).await? {
                        out.media.push(media);
                    }
                }
                AttachmentTarget::Bundle(bundle_id) => {
                    out.media
                        .extend(self.media_repo.find_bundle_media(bundle_id).await?);
                }
                AttachmentTarget::AggregatedPost(post_id) => {
                    if depth + 1 >= MAX_AGGREGATE_DEPTH {
                        warn!(post_id, depth, "Aggregation depth limit hit, skipping");
                        continue;
                    }
                    let Some(aggregated) = self.content.find_post(post_id).await? else {
                        debug!(post_id, "Aggregated post not in vault, skipping");
                        continue;
                    };
                    let start = out.media.len();
                    Box::pin(self.flatten_into(&aggregated, account, depth + 1, out)).await?;
                    if out.media.len() > start {
                        out.chapters
                            .push((derive_title(&aggregated, account, None), start));
                    } else {
                        debug!(post_id, "Aggregated post contributed no media, no chapter");
                    }
                }
            }
        }
        Ok(())
    }

    /// Gallery lookup ladder: linked id, then title+date, then code, then
    /// URL, then create. Whatever wins is linked back to the vault row.
    async fn find_or_create(
        &self,
        item: &ContentItem,
        account: &Account,
        flattened: &FlattenedItem,
        url: Option<&str>,
    ) -> Result<(Gallery, bool)> {
        if let Some(remote_id) = &item.gallery_remote_id {
            if let Some(gallery) = self.catalog.find_gallery(remote_id).await? {
                return Ok((gallery, false));
            }
            debug!(remote_id, "Linked gallery id no longer resolves, falling back to search");
        }

        let title = derive_title(item, account, None);
        let code = flattened.media[0].id.to_string();

        let mut filters = vec![
            GalleryFilter::title_and_date(title.clone(), item.date_string()),
            GalleryFilter::code(code.clone()),
        ];
        if let Some(url) = url {
            filters.push(GalleryFilter::url(url));
        }
        for filter in &filters {
            let found = self
                .catalog
                .find_galleries(&FindFilter::unbounded(), filter)
                .await?;
            if let Some(gallery) = found.into_iter().next() {
                self.link(item, &gallery).await?;
                return Ok((gallery, false));
            }
        }

        // Created with only the title; the annotation pass fills the rest
        // in, and would otherwise see a recorded date and decline to merge.
        let input = GalleryCreateInput {
            title: Some(title),
            urls: url.map(|u| vec![u.to_string()]).unwrap_or_default(),
            ..Default::default()
        };
        let gallery = self.catalog.gallery_create(&input).await?;
        debug!(gallery_id = %gallery.id, "Created gallery");
        self.link(item, &gallery).await?;
        Ok((gallery, true))
    }

    async fn link(&self, item: &ContentItem, gallery: &Gallery) -> Result<()> {
        if item.gallery_remote_id.as_deref() != Some(gallery.id.as_str()) {
            self.content
                .set_gallery_link(item.kind, item.id, &gallery.id)
                .await?;
        }
        Ok(())
    }

    /// Annotate every catalog visual behind one media entry; returns the
    /// image ids to attach.
    async fn annotate_media(
        &self,
        item: &ContentItem,
        account: &Account,
        media: &Media,
        position: (usize, usize),
        url: Option<&str>,
    ) -> Result<Vec<String>> {
        let mut image_ids = Vec::new();
        for visual in self.media_resolver.resolve(media).await? {
            match visual {
                ResolvedVisual::Image(mut image) => {
                    if self
                        .merge
                        .apply(
                            &mut image,
                            item,
                            account,
                            media.id,
                            media.is_preview,
                            Some(position),
                            url,
                        )
                        .await?
                    {
                        self.catalog
                            .image_update(&ImageUpdateInput::from(&image))
                            .await?;
                    }
                    image_ids.push(image.id);
                }
                ResolvedVisual::Scene(mut scene) => {
                    if self
                        .merge
                        .apply(
                            &mut scene,
                            item,
                            account,
                            media.id,
                            media.is_preview,
                            Some(position),
                            url,
                        )
                        .await?
                    {
                        self.catalog
                            .scene_update(&SceneUpdateInput::from(&scene))
                            .await?;
                    }
                }
            }
        }
        Ok(image_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolvers::{PerformerResolver, StudioResolver, TagResolver};
    use crate::testing::FakeCatalog;
    use sqlx::SqlitePool;
    use vaultsync_store::{
        create_test_pool, AccountId, AccountRepository, ContentKind, SqliteAccountRepository,
        SqliteContentRepository, SqliteMediaRepository,
    };

    struct Fixture {
        assembler: GalleryAssembler,
        content: Arc<dyn ContentRepository>,
        pool: SqlitePool,
    }

    async fn setup(catalog: Arc<FakeCatalog>) -> Fixture {
        catalog.seed_studio("Fansly (network)", None);
        let pool = create_test_pool().await.unwrap();
        sqlx::query("INSERT INTO accounts (id, username) VALUES (1, 'alice')")
            .execute(&pool)
            .await
            .unwrap();

        let accounts: Arc<dyn AccountRepository> =
            Arc::new(SqliteAccountRepository::new(pool.clone()));
        let media_repo: Arc<dyn MediaRepository> =
            Arc::new(SqliteMediaRepository::new(pool.clone()));
        let content: Arc<dyn ContentRepository> =
            Arc::new(SqliteContentRepository::new(pool.clone()));
        let catalog: Arc<dyn CatalogClient> = catalog;

        let performers = Arc::new(PerformerResolver::new(
            Arc::clone(&catalog),
            Arc::clone(&accounts),
            Arc::clone(&media_repo),
        ));
        let studios = Arc::new(StudioResolver::new(Arc::clone(&catalog), accounts));
        let tags = Arc::new(TagResolver::new(Arc::clone(&catalog)));
        let merge = Arc::new(MergePolicy::new(performers, studios, tags));
        let media_resolver = Arc::new(MediaResolver::new(
            Arc::clone(&catalog),
            Arc::clone(&media_repo),
        ));

        let assembler = GalleryAssembler::new(
            catalog,
            Arc::clone(&content),
            media_repo,
            media_resolver,
            merge,
        );
        Fixture {
            assembler,
            content,
            pool,
        }
    }

    fn account() -> Account {
        Account {
            id: AccountId(1),
            username: "alice".to_string(),
            display_name: None,
            avatar_media_id: None,
            performer_remote_id: None,
            studio_remote_id: None,
        }
    }

    async fn insert_post(pool: &SqlitePool, id: i64, content: &str) {
        sqlx::query(
            "INSERT INTO posts (id, account_id, content, created_at) VALUES (?, 1, ?, 1714550400)",
        )
        .bind(id)
        .bind(content)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn insert_media(pool: &SqlitePool, id: i64, mime: &str) {
        sqlx::query("INSERT INTO media (id, mime_type, local_path, is_preview) VALUES (?, ?, ?, 0)")
            .bind(id)
            .bind(mime)
            .bind(format!("/vault/alice/{}", id))
            .execute(pool)
            .await
            .unwrap();
    }

    async fn attach_media(pool: &SqlitePool, post_id: i64, pos: i64, media_id: i64) {
        sqlx::query(
            "INSERT INTO attachments (item_kind, item_id, pos, media_id) VALUES ('post', ?, ?, ?)",
        )
        .bind(post_id)
        .bind(pos)
        .bind(media_id)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn attach_aggregated(pool: &SqlitePool, post_id: i64, pos: i64, aggregated_id: i64) {
        sqlx::query(
            "INSERT INTO attachments (item_kind, item_id, pos, aggregated_post_id) \
             VALUES ('post', ?, ?, ?)",
        )
        .bind(post_id)
        .bind(pos)
        .bind(aggregated_id)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_no_attachments_yields_no_gallery() {
        let catalog = Arc::new(FakeCatalog::new());
        let fixture = setup(Arc::clone(&catalog)).await;
        insert_post(&fixture.pool, 1, "just text").await;

        let item = fixture.content.find_post(1).await.unwrap().unwrap();
        let report = fixture
            .assembler
            .assemble(&item, &account(), None)
            .await
            .unwrap();

        assert!(report.gallery_id.is_none());
        assert!(catalog.galleries().is_empty());
    }

    #[tokio::test]
    async fn test_creates_gallery_and_attaches_images() {
        let catalog = Arc::new(FakeCatalog::new());
        let image_a = catalog.seed_image("/library/alice/100.jpg");
        let image_b = catalog.seed_image("/library/alice/101.jpg");
        let fixture = setup(Arc::clone(&catalog)).await;

        insert_post(&fixture.pool, 1, "Beach set").await;
        insert_media(&fixture.pool, 100, "image/jpeg").await;
        insert_media(&fixture.pool, 101, "image/jpeg").await;
        attach_media(&fixture.pool, 1, 0, 100).await;
        attach_media(&fixture.pool, 1, 1, 101).await;

        let item = fixture.content.find_post(1).await.unwrap().unwrap();
        let report = fixture
            .assembler
            .assemble(&item, &account(), Some("https://fansly.com/post/1"))
            .await
            .unwrap();

        let gallery_id = report.gallery_id.unwrap();
        assert_eq!(report.media_seen, 2);
        assert_eq!(report.images_attached, 2);
        assert_eq!(
            catalog.gallery_image_ids(&gallery_id),
            vec![image_a.id.clone(), image_b.id.clone()]
        );

        let galleries = catalog.galleries();
        assert_eq!(galleries.len(), 1);
        assert_eq!(galleries[0].title.as_deref(), Some("Beach set"));
        assert_eq!(galleries[0].code.as_deref(), Some("100"));

        // Annotated with position suffixes.
        assert_eq!(
            catalog.image(&image_a.id).unwrap().title.as_deref(),
            Some("Beach set 1/2")
        );
        assert_eq!(
            catalog.image(&image_b.id).unwrap().title.as_deref(),
            Some("Beach set 2/2")
        );

        // The gallery id is written back to the vault row.
        let stored = fixture.content.find_post(1).await.unwrap().unwrap();
        assert_eq!(stored.gallery_remote_id, Some(gallery_id));
    }

    #[tokio::test]
    async fn test_linked_gallery_skips_search() {
        let catalog = Arc::new(FakeCatalog::new());
        let fixture = setup(Arc::clone(&catalog)).await;

        insert_post(&fixture.pool, 1, "Beach set").await;
        insert_media(&fixture.pool, 100, "image/jpeg").await;
        attach_media(&fixture.pool, 1, 0, 100).await;

        let item = fixture.content.find_post(1).await.unwrap().unwrap();
        fixture
            .assembler
            .assemble(&item, &account(), None)
            .await
            .unwrap();

        let calls_before = catalog.calls();
        let item = fixture.content.find_post(1).await.unwrap().unwrap();
        assert!(item.gallery_remote_id.is_some());
        fixture
            .assembler
            .assemble(&item, &account(), None)
            .await
            .unwrap();

        let new_calls: Vec<_> = catalog.calls()[calls_before.len()..].to_vec();
        assert!(new_calls.contains(&"findGallery".to_string()));
        assert!(!new_calls.contains(&"findGalleries".to_string()));
    }

    #[tokio::test]
    async fn test_title_and_date_match_reuses_gallery() {
        let catalog = Arc::new(FakeCatalog::new());
        let fixture = setup(Arc::clone(&catalog)).await;

        insert_post(&fixture.pool, 1, "Beach set").await;
        insert_media(&fixture.pool, 100, "image/jpeg").await;
        attach_media(&fixture.pool, 1, 0, 100).await;

        let item = fixture.content.find_post(1).await.unwrap().unwrap();
        fixture
            .assembler
            .assemble(&item, &account(), None)
            .await
            .unwrap();

        // Drop the link so the search ladder runs; the first rung matches.
        sqlx::query("UPDATE posts SET gallery_remote_id = NULL WHERE id = 1")
            .execute(&fixture.pool)
            .await
            .unwrap();
        let item = fixture.content.find_post(1).await.unwrap().unwrap();
        fixture
            .assembler
            .assemble(&item, &account(), None)
            .await
            .unwrap();

        assert_eq!(catalog.galleries().len(), 1);
        let find_galleries = catalog
            .calls()
            .iter()
            .filter(|c| c.as_str() == "findGalleries")
            .count();
        assert_eq!(find_galleries, 1);
    }

    #[tokio::test]
    async fn test_organized_image_is_attached_but_not_annotated() {
        let catalog = Arc::new(FakeCatalog::new());
        let image = catalog.seed_image("/library/alice/100.jpg");
        catalog.set_organized_image(&image.id);
        let fixture = setup(Arc::clone(&catalog)).await;

        insert_post(&fixture.pool, 1, "Curated").await;
        insert_media(&fixture.pool, 100, "image/jpeg").await;
        attach_media(&fixture.pool, 1, 0, 100).await;

        let item = fixture.content.find_post(1).await.unwrap().unwrap();
        let report = fixture
            .assembler
            .assemble(&item, &account(), None)
            .await
            .unwrap();

        assert_eq!(report.images_attached, 1);
        assert!(!catalog.calls().contains(&"imageUpdate".to_string()));
        assert!(catalog.image(&image.id).unwrap().title.is_none());
    }

    #[tokio::test]
    async fn test_video_attachment_annotates_scene() {
        let catalog = Arc::new(FakeCatalog::new());
        let scene = catalog.seed_scene("/library/alice/100.mp4");
        let fixture = setup(Arc::clone(&catalog)).await;

        insert_post(&fixture.pool, 1, "Clip drop").await;
        insert_media(&fixture.pool, 100, "video/mp4").await;
        attach_media(&fixture.pool, 1, 0, 100).await;

        let item = fixture.content.find_post(1).await.unwrap().unwrap();
        let report = fixture
            .assembler
            .assemble(&item, &account(), None)
            .await
            .unwrap();

        // Scenes are annotated but never attached as gallery images.
        assert_eq!(report.media_seen, 1);
        assert_eq!(report.images_attached, 0);
        assert_eq!(
            catalog.scene(&scene.id).unwrap().title.as_deref(),
            Some("Clip drop")
        );
    }

    #[tokio::test]
    async fn test_aggregated_post_becomes_chapter() {
        let catalog = Arc::new(FakeCatalog::new());
        catalog.seed_image("/library/alice/100.jpg");
        catalog.seed_image("/library/alice/200.jpg");
        let fixture = setup(Arc::clone(&catalog)).await;

        insert_post(&fixture.pool, 1, "Roundup").await;
        insert_post(&fixture.pool, 2, "Beach day").await;
        insert_media(&fixture.pool, 100, "image/jpeg").await;
        insert_media(&fixture.pool, 200, "image/jpeg").await;
        attach_media(&fixture.pool, 1, 0, 100).await;
        attach_aggregated(&fixture.pool, 1, 1, 2).await;
        attach_media(&fixture.pool, 2, 0, 200).await;

        let item = fixture.content.find_post(1).await.unwrap().unwrap();
        let report = fixture
            .assembler
            .assemble(&item, &account(), None)
            .await
            .unwrap();

        assert_eq!(report.media_seen, 2);
        let chapters = catalog.chapters();
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title.as_deref(), Some("Beach day"));
        // The aggregated post's first image is the gallery's second.
        assert_eq!(chapters[0].image_index, 2);
    }

    #[tokio::test]
    async fn test_trailing_empty_aggregated_post_leaves_no_chapter() {
        let catalog = Arc::new(FakeCatalog::new());
        catalog.seed_image("/library/alice/100.jpg");
        let fixture = setup(Arc::clone(&catalog)).await;

        insert_post(&fixture.pool, 1, "Roundup").await;
        insert_post(&fixture.pool, 2, "Words only").await;
        insert_media(&fixture.pool, 100, "image/jpeg").await;
        attach_media(&fixture.pool, 1, 0, 100).await;
        attach_aggregated(&fixture.pool, 1, 1, 2).await;

        let item = fixture.content.find_post(1).await.unwrap().unwrap();
        let report = fixture
            .assembler
            .assemble(&item, &account(), None)
            .await
            .unwrap();

        assert_eq!(report.media_seen, 1);
        assert_eq!(report.images_attached, 1);
        assert!(catalog.chapters().is_empty());
    }

    #[tokio::test]
    async fn test_media_failure_does_not_sink_the_item() {
        let catalog = Arc::new(FakeCatalog::new());
        catalog.seed_image("/library/alice/101.jpg");
        let fixture = setup(Arc::clone(&catalog)).await;

        insert_post(&fixture.pool, 1, "Mixed luck").await;
        // Media 100 is unknown to the catalog: resolves to nothing, skipped.
        insert_media(&fixture.pool, 100, "image/jpeg").await;
        insert_media(&fixture.pool, 101, "image/jpeg").await;
        attach_media(&fixture.pool, 1, 0, 100).await;
        attach_media(&fixture.pool, 1, 1, 101).await;

        let item = fixture.content.find_post(1).await.unwrap().unwrap();
        let report = fixture
            .assembler
            .assemble(&item, &account(), None)
            .await
            .unwrap();

        assert_eq!(report.media_seen, 2);
        assert_eq!(report.images_attached, 1);
    }
}
