//! Memoizing read cache over a catalog client
//!
//! # Overview
//!
//! [`CachedCatalog`] wraps any [`CatalogClient`] and memoizes its lookup
//! operations in per-keyspace LRU caches. Keys are built from the logical
//! arguments only, so entries are shared across calls that differ only in
//! the client handle.
//!
//! Every mutation delegates to the inner client and then invalidates both
//! the find-one and find-many keyspaces of the mutated entity type before
//! returning. Resolver calls issued after a write in the same run must
//! observe that write, so the invalidation is part of each mutation's
//! contract, not an optimization.

use async_trait::async_trait;
use lru::LruCache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::trace;

use crate::client::CatalogClient;
use crate::error::{CatalogError, Result};
use crate::filters::{FindFilter, GalleryFilter, PathFilter};
use crate::types::{
    Chapter, ChapterCreateInput, Gallery, GalleryCreateInput, GalleryUpdateInput, Image,
    ImageUpdateInput, Job, Performer, PerformerCreateInput, PerformerUpdateInput, Scene,
    SceneUpdateInput, Studio, StudioCreateInput, StudioUpdateInput, Tag,
};

/// Default entries per keyspace.
pub const DEFAULT_CACHE_CAPACITY: usize = 512;

/// One cache per lookup shape. Mutations clear the keyspaces of the entity
/// type they touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Keyspace {
    PerformerOne,
    PerformerMany,
    StudioOne,
    StudioMany,
    GalleryOne,
    GalleryMany,
    ImageOne,
    ImageMany,
    SceneOne,
    SceneMany,
    TagMany,
}

/// Caching decorator for a [`CatalogClient`].
pub struct CachedCatalog<C> {
    inner: C,
    capacity: NonZeroUsize,
    caches: Mutex<HashMap<Keyspace, LruCache<String, Value>>>,
}

impl<C: CatalogClient> CachedCatalog<C> {
    pub fn new(inner: C) -> Self {
        Self::with_capacity(inner, DEFAULT_CACHE_CAPACITY)
    }

    /// Capacity is per keyspace; zero falls back to the default.
    pub fn with_capacity(inner: C, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or_else(|| NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap());
        Self {
            inner,
            capacity,
            caches: Mutex::new(HashMap::new()),
        }
    }

    fn cache_get<T: DeserializeOwned>(&self, keyspace: Keyspace, key: &str) -> Option<T> {
        let mut caches = self.caches.lock().ok()?;
        let cached = caches.get_mut(&keyspace)?.get(key)?;
        serde_json::from_value(cached.clone()).ok()
    }

    fn cache_put<T: Serialize>(&self, keyspace: Keyspace, key: String, value: &T) {
        let Ok(serialized) = serde_json::to_value(value) else {
            return;
        };
        if let Ok(mut caches) = self.caches.lock() {
            caches
                .entry(keyspace)
                .or_insert_with(|| LruCache::new(self.capacity))
                .put(key, serialized);
        }
    }

    fn invalidate(&self, keyspaces: &[Keyspace]) {
        if let Ok(mut caches) = self.caches.lock() {
            for keyspace in keyspaces {
                if let Some(cache) = caches.get_mut(keyspace) {
                    trace!(?keyspace, "Invalidating cache keyspace");
                    cache.clear();
                }
            }
        }
    }

    /// A duplicate-name race means a concurrent writer created the entity
    /// after our lookup was cached; the caller's one re-query must see the
    /// remote state, so the error invalidates like a successful write.
    fn settle_create<T>(&self, keyspaces: &[Keyspace], result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) | Err(CatalogError::AlreadyExists { .. }) => self.invalidate(keyspaces),
            Err(_) => {}
        }
        result
    }

    async fn lookup<T, F>(&self, keyspace: Keyspace, key: String, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: std::future::Future<Output = Result<T>>,
    {
        if let Some(hit) = self.cache_get(keyspace, &key) {
            trace!(?keyspace, key, "Cache hit");
            return Ok(hit);
        }
        let value = fetch.await?;
        self.cache_put(keyspace, key, &value);
        Ok(value)
    }
}

#[async_trait]
impl<C: CatalogClient> CatalogClient for CachedCatalog<C> {
    async fn find_performer(&self, id: &str) -> Result<Option<Performer>> {
        self.lookup(
            Keyspace::PerformerOne,
            id.to_string(),
            self.inner.find_performer(id),
        )
        .await
    }

    async fn find_performers_by_name(&self, name: &str) -> Result<Vec<Performer>> {
        self.lookup(
            Keyspace::PerformerMany,
            name.to_string(),
            self.inner.find_performers_by_name(name),
        )
        .await
    }

    async fn performer_create(&self, input: &PerformerCreateInput) -> Result<Performer> {
        let result = self.inner.performer_create(input).await;
        self.settle_create(&[Keyspace::PerformerOne, Keyspace::PerformerMany], result)
    }

    async fn performer_update(&self, input: &PerformerUpdateInput) -> Result<Performer> {
        let performer = self.inner.performer_update(input).await?;
        self.invalidate(&[Keyspace::PerformerOne, Keyspace::PerformerMany]);
        Ok(performer)
    }

    async fn find_studio(&self, id: &str) -> Result<Option<Studio>> {
        self.lookup(
            Keyspace::StudioOne,
            id.to_string(),
            self.inner.find_studio(id),
        )
        .await
    }

    async fn find_studios(&self, q: &str) -> Result<Vec<Studio>> {
        self.lookup(
            Keyspace::StudioMany,
            q.to_string(),
            self.inner.find_studios(q),
        )
        .await
    }

    async fn studio_create(&self, input: &StudioCreateInput) -> Result<Studio> {
        let result = self.inner.studio_create(input).await;
        self.settle_create(&[Keyspace::StudioOne, Keyspace::StudioMany], result)
    }

    async fn studio_update(&self, input: &StudioUpdateInput) -> Result<Studio> {
        let studio = self.inner.studio_update(input).await?;
        self.invalidate(&[Keyspace::StudioOne, Keyspace::StudioMany]);
        Ok(studio)
    }

    async fn find_gallery(&self, id: &str) -> Result<Option<Gallery>> {
        self.lookup(
            Keyspace::GalleryOne,
            id.to_string(),
            self.inner.find_gallery(id),
        )
        .await
    }

    async fn find_galleries(
        &self,
        filter: &FindFilter,
        gallery_filter: &GalleryFilter,
    ) -> Result<Vec<Gallery>> {
        let key = json!([filter, gallery_filter]).to_string();
        self.lookup(
            Keyspace::GalleryMany,
            key,
            self.inner.find_galleries(filter, gallery_filter),
        )
        .await
    }

    async fn gallery_create(&self, input: &GalleryCreateInput) -> Result<Gallery> {
        let result = self.inner.gallery_create(input).await;
        self.settle_create(&[Keyspace::GalleryOne, Keyspace::GalleryMany], result)
    }

    async fn gallery_update(&self, input: &GalleryUpdateInput) -> Result<Gallery> {
        let gallery = self.inner.gallery_update(input).await?;
        self.invalidate(&[Keyspace::GalleryOne, Keyspace::GalleryMany]);
        Ok(gallery)
    }

    async fn gallery_images_add(&self, gallery_id: &str, image_ids: &[String]) -> Result<()> {
        self.inner.gallery_images_add(gallery_id, image_ids).await?;
        self.invalidate(&[Keyspace::GalleryOne, Keyspace::GalleryMany]);
        Ok(())
    }

    async fn gallery_chapter_create(&self, input: &ChapterCreateInput) -> Result<Chapter> {
        let chapter = self.inner.gallery_chapter_create(input).await?;
        self.invalidate(&[Keyspace::GalleryOne, Keyspace::GalleryMany]);
        Ok(chapter)
    }

    async fn find_image(&self, id: &str) -> Result<Option<Image>> {
        self.lookup(Keyspace::ImageOne, id.to_string(), self.inner.find_image(id))
            .await
    }

    async fn find_images(&self, path_filter: &PathFilter) -> Result<Vec<Image>> {
        let key = json!(path_filter).to_string();
        self.lookup(Keyspace::ImageMany, key, self.inner.find_images(path_filter))
            .await
    }

    async fn image_update(&self, input: &ImageUpdateInput) -> Result<Image> {
        let image = self.inner.image_update(input).await?;
        self.invalidate(&[Keyspace::ImageOne, Keyspace::ImageMany]);
        Ok(image)
    }

    async fn find_scene(&self, id: &str) -> Result<Option<Scene>> {
        self.lookup(Keyspace::SceneOne, id.to_string(), self.inner.find_scene(id))
            .await
    }

    async fn find_scenes(&self, path_filter: &PathFilter) -> Result<Vec<Scene>> {
        let key = json!(path_filter).to_string();
        self.lookup(Keyspace::SceneMany, key, self.inner.find_scenes(path_filter))
            .await
    }

    async fn scene_update(&self, input: &SceneUpdateInput) -> Result<Scene> {
        let scene = self.inner.scene_update(input).await?;
        self.invalidate(&[Keyspace::SceneOne, Keyspace::SceneMany]);
        Ok(scene)
    }

    async fn find_tags(&self, q: &str) -> Result<Vec<Tag>> {
        self.lookup(Keyspace::TagMany, q.to_string(), self.inner.find_tags(q))
            .await
    }

    async fn tag_create(&self, name: &str) -> Result<Tag> {
        let result = self.inner.tag_create(name).await;
        self.settle_create(&[Keyspace::TagMany], result)
    }

    // Job status changes server-side between calls; never cached.
    async fn find_job(&self, job_id: &str) -> Result<Option<Job>> {
        self.inner.find_job(job_id).await
    }

    async fn metadata_scan(&self, paths: &[String]) -> Result<String> {
        self.inner.metadata_scan(paths).await
    }
}
