//! Catalog protocol client
//!
//! Implements the remote query/mutation protocol: named GraphQL operations
//! POSTed to a single endpoint. The [`CatalogClient`] trait is the seam the
//! engine programs against; [`HttpCatalogClient`] is the production
//! implementation with exponential backoff for rate limiting and transient
//! server errors.
//!
//! Lookups returning zero rows are not errors: find-one operations return
//! `Ok(None)` and find-many operations return an empty list.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::error::{CatalogError, Result};
use crate::filters::{FindFilter, GalleryFilter, PathFilter};
use crate::types::{
    Chapter, ChapterCreateInput, Gallery, GalleryCreateInput, GalleryUpdateInput, Image,
    ImageUpdateInput, Job, Performer, PerformerCreateInput, PerformerUpdateInput, Scene,
    SceneUpdateInput, Studio, StudioCreateInput, StudioUpdateInput, Tag,
};

/// Retry attempts for rate-limited or transiently failing requests.
const MAX_RETRIES: u32 = 3;

const PERFORMER_FIELDS: &str = "id name aliases urls";
const STUDIO_FIELDS: &str = "id name parent_studio { id }";
const GALLERY_FIELDS: &str =
    "id title details date code urls organized studio { id } performers { id } tags { id }";
const IMAGE_FIELDS: &str = "id title details date code urls organized studio { id } \
     performers { id } tags { id } visual_files { id path }";
const SCENE_FIELDS: &str = "id title details date code urls organized studio { id } \
     performers { id } tags { id } files { id path }";

// ============================================================================
// Trait
// ============================================================================

/// Operations the synchronization engine issues against the catalog service.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn find_performer(&self, id: &str) -> Result<Option<Performer>>;
    async fn find_performers_by_name(&self, name: &str) -> Result<Vec<Performer>>;
    async fn performer_create(&self, input: &PerformerCreateInput) -> Result<Performer>;
    async fn performer_update(&self, input: &PerformerUpdateInput) -> Result<Performer>;

    async fn find_studio(&self, id: &str) -> Result<Option<Studio>>;
    async fn find_studios(&self, q: &str) -> Result<Vec<Studio>>;
    async fn studio_create(&self, input: &StudioCreateInput) -> Result<Studio>;
    async fn studio_update(&self, input: &StudioUpdateInput) -> Result<Studio>;

    async fn find_gallery(&self, id: &str) -> Result<Option<Gallery>>;
    async fn find_galleries(
        &self,
        filter: &FindFilter,
        gallery_filter: &GalleryFilter,
    ) -> Result<Vec<Gallery>>;
    async fn gallery_create(&self, input: &GalleryCreateInput) -> Result<Gallery>;
    async fn gallery_update(&self, input: &GalleryUpdateInput) -> Result<Gallery>;
    async fn gallery_images_add(&self, gallery_id: &str, image_ids: &[String]) -> Result<()>;
    async fn gallery_chapter_create(&self, input: &ChapterCreateInput) -> Result<Chapter>;

    async fn find_image(&self, id: &str) -> Result<Option<Image>>;
    async fn find_images(&self, path_filter: &PathFilter) -> Result<Vec<Image>>;
    async fn image_update(&self, input: &ImageUpdateInput) -> Result<Image>;

    async fn find_scene(&self, id: &str) -> Result<Option<Scene>>;
    async fn find_scenes(&self, path_filter: &PathFilter) -> Result<Vec<Scene>>;
    async fn scene_update(&self, input: &SceneUpdateInput) -> Result<Scene>;

    async fn find_tags(&self, q: &str) -> Result<Vec<Tag>>;
    async fn tag_create(&self, name: &str) -> Result<Tag>;

    async fn find_job(&self, job_id: &str) -> Result<Option<Job>>;
    /// Kick off a library scan over the given paths; returns the job id.
    async fn metadata_scan(&self, paths: &[String]) -> Result<String>;
}

// Shared handles stay usable wherever a concrete client is expected, e.g.
// one HTTP client behind both the read cache and the job poller.
#[async_trait]
impl<T: CatalogClient + ?Sized> CatalogClient for std::sync::Arc<T> {
    async fn find_performer(&self, id: &str) -> Result<Option<Performer>> {
        (**self).find_performer(id).await
    }
    async fn find_performers_by_name(&self, name: &str) -> Result<Vec<Performer>> {
        (**self).find_performers_by_name(name).await
    }
    async fn performer_create(&self, input: &PerformerCreateInput) -> Result<Performer> {
        (**self).performer_create(input).await
    }
    async fn performer_update(&self, input: &PerformerUpdateInput) -> Result<Performer> {
        (**self).performer_update(input).await
    }
    async fn find_studio(&self, id: &str) -> Result<Option<Studio>> {
        (**self).find_studio(id).await
    }
    async fn find_studios(&self, q: &str) -> Result<Vec<Studio>> {
        (**self).find_studios(q).await
    }
    async fn studio_create(&self, input: &StudioCreateInput) -> Result<Studio> {
        (**self).studio_create(input).await
    }
    async fn studio_update(&self, input: &StudioUpdateInput) -> Result<Studio> {
        (**self).studio_update(input).await
    }
    async fn find_gallery(&self, id: &str) -> Result<Option<Gallery>> {
        (**self).find_gallery(id).await
    }
    async fn find_galleries(
        &self,
        filter: &FindFilter,
        gallery_filter: &GalleryFilter,
    ) -> Result<Vec<Gallery>> {
        (**self).find_galleries(filter, gallery_filter).await
    }
    async fn gallery_create(&self, input: &GalleryCreateInput) -> Result<Gallery> {
        (**self).gallery_create(input).await
    }
    async fn gallery_update(&self, input: &GalleryUpdateInput) -> Result<Gallery> {
        (**self).gallery_update(input).await
    }
    async fn gallery_images_add(&self, gallery_id: &str, image_ids: &[String]) -> Result<()> {
        (**self).gallery_images_add(gallery_id, image_ids).await
    }
    async fn gallery_chapter_create(&self, input: &ChapterCreateInput) -> Result<Chapter> {
        (**self).gallery_chapter_create(input).await
    }
    async fn find_image(&self, id: &str) -> Result<Option<Image>> {
        (**self).find_image(id).await
    }
    async fn find_images(&self, path_filter: &PathFilter) -> Result<Vec<Image>> {
        (**self).find_images(path_filter).await
    }
    async fn image_update(&self, input: &ImageUpdateInput) -> Result<Image> {
        (**self).image_update(input).await
    }
    async fn find_scene(&self, id: &str) -> Result<Option<Scene>> {
        (**self).find_scene(id).await
    }
    async fn find_scenes(&self, path_filter: &PathFilter) -> Result<Vec<Scene>> {
        (**self).find_scenes(path_filter).await
    }
    async fn scene_update(&self, input: &SceneUpdateInput) -> Result<Scene> {
        (**self).scene_update(input).await
    }
    async fn find_tags(&self, q: &str) -> Result<Vec<Tag>> {
        (**self).find_tags(q).await
    }
    async fn tag_create(&self, name: &str) -> Result<Tag> {
        (**self).tag_create(name).await
    }
    async fn find_job(&self, job_id: &str) -> Result<Option<Job>> {
        (**self).find_job(job_id).await
    }
    async fn metadata_scan(&self, paths: &[String]) -> Result<String> {
        (**self).metadata_scan(paths).await
    }
}

// ============================================================================
// Response handling
// ============================================================================

/// Parse a GraphQL response envelope, classifying errors structurally.
fn parse_envelope(body: Value) -> Result<Value> {
    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        if let Some(first) = errors.first() {
            let message = first
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            if let Some(name) = parse_already_exists(message) {
                return Err(CatalogError::AlreadyExists { name });
            }
            return Err(CatalogError::Operation(message.to_string()));
        }
    }
    body.get("data")
        .cloned()
        .ok_or_else(|| CatalogError::Parse("response missing data field".to_string()))
}

/// Detect the duplicate-name class of error and extract the offending name.
/// The service phrases it as `<kind> with name '<name>' already exists`.
fn parse_already_exists(message: &str) -> Option<String> {
    if !message.to_ascii_lowercase().contains("already exists") {
        return None;
    }
    let name = match (message.find('\''), message.rfind('\'')) {
        (Some(start), Some(end)) if end > start => message[start + 1..end].to_string(),
        _ => message.to_string(),
    };
    Some(name)
}

/// Pull one operation's payload out of the `data` object.
fn take<T: DeserializeOwned>(data: &Value, key: &str) -> Result<T> {
    let field = data
        .get(key)
        .ok_or_else(|| CatalogError::Parse(format!("response missing field {}", key)))?;
    serde_json::from_value(field.clone())
        .map_err(|e| CatalogError::Parse(format!("{}: {}", key, e)))
}

/// Like [`take`] but treats `null` as absent.
fn take_optional<T: DeserializeOwned>(data: &Value, key: &str) -> Result<Option<T>> {
    match data.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(field) => serde_json::from_value(field.clone())
            .map(Some)
            .map_err(|e| CatalogError::Parse(format!("{}: {}", key, e))),
    }
}

/// Pull a paged list (`{ count, <key>: [...] }`) out of a find-many payload.
fn take_page<T: DeserializeOwned>(data: &Value, envelope: &str, key: &str) -> Result<Vec<T>> {
    let page = data
        .get(envelope)
        .ok_or_else(|| CatalogError::Parse(format!("response missing field {}", envelope)))?;
    take(page, key)
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// Production [`CatalogClient`] over HTTP.
pub struct HttpCatalogClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpCatalogClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }

    /// Execute one named operation with retry logic.
    ///
    /// Rate limits (429) and server errors (5xx) back off exponentially;
    /// client errors and operation errors are returned immediately.
    #[instrument(skip(self, document, variables), fields(operation = operation))]
    async fn execute(&self, operation: &str, document: String, variables: Value) -> Result<Value> {
        let payload = json!({
            "operationName": operation,
            "query": document,
            "variables": variables,
        });

        let mut attempt = 0;
        loop {
            let mut request = self.http.post(&self.endpoint).json(&payload);
            if let Some(key) = &self.api_key {
                request = request.header("ApiKey", key);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if status == 200 {
                        debug!(status, "Catalog request succeeded");
                        let body: Value = response
                            .json()
                            .await
                            .map_err(|e| CatalogError::Parse(e.to_string()))?;
                        return parse_envelope(body);
                    } else if status == 429 || (500..600).contains(&status) {
                        attempt += 1;
                        if attempt >= MAX_RETRIES {
                            warn!(status, "Catalog request failed after {} attempts", MAX_RETRIES);
                            return Err(CatalogError::Api {
                                status,
                                message: format!("request failed after {} retries", MAX_RETRIES),
                            });
                        }
                        let backoff_ms = 100u64 * 2u64.pow(attempt);
                        warn!(
                            status,
                            attempt, backoff_ms, "Catalog request rate limited, retrying"
                        );
                        tokio::time::sleep(tokio::time::Duration::from_millis(backoff_ms)).await;
                    } else {
                        let message = response.text().await.unwrap_or_default();
                        warn!(status, "Catalog request rejected");
                        return Err(CatalogError::Api { status, message });
                    }
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= MAX_RETRIES {
                        warn!("Catalog request failed after {} attempts: {}", MAX_RETRIES, e);
                        return Err(e.into());
                    }
                    let backoff_ms = 100u64 * 2u64.pow(attempt);
                    warn!(attempt, backoff_ms, "Catalog transport error, retrying: {}", e);
                    tokio::time::sleep(tokio::time::Duration::from_millis(backoff_ms)).await;
                }
            }
        }
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn find_performer(&self, id: &str) -> Result<Option<Performer>> {
        let document = format!(
            "query FindPerformer($id: ID!) {{ findPerformer(id: $id) {{ {} }} }}",
            PERFORMER_FIELDS
        );
        let data = self
            .execute("FindPerformer", document, json!({ "id": id }))
            .await?;
        take_optional(&data, "findPerformer")
    }

    async fn find_performers_by_name(&self, name: &str) -> Result<Vec<Performer>> {
        let document = format!(
            "query FindPerformers($filter: FindFilterType) {{ \
             findPerformers(filter: $filter) {{ count performers {{ {} }} }} }}",
            PERFORMER_FIELDS
        );
        let data = self
            .execute(
                "FindPerformers",
                document,
                json!({ "filter": FindFilter::query(name) }),
            )
            .await?;
        take_page(&data, "findPerformers", "performers")
    }

    async fn performer_create(&self, input: &PerformerCreateInput) -> Result<Performer> {
        let document = format!(
            "mutation PerformerCreate($input: PerformerCreateInput!) {{ \
             performerCreate(input: $input) {{ {} }} }}",
            PERFORMER_FIELDS
        );
        let data = self
            .execute("PerformerCreate", document, json!({ "input": input }))
            .await?;
        take(&data, "performerCreate")
    }

    async fn performer_update(&self, input: &PerformerUpdateInput) -> Result<Performer> {
        let document = format!(
            "mutation PerformerUpdate($input: PerformerUpdateInput!) {{ \
             performerUpdate(input: $input) {{ {} }} }}",
            PERFORMER_FIELDS
        );
        let data = self
            .execute("PerformerUpdate", document, json!({ "input": input }))
            .await?;
        take(&data, "performerUpdate")
    }

    async fn find_studio(&self, id: &str) -> Result<Option<Studio>> {
        let document = format!(
            "query FindStudio($id: ID!) {{ findStudio(id: $id) {{ {} }} }}",
            STUDIO_FIELDS
        );
        let data = self
            .execute("FindStudio", document, json!({ "id": id }))
            .await?;
        take_optional(&data, "findStudio")
    }

    async fn find_studios(&self, q: &str) -> Result<Vec<Studio>> {
        let document = format!(
            "query FindStudios($filter: FindFilterType) {{ \
             findStudios(filter: $filter) {{ count studios {{ {} }} }} }}",
            STUDIO_FIELDS
        );
        let data = self
            .execute(
                "FindStudios",
                document,
                json!({ "filter": FindFilter::query(q) }),
            )
            .await?;
        take_page(&data, "findStudios", "studios")
    }

    async fn studio_create(&self, input: &StudioCreateInput) -> Result<Studio> {
        let document = format!(
            "mutation StudioCreate($input: StudioCreateInput!) {{ \
             studioCreate(input: $input) {{ {} }} }}",
            STUDIO_FIELDS
        );
        let data = self
            .execute("StudioCreate", document, json!({ "input": input }))
            .await?;
        take(&data, "studioCreate")
    }

    async fn studio_update(&self, input: &StudioUpdateInput) -> Result<Studio> {
        let document = format!(
            "mutation StudioUpdate($input: StudioUpdateInput!) {{ \
             studioUpdate(input: $input) {{ {} }} }}",
            STUDIO_FIELDS
        );
        let data = self
            .execute("StudioUpdate", document, json!({ "input": input }))
            .await?;
        take(&data, "studioUpdate")
    }

    async fn find_gallery(&self, id: &str) -> Result<Option<Gallery>> {
        let document = format!(
            "query FindGallery($id: ID!) {{ findGallery(id: $id) {{ {} }} }}",
            GALLERY_FIELDS
        );
        let data = self
            .execute("FindGallery", document, json!({ "id": id }))
            .await?;
        take_optional(&data, "findGallery")
    }

    async fn find_galleries(
        &self,
        filter: &FindFilter,
        gallery_filter: &GalleryFilter,
    ) -> Result<Vec<Gallery>> {
        let document = format!(
            "query FindGalleries($filter: FindFilterType, $gallery_filter: GalleryFilterType) {{ \
             findGalleries(filter: $filter, gallery_filter: $gallery_filter) \
             {{ count galleries {{ {} }} }} }}",
            GALLERY_FIELDS
        );
        let data = self
            .execute(
                "FindGalleries",
                document,
                json!({ "filter": filter, "gallery_filter": gallery_filter }),
            )
            .await?;
        take_page(&data, "findGalleries", "galleries")
    }

    async fn gallery_create(&self, input: &GalleryCreateInput) -> Result<Gallery> {
        let document = format!(
            "mutation GalleryCreate($input: GalleryCreateInput!) {{ \
             galleryCreate(input: $input) {{ {} }} }}",
            GALLERY_FIELDS
        );
        let data = self
            .execute("GalleryCreate", document, json!({ "input": input }))
            .await?;
        take(&data, "galleryCreate")
    }

    async fn gallery_update(&self, input: &GalleryUpdateInput) -> Result<Gallery> {
        let document = format!(
            "mutation GalleryUpdate($input: GalleryUpdateInput!) {{ \
             galleryUpdate(input: $input) {{ {} }} }}",
            GALLERY_FIELDS
        );
        let data = self
            .execute("GalleryUpdate", document, json!({ "input": input }))
            .await?;
        take(&data, "galleryUpdate")
    }

    async fn gallery_images_add(&self, gallery_id: &str, image_ids: &[String]) -> Result<()> {
        let document = "mutation GalleryImagesAdd($gallery_id: ID!, $image_ids: [ID!]!) { \
             addGalleryImages(input: { gallery_id: $gallery_id, image_ids: $image_ids }) }"
            .to_string();
        self.execute(
            "GalleryImagesAdd",
            document,
            json!({ "gallery_id": gallery_id, "image_ids": image_ids }),
        )
        .await?;
        Ok(())
    }

    async fn gallery_chapter_create(&self, input: &ChapterCreateInput) -> Result<Chapter> {
        let document = "mutation GalleryChapterCreate($input: GalleryChapterCreateInput!) { \
             galleryChapterCreate(input: $input) { id title image_index } }"
            .to_string();
        let data = self
            .execute("GalleryChapterCreate", document, json!({ "input": input }))
            .await?;
        take(&data, "galleryChapterCreate")
    }

    async fn find_image(&self, id: &str) -> Result<Option<Image>> {
        let document = format!(
            "query FindImage($id: ID!) {{ findImage(id: $id) {{ {} }} }}",
            IMAGE_FIELDS
        );
        let data = self
            .execute("FindImage", document, json!({ "id": id }))
            .await?;
        take_optional(&data, "findImage")
    }

    async fn find_images(&self, path_filter: &PathFilter) -> Result<Vec<Image>> {
        let document = format!(
            "query FindImages($image_filter: ImageFilterType, $filter: FindFilterType) {{ \
             findImages(image_filter: $image_filter, filter: $filter) \
             {{ count images {{ {} }} }} }}",
            IMAGE_FIELDS
        );
        let data = self
            .execute(
                "FindImages",
                document,
                json!({ "image_filter": path_filter, "filter": FindFilter::unbounded() }),
            )
            .await?;
        take_page(&data, "findImages", "images")
    }

    async fn image_update(&self, input: &ImageUpdateInput) -> Result<Image> {
        let document = format!(
            "mutation ImageUpdate($input: ImageUpdateInput!) {{ \
             imageUpdate(input: $input) {{ {} }} }}",
            IMAGE_FIELDS
        );
        let data = self
            .execute("ImageUpdate", document, json!({ "input": input }))
            .await?;
        take(&data, "imageUpdate")
    }

    async fn find_scene(&self, id: &str) -> Result<Option<Scene>> {
        let document = format!(
            "query FindScene($id: ID!) {{ findScene(id: $id) {{ {} }} }}",
            SCENE_FIELDS
        );
        let data = self
            .execute("FindScene", document, json!({ "id": id }))
            .await?;
        take_optional(&data, "findScene")
    }

    async fn find_scenes(&self, path_filter: &PathFilter) -> Result<Vec<Scene>> {
        let document = format!(
            "query FindScenes($scene_filter: SceneFilterType, $filter: FindFilterType) {{ \
             findScenes(scene_filter: $scene_filter, filter: $filter) \
             {{ count scenes {{ {} }} }} }}",
            SCENE_FIELDS
        );
        let data = self
            .execute(
                "FindScenes",
                document,
                json!({ "scene_filter": path_filter, "filter": FindFilter::unbounded() }),
            )
            .await?;
        take_page(&data, "findScenes", "scenes")
    }

    async fn scene_update(&self, input: &SceneUpdateInput) -> Result<Scene> {
        let document = format!(
            "mutation SceneUpdate($input: SceneUpdateInput!) {{ \
             sceneUpdate(input: $input) {{ {} }} }}",
            SCENE_FIELDS
        );
        let data = self
            .execute("SceneUpdate", document, json!({ "input": input }))
            .await?;
        take(&data, "sceneUpdate")
    }

    async fn find_tags(&self, q: &str) -> Result<Vec<Tag>> {
        let document = "query FindTags($filter: FindFilterType) { \
             findTags(filter: $filter) { count tags { id name } } }"
            .to_string();
        let data = self
            .execute(
                "FindTags",
                document,
                json!({ "filter": FindFilter::query(q) }),
            )
            .await?;
        take_page(&data, "findTags", "tags")
    }

    async fn tag_create(&self, name: &str) -> Result<Tag> {
        let document = "mutation TagCreate($input: TagCreateInput!) { \
             tagCreate(input: $input) { id name } }"
            .to_string();
        let data = self
            .execute("TagCreate", document, json!({ "input": { "name": name } }))
            .await?;
        take(&data, "tagCreate")
    }

    async fn find_job(&self, job_id: &str) -> Result<Option<Job>> {
        let document = "query FindJob($input: FindJobInput!) { \
             findJob(input: $input) { id status } }"
            .to_string();
        let data = self
            .execute("FindJob", document, json!({ "input": { "id": job_id } }))
            .await?;
        take_optional(&data, "findJob")
    }

    async fn metadata_scan(&self, paths: &[String]) -> Result<String> {
        let document = "mutation MetadataScan($input: ScanMetadataInput!) { \
             metadataScan(input: $input) }"
            .to_string();
        let data = self
            .execute("MetadataScan", document, json!({ "input": { "paths": paths } }))
            .await?;
        take(&data, "metadataScan")
    }
}
