//! Catalog object graph types
//!
//! Mirrors the entities owned by the remote catalog service: performers,
//! studios, galleries, images, scenes, tags, chapters and background jobs.
//! Field names follow the wire protocol, which uses snake_case.

use serde::{Deserialize, Serialize};

// ============================================================================
// Common
// ============================================================================

/// Reference to another catalog object by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: String,
}

impl IdRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

// ============================================================================
// Performer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Performer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformerCreateInput {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    /// Base64 data URI or fetchable URL for the avatar image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformerUpdateInput {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

// ============================================================================
// Studio
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Studio {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_studio: Option<IdRef>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StudioCreateInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StudioUpdateInput {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

// ============================================================================
// Gallery
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gallery {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    /// `YYYY-MM-DD`.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub organized: bool,
    #[serde(default)]
    pub studio: Option<IdRef>,
    #[serde(default)]
    pub performers: Vec<IdRef>,
    #[serde(default)]
    pub tags: Vec<IdRef>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GalleryCreateInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub studio_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub performer_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tag_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GalleryUpdateInput {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub studio_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performer_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<String>>,
}

/// Sub-range within a gallery, used for media contributed by a nested
/// aggregated post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub image_index: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChapterCreateInput {
    pub gallery_id: String,
    pub title: String,
    /// 1-based index of the chapter's first image within the gallery.
    pub image_index: i64,
}

// ============================================================================
// Image / Scene
// ============================================================================

/// Normalized file descriptor attached to an image or scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    #[serde(default)]
    pub id: Option<String>,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub organized: bool,
    #[serde(default)]
    pub studio: Option<IdRef>,
    #[serde(default)]
    pub performers: Vec<IdRef>,
    #[serde(default)]
    pub tags: Vec<IdRef>,
    #[serde(default)]
    pub visual_files: Vec<FileInfo>,
}

impl Image {
    /// First visual file, the normalized descriptor for path matching.
    pub fn primary_file(&self) -> Option<&FileInfo> {
        self.visual_files.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub organized: bool,
    #[serde(default)]
    pub studio: Option<IdRef>,
    #[serde(default)]
    pub performers: Vec<IdRef>,
    #[serde(default)]
    pub tags: Vec<IdRef>,
    #[serde(default)]
    pub files: Vec<FileInfo>,
}

impl Scene {
    pub fn primary_file(&self) -> Option<&FileInfo> {
        self.files.first()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImageUpdateInput {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub studio_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performer_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SceneUpdateInput {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub studio_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performer_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<String>>,
}

impl From<&Image> for ImageUpdateInput {
    /// Full-state update input mirroring the object's merge-relevant fields.
    fn from(image: &Image) -> Self {
        Self {
            id: image.id.clone(),
            title: image.title.clone(),
            details: image.details.clone(),
            date: image.date.clone(),
            code: image.code.clone(),
            urls: Some(image.urls.clone()),
            studio_id: image.studio.as_ref().map(|s| s.id.clone()),
            performer_ids: Some(image.performers.iter().map(|p| p.id.clone()).collect()),
            tag_ids: Some(image.tags.iter().map(|t| t.id.clone()).collect()),
        }
    }
}

impl From<&Scene> for SceneUpdateInput {
    fn from(scene: &Scene) -> Self {
        Self {
            id: scene.id.clone(),
            title: scene.title.clone(),
            details: scene.details.clone(),
            date: scene.date.clone(),
            code: scene.code.clone(),
            urls: Some(scene.urls.clone()),
            studio_id: scene.studio.as_ref().map(|s| s.id.clone()),
            performer_ids: Some(scene.performers.iter().map(|p| p.id.clone()).collect()),
            tag_ids: Some(scene.tags.iter().map(|t| t.id.clone()).collect()),
        }
    }
}

impl From<&Gallery> for GalleryUpdateInput {
    fn from(gallery: &Gallery) -> Self {
        Self {
            id: gallery.id.clone(),
            title: gallery.title.clone(),
            details: gallery.details.clone(),
            date: gallery.date.clone(),
            code: gallery.code.clone(),
            urls: Some(gallery.urls.clone()),
            studio_id: gallery.studio.as_ref().map(|s| s.id.clone()),
            performer_ids: Some(gallery.performers.iter().map(|p| p.id.clone()).collect()),
            tag_ids: Some(gallery.tags.iter().map(|t| t.id.clone()).collect()),
        }
    }
}

// ============================================================================
// Tag
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
}

// ============================================================================
// Jobs
// ============================================================================

/// Remote background job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Ready,
    Running,
    Stopping,
    Finished,
    Cancelled,
    Failed,
}

impl JobStatus {
    /// Terminal statuses end the job; no further updates will arrive.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Cancelled | JobStatus::Failed
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Ready => "READY",
            JobStatus::Running => "RUNNING",
            JobStatus::Stopping => "STOPPING",
            JobStatus::Finished => "FINISHED",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_terminal() {
        assert!(JobStatus::Finished.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Ready.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Stopping.is_terminal());
    }

    #[test]
    fn test_job_status_wire_format() {
        let job: Job = serde_json::from_str(r#"{"id":"17","status":"FINISHED"}"#).unwrap();
        assert_eq!(job.status, JobStatus::Finished);
    }

    #[test]
    fn test_update_input_skips_unset_fields() {
        let input = ImageUpdateInput {
            id: "4".to_string(),
            title: Some("t".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["id"], "4");
        assert_eq!(json["title"], "t");
        assert!(json.get("details").is_none());
        assert!(json.get("performer_ids").is_none());
    }

    #[test]
    fn test_primary_file() {
        let image: Image = serde_json::from_str(
            r#"{"id":"1","visual_files":[{"path":"/a/100.jpg"},{"path":"/a/101.jpg"}]}"#,
        )
        .unwrap();
        assert_eq!(image.primary_file().unwrap().path, "/a/100.jpg");

        let scene: Scene = serde_json::from_str(r#"{"id":"2","files":[]}"#).unwrap();
        assert!(scene.primary_file().is_none());
    }
}
