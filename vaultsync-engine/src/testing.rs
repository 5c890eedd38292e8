//! In-memory catalog double for engine tests
//!
//! Behaves like a tiny catalog service: objects live in a mutex-guarded
//! state, creates allocate ids, duplicate names fail the way the real
//! service does, and path queries match file paths by substring. Call and
//! mutation counters let tests assert on protocol traffic, most notably
//! that a second run over unchanged data issues zero mutations.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use vaultsync_catalog::{
    CatalogClient, CatalogError, Chapter, ChapterCreateInput, FileInfo, FindFilter, Gallery,
    GalleryCreateInput, GalleryFilter, GalleryUpdateInput, IdRef, Image, ImageUpdateInput, Job,
    JobStatus, PathFilter, Performer, PerformerCreateInput, PerformerUpdateInput, Result, Scene,
    SceneUpdateInput, Studio, StudioCreateInput, StudioUpdateInput, Tag,
};

#[derive(Default)]
struct State {
    performers: Vec<Performer>,
    studios: Vec<Studio>,
    galleries: Vec<Gallery>,
    images: Vec<Image>,
    scenes: Vec<Scene>,
    tags: Vec<Tag>,
    jobs: HashMap<String, JobStatus>,
    fail_scans: bool,
    gallery_images: HashMap<String, Vec<String>>,
    chapters: Vec<Chapter>,
    next_id: u64,
    mutations: usize,
    calls: Vec<String>,
}

impl State {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }
}

pub struct FakeCatalog {
    state: Mutex<State>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    pub fn seed_studio(&self, name: &str, parent_id: Option<&str>) -> Studio {
        let mut state = self.state.lock().unwrap();
        let studio = Studio {
            id: state.next_id(),
            name: name.to_string(),
            parent_studio: parent_id.map(IdRef::new),
        };
        state.studios.push(studio.clone());
        studio
    }

    pub fn seed_performer(&self, name: &str) -> Performer {
        let mut state = self.state.lock().unwrap();
        let performer = Performer {
            id: state.next_id(),
            name: name.to_string(),
            aliases: vec![],
            urls: vec![],
        };
        state.performers.push(performer.clone());
        performer
    }

    pub fn seed_tag(&self, name: &str) -> Tag {
        let mut state = self.state.lock().unwrap();
        let tag = Tag {
            id: state.next_id(),
            name: name.to_string(),
        };
        state.tags.push(tag.clone());
        tag
    }

    pub fn seed_image(&self, path: &str) -> Image {
        let mut state = self.state.lock().unwrap();
        let image = Image {
            id: state.next_id(),
            title: None,
            details: None,
            date: None,
            code: None,
            urls: vec![],
            organized: false,
            studio: None,
            performers: vec![],
            tags: vec![],
            visual_files: vec![FileInfo {
                id: None,
                path: path.to_string(),
            }],
        };
        state.images.push(image.clone());
        image
    }

    pub fn seed_scene(&self, path: &str) -> Scene {
        let mut state = self.state.lock().unwrap();
        let scene = Scene {
            id: state.next_id(),
            title: None,
            details: None,
            date: None,
            code: None,
            urls: vec![],
            organized: false,
            studio: None,
            performers: vec![],
            tags: vec![],
            files: vec![FileInfo {
                id: None,
                path: path.to_string(),
            }],
        };
        state.scenes.push(scene.clone());
        scene
    }

    pub fn set_organized_image(&self, image_id: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(image) = state.images.iter_mut().find(|i| i.id == image_id) {
            image.organized = true;
        }
    }

    pub fn fail_scans(&self) {
        self.state.lock().unwrap().fail_scans = true;
    }

    pub fn set_job(&self, job_id: &str, status: JobStatus) {
        self.state
            .lock()
            .unwrap()
            .jobs
            .insert(job_id.to_string(), status);
    }

    pub fn mutation_count(&self) -> usize {
        self.state.lock().unwrap().mutations
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn studios(&self) -> Vec<Studio> {
        self.state.lock().unwrap().studios.clone()
    }

    pub fn galleries(&self) -> Vec<Gallery> {
        self.state.lock().unwrap().galleries.clone()
    }

    pub fn image(&self, id: &str) -> Option<Image> {
        self.state
            .lock()
            .unwrap()
            .images
            .iter()
            .find(|i| i.id == id)
            .cloned()
    }

    pub fn scene(&self, id: &str) -> Option<Scene> {
        self.state
            .lock()
            .unwrap()
            .scenes
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    pub fn gallery_image_ids(&self, gallery_id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .gallery_images
            .get(gallery_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn chapters(&self) -> Vec<Chapter> {
        self.state.lock().unwrap().chapters.clone()
    }

    fn record(&self, call: &str) {
        self.state.lock().unwrap().calls.push(call.to_string());
    }

    fn path_matches(file: Option<&FileInfo>, filter: &PathFilter) -> bool {
        let Some(file) = file else {
            return false;
        };
        filter
            .conditions()
            .iter()
            .any(|criterion| file.path.contains(&criterion.value))
    }
}

impl Default for FakeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn find_performer(&self, id: &str) -> Result<Option<Performer>> {
        self.record("findPerformer");
        let state = self.state.lock().unwrap();
        Ok(state.performers.iter().find(|p| p.id == id).cloned())
    }

    async fn find_performers_by_name(&self, name: &str) -> Result<Vec<Performer>> {
        self.record("findPerformers");
        let state = self.state.lock().unwrap();
        Ok(state
            .performers
            .iter()
            .filter(|p| p.name == name)
            .cloned()
            .collect())
    }

    async fn performer_create(&self, input: &PerformerCreateInput) -> Result<Performer> {
        self.record("performerCreate");
        let mut state = self.state.lock().unwrap();
        if state.performers.iter().any(|p| p.name == input.name) {
            return Err(CatalogError::AlreadyExists {
                name: input.name.clone(),
            });
        }
        let performer = Performer {
            id: state.next_id(),
            name: input.name.clone(),
            aliases: input.aliases.clone(),
            urls: input.urls.clone(),
        };
        state.performers.push(performer.clone());
        state.mutations += 1;
        Ok(performer)
    }

    async fn performer_update(&self, input: &PerformerUpdateInput) -> Result<Performer> {
        self.record("performerUpdate");
        let mut state = self.state.lock().unwrap();
        state.mutations += 1;
        let performer = state
            .performers
            .iter_mut()
            .find(|p| p.id == input.id)
            .ok_or_else(|| CatalogError::Operation(format!("performer {} not found", input.id)))?;
        if let Some(name) = &input.name {
            performer.name = name.clone();
        }
        if let Some(urls) = &input.urls {
            performer.urls = urls.clone();
        }
        Ok(performer.clone())
    }

    async fn find_studio(&self, id: &str) -> Result<Option<Studio>> {
        self.record("findStudio");
        let state = self.state.lock().unwrap();
        Ok(state.studios.iter().find(|s| s.id == id).cloned())
    }

    async fn find_studios(&self, q: &str) -> Result<Vec<Studio>> {
        self.record(&format!("findStudios:{}", q));
        let state = self.state.lock().unwrap();
        Ok(state
            .studios
            .iter()
            .filter(|s| s.name == q)
            .cloned()
            .collect())
    }

    async fn studio_create(&self, input: &StudioCreateInput) -> Result<Studio> {
        self.record("studioCreate");
        let mut state = self.state.lock().unwrap();
        if state.studios.iter().any(|s| s.name == input.name) {
            return Err(CatalogError::AlreadyExists {
                name: input.name.clone(),
            });
        }
        let studio = Studio {
            id: state.next_id(),
            name: input.name.clone(),
            parent_studio: input.parent_id.clone().map(IdRef::new),
        };
        state.studios.push(studio.clone());
        state.mutations += 1;
        Ok(studio)
    }

    async fn studio_update(&self, input: &StudioUpdateInput) -> Result<Studio> {
        self.record("studioUpdate");
        let mut state = self.state.lock().unwrap();
        state.mutations += 1;
        let studio = state
            .studios
            .iter_mut()
            .find(|s| s.id == input.id)
            .ok_or_else(|| CatalogError::Operation(format!("studio {} not found", input.id)))?;
        if let Some(parent_id) = &input.parent_id {
            studio.parent_studio = Some(IdRef::new(parent_id.clone()));
        }
        Ok(studio.clone())
    }

    async fn find_gallery(&self, id: &str) -> Result<Option<Gallery>> {
        self.record("findGallery");
        let state = self.state.lock().unwrap();
        Ok(state.galleries.iter().find(|g| g.id == id).cloned())
    }

    async fn find_galleries(
        &self,
        _filter: &FindFilter,
        gallery_filter: &GalleryFilter,
    ) -> Result<Vec<Gallery>> {
        self.record("findGalleries");
        let state = self.state.lock().unwrap();
        Ok(state
            .galleries
            .iter()
            .filter(|g| {
                let title_ok = gallery_filter
                    .title
                    .as_ref()
                    .map_or(true, |c| g.title.as_deref() == Some(c.value.as_str()));
                let date_ok = gallery_filter
                    .date
                    .as_ref()
                    .map_or(true, |c| g.date.as_deref() == Some(c.value.as_str()));
                let code_ok = gallery_filter
                    .code
                    .as_ref()
                    .map_or(true, |c| g.code.as_deref() == Some(c.value.as_str()));
                let url_ok = gallery_filter
                    .url
                    .as_ref()
                    .map_or(true, |c| g.urls.iter().any(|u| u == &c.value));
                title_ok && date_ok && code_ok && url_ok
            })
            .cloned()
            .collect())
    }

    async fn gallery_create(&self, input: &GalleryCreateInput) -> Result<Gallery> {
        self.record("galleryCreate");
        let mut state = self.state.lock().unwrap();
        let gallery = Gallery {
            id: state.next_id(),
            title: input.title.clone(),
            details: input.details.clone(),
            date: input.date.clone(),
            code: input.code.clone(),
            urls: input.urls.clone(),
            organized: false,
            studio: input.studio_id.clone().map(IdRef::new),
            performers: input.performer_ids.iter().cloned().map(IdRef::new).collect(),
            tags: input.tag_ids.iter().cloned().map(IdRef::new).collect(),
        };
        state.galleries.push(gallery.clone());
        state.mutations += 1;
        Ok(gallery)
    }

    async fn gallery_update(&self, input: &GalleryUpdateInput) -> Result<Gallery> {
        self.record("galleryUpdate");
        let mut state = self.state.lock().unwrap();
        state.mutations += 1;
        let gallery = state
            .galleries
            .iter_mut()
            .find(|g| g.id == input.id)
            .ok_or_else(|| CatalogError::Operation(format!("gallery {} not found", input.id)))?;
        if let Some(title) = &input.title {
            gallery.title = Some(title.clone());
        }
        if let Some(details) = &input.details {
            gallery.details = Some(details.clone());
        }
        if let Some(date) = &input.date {
            gallery.date = Some(date.clone());
        }
        if let Some(code) = &input.code {
            gallery.code = Some(code.clone());
        }
        if let Some(urls) = &input.urls {
            gallery.urls = urls.clone();
        }
        if let Some(studio_id) = &input.studio_id {
            gallery.studio = Some(IdRef::new(studio_id.clone()));
        }
        if let Some(ids) = &input.performer_ids {
            gallery.performers = ids.iter().cloned().map(IdRef::new).collect();
        }
        if let Some(ids) = &input.tag_ids {
            gallery.tags = ids.iter().cloned().map(IdRef::new).collect();
        }
        Ok(gallery.clone())
    }

    async fn gallery_images_add(&self, gallery_id: &str, image_ids: &[String]) -> Result<()> {
        self.record("galleryImagesAdd");
        let mut state = self.state.lock().unwrap();
        let mut changed = false;
        let entry = state
            .gallery_images
            .entry(gallery_id.to_string())
            .or_default();
        for id in image_ids {
            if !entry.contains(id) {
                entry.push(id.clone());
                changed = true;
            }
        }
        // The service treats re-adding attached images as a no-op.
        if changed {
            state.mutations += 1;
        }
        Ok(())
    }

    async fn gallery_chapter_create(&self, input: &ChapterCreateInput) -> Result<Chapter> {
        self.record("galleryChapterCreate");
        let mut state = self.state.lock().unwrap();
        let chapter = Chapter {
            id: state.next_id(),
            title: Some(input.title.clone()),
            image_index: input.image_index,
        };
        state.chapters.push(chapter.clone());
        state.mutations += 1;
        Ok(chapter)
    }

    async fn find_image(&self, id: &str) -> Result<Option<Image>> {
        self.record("findImage");
        let state = self.state.lock().unwrap();
        Ok(state.images.iter().find(|i| i.id == id).cloned())
    }

    async fn find_images(&self, path_filter: &PathFilter) -> Result<Vec<Image>> {
        self.record("findImages");
        let state = self.state.lock().unwrap();
        Ok(state
            .images
            .iter()
            .filter(|i| Self::path_matches(i.primary_file(), path_filter))
            .cloned()
            .collect())
    }

    async fn image_update(&self, input: &ImageUpdateInput) -> Result<Image> {
        self.record("imageUpdate");
        let mut state = self.state.lock().unwrap();
        state.mutations += 1;
        let image = state
            .images
            .iter_mut()
            .find(|i| i.id == input.id)
            .ok_or_else(|| CatalogError::Operation(format!("image {} not found", input.id)))?;
        if let Some(title) = &input.title {
            image.title = Some(title.clone());
        }
        if let Some(details) = &input.details {
            image.details = Some(details.clone());
        }
        if let Some(date) = &input.date {
            image.date = Some(date.clone());
        }
        if let Some(code) = &input.code {
            image.code = Some(code.clone());
        }
        if let Some(urls) = &input.urls {
            image.urls = urls.clone();
        }
        if let Some(studio_id) = &input.studio_id {
            image.studio = Some(IdRef::new(studio_id.clone()));
        }
        if let Some(ids) = &input.performer_ids {
            image.performers = ids.iter().cloned().map(IdRef::new).collect();
        }
        if let Some(ids) = &input.tag_ids {
            image.tags = ids.iter().cloned().map(IdRef::new).collect();
        }
        Ok(image.clone())
    }

    async fn find_scene(&self, id: &str) -> Result<Option<Scene>> {
        self.record("findScene");
        let state = self.state.lock().unwrap();
        Ok(state.scenes.iter().find(|s| s.id == id).cloned())
    }

    async fn find_scenes(&self, path_filter: &PathFilter) -> Result<Vec<Scene>> {
        self.record("findScenes");
        let state = self.state.lock().unwrap();
        Ok(state
            .scenes
            .iter()
            .filter(|s| Self::path_matches(s.primary_file(), path_filter))
            .cloned()
            .collect())
    }

    async fn scene_update(&self, input: &SceneUpdateInput) -> Result<Scene> {
        self.record("sceneUpdate");
        let mut state = self.state.lock().unwrap();
        state.mutations += 1;
        let scene = state
            .scenes
            .iter_mut()
            .find(|s| s.id == input.id)
            .ok_or_else(|| CatalogError::Operation(format!("scene {} not found", input.id)))?;
        if let Some(title) = &input.title {
            scene.title = Some(title.clone());
        }
        if let Some(details) = &input.details {
            scene.details = Some(details.clone());
        }
        if let Some(date) = &input.date {
            scene.date = Some(date.clone());
        }
        if let Some(code) = &input.code {
            scene.code = Some(code.clone());
        }
        if let Some(urls) = &input.urls {
            scene.urls = urls.clone();
        }
        if let Some(studio_id) = &input.studio_id {
            scene.studio = Some(IdRef::new(studio_id.clone()));
        }
        if let Some(ids) = &input.performer_ids {
            scene.performers = ids.iter().cloned().map(IdRef::new).collect();
        }
        if let Some(ids) = &input.tag_ids {
            scene.tags = ids.iter().cloned().map(IdRef::new).collect();
        }
        Ok(scene.clone())
    }

    async fn find_tags(&self, q: &str) -> Result<Vec<Tag>> {
        self.record("findTags");
        let state = self.state.lock().unwrap();
        Ok(state
            .tags
            .iter()
            .filter(|t| t.name.eq_ignore_ascii_case(q))
            .cloned()
            .collect())
    }

    async fn tag_create(&self, name: &str) -> Result<Tag> {
        self.record("tagCreate");
        let mut state = self.state.lock().unwrap();
        if state.tags.iter().any(|t| t.name.eq_ignore_ascii_case(name)) {
            return Err(CatalogError::AlreadyExists {
                name: name.to_string(),
            });
        }
        let tag = Tag {
            id: state.next_id(),
            name: name.to_string(),
        };
        state.tags.push(tag.clone());
        state.mutations += 1;
        Ok(tag)
    }

    async fn find_job(&self, job_id: &str) -> Result<Option<Job>> {
        self.record("findJob");
        let state = self.state.lock().unwrap();
        Ok(state.jobs.get(job_id).map(|status| Job {
            id: job_id.to_string(),
            status: *status,
        }))
    }

    async fn metadata_scan(&self, _paths: &[String]) -> Result<String> {
        self.record("metadataScan");
        let mut state = self.state.lock().unwrap();
        if state.fail_scans {
            return Err(CatalogError::Transport("scan endpoint down".to_string()));
        }
        let job_id = format!("job-{}", state.next_id());
        state.jobs.insert(job_id.clone(), JobStatus::Finished);
        Ok(job_id)
    }
}
