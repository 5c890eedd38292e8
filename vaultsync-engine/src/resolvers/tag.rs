//! Hashtag-to-tag resolution

use std::sync::Arc;
use tracing::{info, instrument};
use vaultsync_catalog::{CatalogClient, CatalogError, Tag};

use crate::error::Result;

/// Tag applied to preview media instead of a hashtag.
pub const PREVIEW_TAG: &str = "Trailer";

/// Resolves hashtags to catalog tags, creating missing ones.
pub struct TagResolver {
    catalog: Arc<dyn CatalogClient>,
}

impl TagResolver {
    pub fn new(catalog: Arc<dyn CatalogClient>) -> Self {
        Self { catalog }
    }

    /// Find a tag by name, case-insensitively, creating it when absent.
    #[instrument(skip(self))]
    pub async fn resolve(&self, name: &str) -> Result<Tag> {
        if let Some(tag) = self.find_exact(name).await? {
            return Ok(tag);
        }

        match self.catalog.tag_create(name).await {
            Ok(tag) => {
                info!(tag_id = %tag.id, name, "Created catalog tag");
                Ok(tag)
            }
            // A concurrent writer won the create; the name query now sees
            // their tag.
            Err(CatalogError::AlreadyExists { .. }) => match self.find_exact(name).await? {
                Some(tag) => Ok(tag),
                None => Err(CatalogError::AlreadyExists {
                    name: name.to_string(),
                }
                .into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// The tag marking preview media.
    pub async fn preview_tag(&self) -> Result<Tag> {
        self.resolve(PREVIEW_TAG).await
    }

    async fn find_exact(&self, name: &str) -> Result<Option<Tag>> {
        let tags = self.catalog.find_tags(name).await?;
        Ok(tags
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name)))
    }
}
