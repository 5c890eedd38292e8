//! Metadata merge policy for catalog visuals and galleries
//!
//! One catalog object can back several vault items (a media file reposted
//! across posts and messages), so annotation must converge no matter the
//! order items are processed in: the earliest item wins. An object is only
//! rewritten when the incoming item is strictly earlier than the recorded
//! date or the object was never annotated, and hand-curated objects
//! (`organized`) are never touched.

use std::sync::Arc;
use chrono::NaiveDate;
use tracing::{debug, warn};
use vaultsync_catalog::{Gallery, IdRef, Image, Scene};
use vaultsync_store::{Account, ContentItem, MediaId};

use crate::error::Result;
use crate::resolvers::{PerformerResolver, StudioResolver, TagResolver};

const TITLE_MAX_CHARS: usize = 64;

/// Catalog object kinds the policy can annotate. Images, scenes, and
/// galleries carry the same metadata surface.
pub trait MergeTarget {
    fn organized(&self) -> bool;
    fn date(&self) -> Option<&str>;
    fn set_title(&mut self, title: String);
    fn set_details(&mut self, details: String);
    fn set_date(&mut self, date: String);
    fn set_code(&mut self, code: String);
    fn add_url(&mut self, url: String);
    fn set_studio(&mut self, studio_id: String);
    fn set_performers(&mut self, performer_ids: Vec<String>);
    fn set_tags(&mut self, tag_ids: Vec<String>);
}

macro_rules! impl_merge_target {
    ($($ty:ty),+) => {$(
        impl MergeTarget for $ty {
            fn organized(&self) -> bool {
                self.organized
            }
            fn date(&self) -> Option<&str> {
                self.date.as_deref()
            }
            fn set_title(&mut self, title: String) {
                self.title = Some(title);
            }
            fn set_details(&mut self, details: String) {
                self.details = Some(details);
            }
            fn set_date(&mut self, date: String) {
                self.date = Some(date);
            }
            fn set_code(&mut self, code: String) {
                self.code = Some(code);
            }
            fn add_url(&mut self, url: String) {
                if !self.urls.contains(&url) {
                    self.urls.push(url);
                }
            }
            fn set_studio(&mut self, studio_id: String) {
                self.studio = Some(IdRef::new(studio_id));
            }
            fn set_performers(&mut self, performer_ids: Vec<String>) {
                self.performers = performer_ids.into_iter().map(IdRef::new).collect();
            }
            fn set_tags(&mut self, tag_ids: Vec<String>) {
                self.tags = tag_ids.into_iter().map(IdRef::new).collect();
            }
        }
    )+};
}

impl_merge_target!(Image, Scene, Gallery);

/// Applies item metadata to catalog objects under the earliest-item-wins
/// rule.
pub struct MergePolicy {
    performers: Arc<PerformerResolver>,
    studios: Arc<StudioResolver>,
    tags: Arc<TagResolver>,
}

impl MergePolicy {
    pub fn new(
        performers: Arc<PerformerResolver>,
        studios: Arc<StudioResolver>,
        tags: Arc<TagResolver>,
    ) -> Self {
        Self {
            performers,
            studios,
            tags,
        }
    }

    /// Merge an item's metadata into a target. Returns whether the target
    /// changed; callers only push an update when it did.
    ///
    /// `position` is the 1-based slot and total count when the target is
    /// one of several attachments; `url` is the public page URL, absent
    /// for message items.
    pub async fn apply<T>(
        &self,
        target: &mut T,
        item: &ContentItem,
        account: &Account,
        media_id: MediaId,
        is_preview: bool,
        position: Option<(usize, usize)>,
        url: Option<&str>,
    ) -> Result<bool>
    where
        T: MergeTarget + Clone + PartialEq,
    {
        if target.organized() {
            debug!(item_id = item.id, "Target is organized, leaving untouched");
            return Ok(false);
        }
        if !self.should_annotate(target, item) {
            return Ok(false);
        }

        let snapshot = target.clone();

        target.set_title(derive_title(item, account, position));
        target.set_details(item.content.clone());
        target.set_date(item.date_string());
        target.set_code(media_id.to_string());
        if let Some(url) = url {
            target.add_url(url.to_string());
        }

        target.set_performers(self.performer_ids(item, account).await?);
        target.set_studio(self.studios.resolve(account).await?.id);
        target.set_tags(self.tag_ids(item, is_preview).await?);

        Ok(*target != snapshot)
    }

    /// Annotate when the object carries no usable date, or when the item
    /// predates the recorded one.
    fn should_annotate<T: MergeTarget>(&self, target: &T, item: &ContentItem) -> bool {
        let Some(recorded) = target.date() else {
            return true;
        };
        match NaiveDate::parse_from_str(recorded, "%Y-%m-%d") {
            Ok(recorded) => item.created_at.date_naive() < recorded,
            Err(_) => {
                warn!(recorded, "Unparseable recorded date, re-annotating");
                true
            }
        }
    }

    async fn performer_ids(&self, item: &ContentItem, account: &Account) -> Result<Vec<String>> {
        let owner = self.performers.resolve(account).await?;
        let mut ids = vec![owner.id];
        for mention in &item.mentions {
            if let Some(performer) = self.performers.resolve_mention(*mention).await? {
                if !ids.contains(&performer.id) {
                    ids.push(performer.id);
                }
            }
        }
        Ok(ids)
    }

    async fn tag_ids(&self, item: &ContentItem, is_preview: bool) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for hashtag in &item.hashtags {
            let tag = self.tags.resolve(hashtag).await?;
            if !ids.contains(&tag.id) {
                ids.push(tag.id);
            }
        }
        if is_preview {
            let tag = self.tags.preview_tag().await?;
            if !ids.contains(&tag.id) {
                ids.push(tag.id);
            }
        }
        Ok(ids)
    }
}

/// First non-empty content line, truncated; falls back to creator and
/// date for caption-less items. Multi-attachment items get a position
/// suffix so titles stay distinguishable.
pub(crate) fn derive_title(
    item: &ContentItem,
    account: &Account,
    position: Option<(usize, usize)>,
) -> String {
    let mut title = match item
        .content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
    {
        Some(line) => truncate_chars(line, TITLE_MAX_CHARS),
        None => format!("{} - {}", account.display_or_username(), item.date_string()),
    };
    if let Some((pos, total)) = position {
        if total > 1 {
            title.push_str(&format!(" {}/{}", pos, total));
        }
    }
    title
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push('…');
    out
}
