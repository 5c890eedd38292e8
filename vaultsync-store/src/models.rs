//! Domain models for the scraped content vault
//!
//! Numeric ids mirror the scraper's upstream identifiers; they are not
//! generated locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// ID Types
// =============================================================================

/// Unique identifier for an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a media row (shared by primary media and variants)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct MediaId(pub i64);

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a media bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct BundleId(pub i64);

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Accounts
// =============================================================================

/// A creator account scraped into the vault.
///
/// `performer_remote_id` and `studio_remote_id` are the only columns the
/// sync engine writes; once set they short-circuit name lookups against the
/// catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub display_name: Option<String>,
    /// Media row holding the account avatar, when scraped.
    pub avatar_media_id: Option<MediaId>,
    /// Linked catalog performer id, once resolved.
    pub performer_remote_id: Option<String>,
    /// Linked catalog studio id, once resolved.
    pub studio_remote_id: Option<String>,
}

impl Account {
    /// The name the catalog knows this account by.
    pub fn display_or_username(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

// =============================================================================
// Content Items
// =============================================================================

/// Discriminates the two source content tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Post,
    Message,
}

impl ContentKind {
    /// String representation used in vault join tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Post => "post",
            ContentKind::Message => "message",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A post or direct message normalized into one view.
///
/// The engine never distinguishes the two beyond `kind`: posts get a public
/// URL back-reference and a larger batch size, messages do not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: i64,
    pub kind: ContentKind,
    pub account_id: AccountId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Linked catalog gallery id, once resolved. Short-circuits the
    /// title/code/URL gallery lookups on later runs.
    pub gallery_remote_id: Option<String>,
    /// Attachments in stored order.
    pub attachments: Vec<Attachment>,
    /// Accounts mentioned in the content.
    pub mentions: Vec<AccountId>,
    /// Hashtags extracted by the scraper, without the `#`.
    pub hashtags: Vec<String>,
}

impl ContentItem {
    /// Creation date in the catalog's `YYYY-MM-DD` convention.
    pub fn date_string(&self) -> String {
        self.created_at.format("%Y-%m-%d").to_string()
    }
}

/// One attachment slot on a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Position within the item, ascending.
    pub pos: i64,
    pub target: AttachmentTarget,
}

/// What an attachment points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id")]
pub enum AttachmentTarget {
    /// A single media row.
    Media(MediaId),
    /// An ordered collection of media rows.
    Bundle(BundleId),
    /// Another post aggregated into this item; its attachments are
    /// flattened recursively.
    AggregatedPost(i64),
}

// =============================================================================
// Media
// =============================================================================

/// The image-versus-everything-else partition that routes a media row to
/// catalog image or scene resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MimeFamily {
    /// `image/*` MIME types map to catalog images.
    Image,
    /// Everything else maps to catalog scenes.
    Scene,
}

impl MimeFamily {
    /// Classify a MIME type string.
    pub fn of(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            MimeFamily::Image
        } else {
            MimeFamily::Scene
        }
    }
}

/// A lower-resolution or re-encoded rendition of the same logical asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaVariant {
    pub id: MediaId,
    pub mime_type: String,
}

/// A scraped media asset plus its variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub id: MediaId,
    pub mime_type: String,
    /// Local file path when the scraper downloaded the asset.
    pub local_path: Option<String>,
    /// Catalog image/scene id once the engine has matched this media.
    pub remote_link: Option<String>,
    /// Preview/trailer assets get the preview tag instead of counting as
    /// primary content.
    pub is_preview: bool,
    /// Variants in stored order, highest quality first.
    pub variants: Vec<MediaVariant>,
}

impl Media {
    /// MIME family of the primary rendition.
    pub fn mime_family(&self) -> MimeFamily {
        MimeFamily::of(&self.mime_type)
    }

    /// Identifiers usable as path tokens against the catalog's file paths:
    /// the scraper names downloaded files after these ids.
    pub fn path_tokens(&self) -> Vec<String> {
        let mut tokens = Vec::with_capacity(1 + self.variants.len());
        tokens.push(self.id.to_string());
        tokens.extend(self.variants.iter().map(|v| v.id.to_string()));
        tokens
    }
}
