//! # VaultSync Store
//!
//! Read access to the scraper-owned SQLite vault of creator content.
//!
//! ## Overview
//!
//! The vault holds accounts, posts, direct messages, attachments and media
//! rows written by the scraper. This crate treats it as read-only with one
//! exception: the remote-catalog link columns (`performer_remote_id` and
//! `studio_remote_id` on `accounts`, `gallery_remote_id` on `posts` and
//! `messages`, `remote_link` on `media`) are written back by the sync
//! engine and serve as the canonical existence check on later runs.
//!
//! ## Components
//!
//! - **Models** (`models`): Typed entities and the `ContentItem` view that
//!   normalizes posts and messages
//! - **Pool** (`db`): SQLite connection pooling (WAL, foreign keys) and the
//!   in-memory test helper
//! - **Repositories** (`repositories`): Trait-based data access with Sqlite
//!   implementations

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use db::{create_pool, create_test_pool, initialize_schema, DatabaseConfig};
pub use error::{Result, StoreError};
pub use models::{
    Account, AccountId, Attachment, AttachmentTarget, BundleId, ContentItem, ContentKind, Media,
    MediaId, MediaVariant, MimeFamily,
};
pub use repositories::{
    AccountRepository, ContentRepository, MediaRepository, SqliteAccountRepository,
    SqliteContentRepository, SqliteMediaRepository,
};
