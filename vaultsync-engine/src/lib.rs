//! # VaultSync Engine
//!
//! Synchronizes scraped creator content from a local SQLite vault into a
//! remote media catalog. Accounts become performers and studios, content
//! items become galleries over the catalog's images and scenes, and every
//! operation is find-before-create so reruns converge instead of
//! duplicating.
//!
//! ## Architecture
//!
//! - [`resolvers`]: idempotent find-or-create for performers, studios
//!   and tags, with remote ids written back to the vault
//! - [`media`]: maps vault media rows to catalog images and scenes
//! - [`merge`]: earliest-item-wins annotation of catalog objects
//! - [`gallery`]: flattens attachments and assembles one gallery per item
//! - [`batch`]: bounded-concurrency batch dispatch of content items
//! - [`job_waiter`]: waits on catalog background jobs with a polling
//!   fallback
//! - [`orchestrator`]: run lifecycle, phase ordering, cancellation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vaultsync_catalog::{CachedCatalog, HttpCatalogClient, PollingJobUpdates};
//! use vaultsync_engine::orchestrator::{SyncOptions, SyncOrchestrator};
//! use vaultsync_runtime::config::RuntimeConfig;
//! use vaultsync_runtime::events::EventBus;
//! use vaultsync_store::{
//!     create_pool, DatabaseConfig, SqliteAccountRepository, SqliteContentRepository,
//!     SqliteMediaRepository,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RuntimeConfig::builder()
//!     .catalog_endpoint("http://localhost:9999/graphql")
//!     .database_path("/var/lib/vault/vault.db")
//!     .build()?;
//!
//! let pool = create_pool(DatabaseConfig::new(&config.database_path)).await?;
//! let http = Arc::new(HttpCatalogClient::new(
//!     &config.catalog_endpoint,
//!     config.api_key.clone(),
//! ));
//! let catalog = Arc::new(CachedCatalog::new(Arc::clone(&http)));
//! let updates = Arc::new(PollingJobUpdates::new(http));
//!
//! let orchestrator = SyncOrchestrator::new(
//!     config,
//!     Arc::new(SqliteAccountRepository::new(pool.clone())),
//!     Arc::new(SqliteContentRepository::new(pool.clone())),
//!     Arc::new(SqliteMediaRepository::new(pool)),
//!     catalog,
//!     updates,
//!     Arc::new(EventBus::default()),
//! );
//!
//! let run_id = orchestrator.start_sync(1, SyncOptions::default()).await?;
//! println!("started run {run_id}");
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod error;
pub mod gallery;
pub mod job_waiter;
pub mod media;
pub mod merge;
pub mod orchestrator;
pub mod resolvers;
pub mod run;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchContext, BatchScheduler, BatchStats, ItemProcessor};
pub use error::{Result, SyncError};
pub use gallery::{AssemblyReport, GalleryAssembler};
pub use job_waiter::JobWaiter;
pub use media::{MediaResolver, ResolvedVisual};
pub use merge::{MergePolicy, MergeTarget};
pub use orchestrator::{SyncOptions, SyncOrchestrator};
pub use resolvers::{
    PerformerResolver, StudioResolver, TagResolver, NETWORK_STUDIO_QUERY, PREVIEW_TAG,
};
pub use run::{RunId, RunProgress, RunStatus, SyncRun};
