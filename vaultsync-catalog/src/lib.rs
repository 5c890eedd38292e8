//! # vaultsync-catalog
//!
//! Client layer for the remote media-catalog service: the object graph
//! types, query filters, the [`CatalogClient`] protocol trait with its HTTP
//! implementation, a memoizing read cache, and job update streams.
//!
//! ## Usage
//!
//! ```ignore
//! use vaultsync_catalog::{CachedCatalog, CatalogClient, HttpCatalogClient};
//!
//! let client = HttpCatalogClient::new("http://localhost:9999/graphql", None);
//! let catalog = CachedCatalog::new(client);
//! let studios = catalog.find_studios("Fansly (network)").await?;
//! ```

pub mod cache;
pub mod client;
pub mod error;
pub mod filters;
pub mod subscription;
pub mod types;

pub use cache::{CachedCatalog, DEFAULT_CACHE_CAPACITY};
pub use client::{CatalogClient, HttpCatalogClient};
pub use error::{CatalogError, Result};
pub use filters::{
    CriterionModifier, FindFilter, GalleryFilter, PathFilter, SortDirection, StringCriterion,
};
pub use subscription::{JobStatusSource, JobUpdate, JobUpdates, PollingJobUpdates};
pub use types::{
    Chapter, ChapterCreateInput, FileInfo, Gallery, GalleryCreateInput, GalleryUpdateInput, IdRef,
    Image, ImageUpdateInput, Job, JobStatus, Performer, PerformerCreateInput, PerformerUpdateInput,
    Scene, SceneUpdateInput, Studio, StudioCreateInput, StudioUpdateInput, Tag,
};
