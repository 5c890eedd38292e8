//! # Runtime Configuration
//!
//! Validated configuration for the sync engine, built once at process start
//! by the embedding CLI and passed down through construction. The builder
//! fails fast: a missing catalog endpoint or an out-of-range concurrency
//! bound is rejected before anything connects.
//!
//! ## Usage
//!
//! ```rust
//! use vaultsync_runtime::config::RuntimeConfig;
//!
//! let config = RuntimeConfig::builder()
//!     .catalog_endpoint("http://localhost:9999/graphql")
//!     .api_key("secret")
//!     .database_path("/var/lib/vault/vault.db")
//!     .build()
//!     .expect("invalid configuration");
//!
//! assert_eq!(config.max_concurrent_items, 2);
//! ```

use crate::error::{Result, RuntimeError};
use std::path::PathBuf;

/// Lowest permitted assembler concurrency.
pub const MIN_CONCURRENT_ITEMS: usize = 1;

/// Highest permitted assembler concurrency; the remote service is
/// rate-sensitive and degrades beyond this.
pub const MAX_CONCURRENT_ITEMS: usize = 4;

/// Runtime configuration for a VaultSync process.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Remote catalog query/mutation endpoint.
    pub catalog_endpoint: String,

    /// API key sent with every catalog request, when the service requires one.
    pub api_key: Option<String>,

    /// Path to the scraper-owned SQLite vault.
    pub database_path: PathBuf,

    /// Maximum concurrent gallery-assembler invocations.
    pub max_concurrent_items: usize,

    /// Batch size for post synchronization.
    pub post_batch_size: usize,

    /// Batch size for message synchronization.
    pub message_batch_size: usize,

    /// Budget for waiting on remote background jobs, in seconds.
    pub job_wait_timeout_secs: u64,

    /// Read-cache capacity per keyspace.
    pub cache_capacity: usize,

    /// Event bus buffer size.
    pub event_buffer_size: usize,
}

impl RuntimeConfig {
    /// Start building a configuration.
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }
}

/// Builder for [`RuntimeConfig`] with fail-fast validation.
#[derive(Debug, Default)]
pub struct RuntimeConfigBuilder {
    catalog_endpoint: Option<String>,
    api_key: Option<String>,
    database_path: Option<PathBuf>,
    max_concurrent_items: Option<usize>,
    post_batch_size: Option<usize>,
    message_batch_size: Option<usize>,
    job_wait_timeout_secs: Option<u64>,
    cache_capacity: Option<usize>,
    event_buffer_size: Option<usize>,
}

impl RuntimeConfigBuilder {
    /// Set the catalog endpoint (required).
    pub fn catalog_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.catalog_endpoint = Some(endpoint.into());
        self
    }

    /// Set the catalog API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the vault database path (required).
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Set the assembler concurrency bound.
    pub fn max_concurrent_items(mut self, n: usize) -> Self {
        self.max_concurrent_items = Some(n);
        self
    }

    /// Set the post batch size.
    pub fn post_batch_size(mut self, n: usize) -> Self {
        self.post_batch_size = Some(n);
        self
    }

    /// Set the message batch size.
    pub fn message_batch_size(mut self, n: usize) -> Self {
        self.message_batch_size = Some(n);
        self
    }

    /// Set the job wait timeout in seconds.
    pub fn job_wait_timeout_secs(mut self, secs: u64) -> Self {
        self.job_wait_timeout_secs = Some(secs);
        self
    }

    /// Set the read-cache capacity per keyspace.
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    /// Set the event bus buffer size.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidConfig`] when a required field is
    /// missing or a bound is out of range.
    pub fn build(self) -> Result<RuntimeConfig> {
        let catalog_endpoint = self
            .catalog_endpoint
            .filter(|e| !e.is_empty())
            .ok_or_else(|| RuntimeError::InvalidConfig {
                field: "catalog_endpoint".to_string(),
                message: "a catalog endpoint URL is required".to_string(),
            })?;

        if !catalog_endpoint.starts_with("http://") && !catalog_endpoint.starts_with("https://") {
            return Err(RuntimeError::InvalidConfig {
                field: "catalog_endpoint".to_string(),
                message: format!("not an http(s) URL: {}", catalog_endpoint),
            });
        }

        let database_path = self
            .database_path
            .ok_or_else(|| RuntimeError::InvalidConfig {
                field: "database_path".to_string(),
                message: "a vault database path is required".to_string(),
            })?;

        let max_concurrent_items = self.max_concurrent_items.unwrap_or(2);
        if !(MIN_CONCURRENT_ITEMS..=MAX_CONCURRENT_ITEMS).contains(&max_concurrent_items) {
            return Err(RuntimeError::InvalidConfig {
                field: "max_concurrent_items".to_string(),
                message: format!(
                    "must be between {} and {}, got {}",
                    MIN_CONCURRENT_ITEMS, MAX_CONCURRENT_ITEMS, max_concurrent_items
                ),
            });
        }

        let post_batch_size = self.post_batch_size.unwrap_or(50);
        let message_batch_size = self.message_batch_size.unwrap_or(25);
        if post_batch_size == 0 || message_batch_size == 0 {
            return Err(RuntimeError::InvalidConfig {
                field: "batch_size".to_string(),
                message: "batch sizes must be non-zero".to_string(),
            });
        }

        Ok(RuntimeConfig {
            catalog_endpoint,
            api_key: self.api_key,
            database_path,
            max_concurrent_items,
            post_batch_size,
            message_batch_size,
            job_wait_timeout_secs: self.job_wait_timeout_secs.unwrap_or(300),
            cache_capacity: self.cache_capacity.unwrap_or(512),
            event_buffer_size: self.event_buffer_size.unwrap_or(100),
        })
    }
}
