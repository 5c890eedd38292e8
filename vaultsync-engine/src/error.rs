//! Engine error types
//!
//! Per-item failures never surface through these variants; the batch
//! scheduler catches them at the item boundary and logs them. What reaches
//! the caller is the fatal class: missing preconditions, storage failures,
//! invalid run transitions and cancellation.

use thiserror::Error;
use vaultsync_catalog::CatalogError;
use vaultsync_store::StoreError;

/// Errors raised by the synchronization engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Vault database failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Catalog protocol failure.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// The fixed top-level studio does not exist on the catalog service.
    /// Nothing can be nested without it, so the run aborts.
    #[error("Top-level studio not found for query {query:?}")]
    MissingNetworkStudio { query: String },

    /// The requested account is not in the vault.
    #[error("Account {account_id} not found")]
    AccountNotFound { account_id: i64 },

    /// A sync run is already active for this account.
    #[error("Sync already in progress for account {account_id}")]
    SyncInProgress { account_id: i64 },

    /// A run id that does not parse as a UUID.
    #[error("Invalid run id: {0}")]
    InvalidRunId(String),

    /// No run with this id is known to the orchestrator.
    #[error("Run {run_id} not found")]
    RunNotFound { run_id: String },

    /// Invalid run state transition.
    #[error("Invalid run transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    /// The run was cancelled.
    #[error("Sync run cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SyncError>;
