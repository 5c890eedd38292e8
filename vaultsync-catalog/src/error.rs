//! Catalog protocol error types
//!
//! Not-found is never an error here: lookup operations return `Ok(None)`
//! or an empty list. The variants below cover transport failures, API
//! rejections and the duplicate-name race, which callers recover from by
//! re-querying once.

use thiserror::Error;

/// Errors raised by the catalog protocol layer.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Network-level failure talking to the endpoint.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success HTTP status.
    #[error("Catalog API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// A create call raced with a concurrent writer; the named entity
    /// already exists on the remote side.
    #[error("Entity already exists: {name}")]
    AlreadyExists { name: String },

    /// The endpoint accepted the operation but reported an error payload.
    #[error("Catalog operation failed: {0}")]
    Operation(String),

    /// Response body did not match the expected shape.
    #[error("Failed to parse catalog response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        CatalogError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
