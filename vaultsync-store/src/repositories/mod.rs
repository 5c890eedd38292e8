//! Repository traits and SQLite implementations for vault access.
//!
//! Traits are the seams the engine mocks in tests; the Sqlite types are the
//! production implementations.

mod accounts;
mod content;
mod media;

pub use accounts::{AccountRepository, SqliteAccountRepository};
pub use content::{ContentRepository, SqliteContentRepository};
pub use media::{MediaRepository, SqliteMediaRepository};
