//! Idempotent find-or-create resolvers for catalog entities
//!
//! Each resolver maps a vault entity to exactly one catalog object. Linked
//! remote ids on the vault row are the canonical existence check, so an id
//! lookup always runs before a name lookup; resolved ids are written back
//! to the vault so later runs skip the name path entirely.

mod performer;
mod studio;
mod tag;

pub use performer::PerformerResolver;
pub use studio::{StudioResolver, NETWORK_STUDIO_QUERY};
pub use tag::{TagResolver, PREVIEW_TAG};

/// Public profile URL for an account.
pub(crate) fn profile_url(username: &str) -> String {
    format!("https://fansly.com/{}", username)
}
