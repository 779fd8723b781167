//! Flat-file JSON store for users and magic links.

mod normalize;
mod repo;
mod types;

pub(crate) use normalize::DEFAULT_REDIRECT;
pub use repo::{ConsumeOutcome, FileStore, StoreError, StoreResult};
pub use types::{normalize_email, Document, MagicLink, MagicLinkMetadata, MagicLinkPurpose, User};
