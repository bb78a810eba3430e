//! Recycle bin quarantine.
//!
//! Files are moved instead of deleted, organised by deletion reason and
//! torrent category, keeping their full original path so they can be restored.

mod error;
mod mover;
mod types;

pub use error::QuarantineError;
pub use mover::{sanitize_category, QuarantineMover};
pub use types::{DeletionType, QuarantineFailure, QuarantineReport};
