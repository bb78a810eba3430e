//! Deletion of tagged torrents, gated by the cross-seed safety check.

mod executor;
mod safety;

pub use executor::{DeletionExecutor, DeletionReport};
pub use safety::{canonical_path, CrossSeedCheck, CrossSeedChecker, SafetyError};
