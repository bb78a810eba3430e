//! Unregistered torrent detection.
//!
//! Tracker messages are matched against configured patterns, then torrents
//! are classified per save path: a path where every torrent is unregistered
//! is delete-eligible, a path shared with a healthy torrent is tag-only.

mod classifier;
mod patterns;

pub use classifier::{apply_tags, Classification, Classifier, SavePathGroup, TagBucket};
pub use patterns::{PatternSet, PREFIX_MARKER};
