//! Tracker message pattern matching.

use std::collections::{BTreeSet, HashSet};

use tracing::warn;

use crate::torrent_client::{Tracker, TrackerStatus};

/// Marker for patterns that match by prefix.
pub const PREFIX_MARKER: &str = "starts_with:";

/// Message qBittorrent reports for private torrents that are not otherwise broken.
const PRIVATE_TORRENT_MESSAGE: &str = "this torrent is private";

/// Compiled unregistered patterns.
///
/// Both collections are lowercased. Exact patterns are compared for equality
/// only, never as substrings.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    exact: HashSet<String>,
    prefix: BTreeSet<String>,
}

impl PatternSet {
    /// Compile configured patterns.
    ///
    /// A `starts_with:` pattern with nothing after the marker would match
    /// every message; it is skipped with a warning.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut set = Self::default();

        for pattern in patterns {
            let lowered = pattern.as_ref().to_lowercase();
            match lowered.strip_prefix(PREFIX_MARKER) {
                Some(rest) => {
                    let rest = rest.trim();
                    if rest.is_empty() {
                        warn!(
                            "Ignoring empty prefix pattern '{}', it would match every message",
                            pattern.as_ref()
                        );
                        continue;
                    }
                    set.prefix.insert(rest.to_string());
                }
                None => {
                    set.exact.insert(lowered);
                }
            }
        }

        set
    }

    /// Whether `message` matches an exact or prefix pattern (case-insensitive).
    pub fn matches(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        if self.exact.contains(&message) {
            return true;
        }
        self.prefix.iter().any(|p| message.starts_with(p.as_str()))
    }

    /// A tracker counts as unregistered only when it is not working AND its
    /// message matches.
    pub fn is_unregistered(&self, tracker: &Tracker) -> bool {
        tracker.status == TrackerStatus::NotWorking && self.matches(&tracker.message)
    }

    /// A failing tracker whose message is not an unregistered one.
    pub fn is_other_issue(&self, tracker: &Tracker) -> bool {
        tracker.status == TrackerStatus::NotWorking
            && !self.matches(&tracker.message)
            && tracker.message.to_lowercase() != PRIVATE_TORRENT_MESSAGE
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefix.is_empty()
    }

    pub fn exact_count(&self) -> usize {
        self.exact.len()
    }

    pub fn prefix_count(&self) -> usize {
        self.prefix.len()
    }
}
