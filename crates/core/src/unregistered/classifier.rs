//! Save-path aware classification of unregistered torrents.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::UnregisteredConfig;
use crate::report::OperationReport;
use crate::torrent_client::{Torrent, TorrentClient};

use super::PatternSet;

/// Torrents sharing one save path.
///
/// Built during the counting pass and only read once every torrent has been
/// seen; the decision for a path depends on its final totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SavePathGroup {
    pub total: usize,
    pub flagged: usize,
    pub flagged_hashes: Vec<String>,
}

impl SavePathGroup {
    /// Every torrent at this path is unregistered.
    pub fn is_wholly_unregistered(&self) -> bool {
        self.flagged > 0 && self.flagged == self.total
    }
}

/// Hashes destined for one tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagBucket {
    pub tag: String,
    pub hashes: Vec<String>,
}

impl TagBucket {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            hashes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.iter().any(|h| h == hash)
    }
}

/// Result of classifying one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    /// Delete-eligible: every torrent at the save path is unregistered.
    pub unregistered: TagBucket,
    /// Tag-only: the save path is shared with a healthy torrent.
    pub cross_seeded: TagBucket,
    /// Failing trackers that are not unregistered, when an issues tag is configured.
    pub issues: Option<TagBucket>,
    pub groups: BTreeMap<String, SavePathGroup>,
}

impl Classification {
    /// Non-empty buckets in tagging order.
    pub fn buckets(&self) -> impl Iterator<Item = &TagBucket> {
        [Some(&self.unregistered), Some(&self.cross_seeded), self.issues.as_ref()]
            .into_iter()
            .flatten()
            .filter(|bucket| !bucket.is_empty())
    }

    /// Tag a torrent was assigned, if any.
    pub fn tag_for(&self, hash: &str) -> Option<&str> {
        self.buckets()
            .find(|bucket| bucket.contains(hash))
            .map(|bucket| bucket.tag.as_str())
    }

    pub fn flagged_count(&self) -> usize {
        self.unregistered.hashes.len() + self.cross_seeded.hashes.len()
    }
}

/// Classifies torrents by their unregistered tracker hits.
#[derive(Debug, Clone)]
pub struct Classifier {
    patterns: PatternSet,
    default_tag: String,
    cross_seed_tag: String,
    other_issues_tag: Option<String>,
}

impl Classifier {
    pub fn new(
        patterns: PatternSet,
        default_tag: impl Into<String>,
        cross_seed_tag: impl Into<String>,
    ) -> Self {
        Self {
            patterns,
            default_tag: default_tag.into(),
            cross_seed_tag: cross_seed_tag.into(),
            other_issues_tag: None,
        }
    }

    pub fn with_issues_tag(mut self, tag: impl Into<String>) -> Self {
        self.other_issues_tag = Some(tag.into());
        self
    }

    pub fn from_config(config: &UnregisteredConfig) -> Self {
        let classifier = Self::new(
            PatternSet::compile(&config.patterns),
            &config.default_tag,
            &config.cross_seed_tag,
        );
        match &config.other_issues_tag {
            Some(tag) => classifier.with_issues_tag(tag),
            None => classifier,
        }
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// Number of unregistered tracker hits of one torrent.
    pub fn unregistered_hits(&self, torrent: &Torrent) -> usize {
        torrent
            .trackers
            .iter()
            .filter(|tracker| self.patterns.is_unregistered(tracker))
            .inspect(|tracker| {
                info!(
                    "{} {} {}",
                    torrent.name,
                    tracker.message,
                    tracker.host().unwrap_or_else(|| tracker.url.clone())
                )
            })
            .count()
    }

    /// Classify a snapshot whose trackers are attached.
    ///
    /// Pass one counts hits for every torrent and builds the save-path groups.
    /// Pass two decides each group from its final totals. Torrents without a
    /// save path belong to no group; when flagged they are treated as
    /// cross-seeded because their sharing cannot be ruled out.
    pub fn classify(&self, torrents: &[Torrent]) -> Classification {
        let mut groups: BTreeMap<String, SavePathGroup> = BTreeMap::new();
        let mut pathless_flagged = Vec::new();
        let mut issues = self.other_issues_tag.as_deref().map(TagBucket::new);

        for torrent in torrents {
            let flagged = self.unregistered_hits(torrent) > 0;

            match torrent.save_path.as_deref() {
                Some(save_path) => {
                    let group = groups.entry(save_path.to_string()).or_default();
                    group.total += 1;
                    if flagged {
                        group.flagged += 1;
                        group.flagged_hashes.push(torrent.hash.clone());
                    }
                }
                None if flagged => {
                    debug!("{} has no save path, treating as cross-seeded", torrent.name);
                    pathless_flagged.push(torrent.hash.clone());
                }
                None => {}
            }

            if let Some(bucket) = issues.as_mut() {
                if !flagged && torrent.trackers.iter().any(|t| self.patterns.is_other_issue(t)) {
                    bucket.hashes.push(torrent.hash.clone());
                }
            }
        }

        let mut unregistered = TagBucket::new(&self.default_tag);
        let mut cross_seeded = TagBucket::new(&self.cross_seed_tag);

        for (save_path, group) in &groups {
            if group.flagged == 0 {
                continue;
            }
            if group.is_wholly_unregistered() {
                unregistered.hashes.extend(group.flagged_hashes.iter().cloned());
            } else {
                debug!(
                    "{} of {} torrents in {} are unregistered, tagging as cross-seeded",
                    group.flagged, group.total, save_path
                );
                cross_seeded.hashes.extend(group.flagged_hashes.iter().cloned());
            }
        }
        cross_seeded.hashes.extend(pathless_flagged);

        Classification {
            unregistered,
            cross_seeded,
            issues,
            groups,
        }
    }
}

/// Apply the classification with one batched call per non-empty bucket.
pub async fn apply_tags<C: TorrentClient + ?Sized>(
    client: &C,
    classification: &Classification,
    dry_run: bool,
    report: &mut OperationReport,
) {
    for bucket in classification.buckets() {
        if dry_run {
            info!(
                "[dry run] Would tag {} torrents with '{}'",
                bucket.hashes.len(),
                bucket.tag
            );
            continue;
        }

        let result = client
            .add_tags(&bucket.hashes, std::slice::from_ref(&bucket.tag))
            .await;
        if result.is_ok() {
            info!("Tagged {} torrents with '{}'", bucket.hashes.len(), bucket.tag);
        }
        report.record_batch(&format!("tag '{}'", bucket.tag), bucket.hashes.len(), result);
    }
}
