//! Read-only analysis of what a run would change.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::{
    AutoTmmConfig, Config, CrossSeedingConfig, DeletionConfig, ImpactThresholds, TrackerRule,
};
use crate::operations::{
    plan_age_tags, plan_auto_remove, plan_auto_tmm, plan_cross_seed_tags, plan_hardlinks, plan_pause,
    plan_resume, plan_share_limits, plan_tracker_tags, Operation, TagPlan,
};
use crate::torrent_client::{Torrent, TorrentReader};
use crate::unregistered::Classifier;

use super::summary::ImpactSummary;

/// Builds an [`ImpactSummary`] from a snapshot.
///
/// Only needs a [`TorrentReader`], so it cannot mutate the client.
#[derive(Debug, Clone)]
pub struct ImpactAnalyzer {
    classifier: Classifier,
    deletion: DeletionConfig,
    tracker_tags: BTreeMap<String, TrackerRule>,
    cross_seeding: CrossSeedingConfig,
    hardlink_target: Option<PathBuf>,
    auto_tmm: AutoTmmConfig,
    thresholds: ImpactThresholds,
}

impl ImpactAnalyzer {
    pub fn new(config: &Config) -> Self {
        Self {
            classifier: Classifier::from_config(&config.unregistered),
            deletion: config.deletion.clone(),
            tracker_tags: config.tracker_tags.clone(),
            cross_seeding: config.cross_seeding.clone(),
            hardlink_target: config.hardlinks.target_dir.clone(),
            auto_tmm: config.auto_tmm.clone(),
            thresholds: config.impact.clone(),
        }
    }

    /// Analyze the named operations against `torrents`.
    ///
    /// Unknown names are logged and ignored.
    pub async fn analyze<R: TorrentReader + ?Sized, S: AsRef<str>>(
        &self,
        reader: &R,
        torrents: &[Torrent],
        operations: &[S],
    ) -> ImpactSummary {
        self.analyze_at(reader, torrents, operations, Utc::now()).await
    }

    /// [`analyze`](Self::analyze) with a fixed clock for age tagging.
    pub async fn analyze_at<R: TorrentReader + ?Sized, S: AsRef<str>>(
        &self,
        reader: &R,
        torrents: &[Torrent],
        operations: &[S],
        now: DateTime<Utc>,
    ) -> ImpactSummary {
        let mut summary = ImpactSummary::with_thresholds(self.thresholds.clone());

        for operation in Operation::resolve(operations) {
            debug!("Analyzing impact of {}", operation);
            match operation {
                Operation::AutoTmm => match plan_auto_tmm(&self.auto_tmm) {
                    Some(preferences) => summary.set_operation_detail(
                        operation.as_str(),
                        "preferences",
                        preferences,
                    ),
                    None => summary.set_operation_detail(
                        operation.as_str(),
                        "note",
                        "Auto TMM is disabled",
                    ),
                },
                Operation::Unregistered => self.analyze_unregistered(torrents, &mut summary),
                Operation::TagByTracker => {
                    record_tagging(&mut summary, &plan_tracker_tags(torrents, &self.tracker_tags));
                    self.record_share_limits(torrents, &mut summary);
                }
                Operation::SeedLimits => self.record_share_limits(torrents, &mut summary),
                Operation::TagByAge => record_tagging(&mut summary, &plan_age_tags(torrents, now)),
                Operation::TagCrossSeeding => {
                    let plan = plan_cross_seed_tags(reader, torrents, &self.cross_seeding).await;
                    record_tagging(&mut summary, &plan);
                }
                Operation::AutoRemove => {
                    for torrent in plan_auto_remove(torrents) {
                        summary.add_deletion(
                            Operation::AutoRemove.as_str(),
                            &torrent.hash,
                            torrent.size_bytes,
                        );
                    }
                }
                Operation::Pause => {
                    for hash in plan_pause(torrents) {
                        summary.add_pause(&hash);
                    }
                }
                Operation::Resume => {
                    for hash in plan_resume(torrents) {
                        summary.add_resume(&hash);
                    }
                }
                Operation::Hardlinks => {
                    summary.set_operation_detail(
                        operation.as_str(),
                        "torrents_to_link",
                        plan_hardlinks(torrents).len(),
                    );
                    if let Some(target) = &self.hardlink_target {
                        summary.set_operation_detail(
                            operation.as_str(),
                            "target_dir",
                            target.display(),
                        );
                    }
                }
                Operation::Orphaned => summary.set_operation_detail(
                    operation.as_str(),
                    "note",
                    "Orphaned file detection requires a disk scan and is not performed",
                ),
            }
        }

        summary
    }

    fn analyze_unregistered(&self, torrents: &[Torrent], summary: &mut ImpactSummary) {
        let classification = self.classifier.classify(torrents);

        for bucket in classification.buckets() {
            for hash in &bucket.hashes {
                summary.add_tagging(&bucket.tag, hash);
            }
        }
        let op = Operation::Unregistered.as_str();
        summary.set_operation_detail(
            op,
            "unregistered_found",
            classification.unregistered.hashes.len(),
        );
        summary.set_operation_detail(
            op,
            "cross_seeding_found",
            classification.cross_seeded.hashes.len(),
        );
        if let Some(issues) = &classification.issues {
            summary.set_operation_detail(op, "issues_found", issues.hashes.len());
        }

        if !self.deletion.use_delete_tags {
            return;
        }
        // Tags the torrent would carry after tagging: existing plus assigned.
        for torrent in torrents {
            let assigned = classification.tag_for(&torrent.hash);
            let Some(tag) = self
                .deletion
                .matching_tag(|t| torrent.has_tag(t) || assigned == Some(t))
            else {
                continue;
            };
            if summary.is_deleting(&torrent.hash) {
                continue;
            }
            summary.add_deletion(tag, &torrent.hash, torrent.size_bytes);
        }
    }

    fn record_share_limits(&self, torrents: &[Torrent], summary: &mut ImpactSummary) {
        let limited: usize = plan_share_limits(torrents, &self.tracker_tags)
            .iter()
            .map(|(_, hashes)| hashes.len())
            .sum();
        summary.set_operation_detail(
            Operation::SeedLimits.as_str(),
            "torrents_to_limit",
            limited,
        );
    }
}

fn record_tagging(summary: &mut ImpactSummary, plan: &TagPlan) {
    for (tag, hashes) in plan {
        for hash in hashes {
            summary.add_tagging(tag, hash);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockTorrentClient};
    use chrono::TimeZone;

    fn config() -> Config {
        toml::from_str(
            r#"
[qbittorrent]
url = "http://localhost:8080"
username = "admin"

[unregistered]
patterns = ["unregistered torrent"]

[deletion]
use_delete_tags = true
delete_tags = ["unregistered", "old"]
"#,
        )
        .unwrap()
    }

    fn flagged(hash: &str, save_path: &str) -> Torrent {
        let mut torrent = fixtures::torrent(hash, hash, save_path);
        torrent.trackers = vec![fixtures::unregistered_tracker("Unregistered torrent")];
        torrent
    }

    fn healthy(hash: &str, save_path: &str) -> Torrent {
        let mut torrent = fixtures::torrent(hash, hash, save_path);
        torrent.trackers = vec![fixtures::working_tracker()];
        torrent
    }

    #[tokio::test]
    async fn test_unregistered_records_tagging_and_deletion() {
        let client = MockTorrentClient::new();
        let torrents = vec![
            flagged("a", "/data/one"),
            flagged("b", "/data/two"),
            healthy("c", "/data/two"),
        ];

        let summary = ImpactAnalyzer::new(&config())
            .analyze(&client, &torrents, &["unregistered"])
            .await;

        assert_eq!(summary.torrents_to_tag["unregistered"], vec!["a"]);
        assert_eq!(summary.torrents_to_tag["unregistered:crossseeding"], vec!["b"]);
        assert_eq!(summary.torrents_to_delete["unregistered"], vec!["a"]);
        assert_eq!(summary.total_deletions(), 1);
        assert_eq!(summary.disk_to_free_bytes, 100 * 1024 * 1024);
        assert_eq!(
            summary.operation_details["unregistered"]["unregistered_found"],
            "1"
        );
        assert_eq!(
            summary.operation_details["unregistered"]["cross_seeding_found"],
            "1"
        );
    }

    #[tokio::test]
    async fn test_existing_delete_tag_counted_once() {
        let client = MockTorrentClient::new();
        let mut torrent = flagged("a", "/data/one");
        torrent.tags.insert("old".to_string());
        let untouched = fixtures::tagged_torrent("b", "B", "/data/two", &["old"]);

        let summary = ImpactAnalyzer::new(&config())
            .analyze(&client, &[torrent, untouched], &["unregistered"])
            .await;

        assert_eq!(summary.total_deletions(), 2);
        assert_eq!(summary.torrents_to_delete["unregistered"], vec!["a"]);
        assert_eq!(summary.torrents_to_delete["old"], vec!["b"]);
    }

    #[tokio::test]
    async fn test_no_deletions_without_delete_tags() {
        let client = MockTorrentClient::new();
        let mut config = config();
        config.deletion = DeletionConfig::default();

        let summary = ImpactAnalyzer::new(&config)
            .analyze(&client, &[flagged("a", "/data/one")], &["unregistered"])
            .await;

        assert_eq!(summary.total_taggings(), 1);
        assert_eq!(summary.total_deletions(), 0);
    }

    #[tokio::test]
    async fn test_unknown_operation_is_ignored() {
        let client = MockTorrentClient::new();
        let torrents = vec![fixtures::torrent("a", "A", "/d")];

        let summary = ImpactAnalyzer::new(&config())
            .analyze(&client, &torrents, &["defragment", "pause"])
            .await;

        assert_eq!(summary.torrents_to_pause, vec!["a"]);
        assert_eq!(summary.total_torrents_affected(), 1);
    }

    #[tokio::test]
    async fn test_lifecycle_and_age_operations() {
        let client = MockTorrentClient::new();
        let mut old = fixtures::torrent("a", "A", "/d");
        old.added_at = Some(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
        let mut paused = fixtures::torrent("b", "B", "/d");
        paused.state = crate::torrent_client::TorrentState::Paused;
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();

        let summary = ImpactAnalyzer::new(&config())
            .analyze_at(
                &client,
                &[old, paused],
                &["tag_by_age", "auto_remove", "resume", "hardlinks", "orphaned"],
                now,
            )
            .await;

        assert_eq!(summary.torrents_to_tag["6_months_plus"], vec!["a"]);
        assert_eq!(summary.torrents_to_delete["auto_remove"], vec!["a", "b"]);
        assert_eq!(summary.torrents_to_resume, vec!["b"]);
        assert_eq!(summary.operation_details["hardlinks"]["torrents_to_link"], "2");
        assert!(summary.operation_details["orphaned"].contains_key("note"));
    }

    #[tokio::test]
    async fn test_analysis_issues_no_mutations() {
        let client = MockTorrentClient::new();
        let torrents = vec![flagged("a", "/data/one"), healthy("b", "/data/two")];
        for torrent in &torrents {
            client.add_torrent(torrent.clone()).await;
            client
                .set_files(&torrent.hash, vec![fixtures::file("x.mkv", 1)])
                .await;
        }

        let names: Vec<&str> = Operation::ALL.iter().map(|op| op.as_str()).collect();
        ImpactAnalyzer::new(&config())
            .analyze(&client, &torrents, &names)
            .await;

        assert!(client.mutating_calls().await.is_empty());
        assert!(client.has_torrent("a").await);
    }

    #[tokio::test]
    async fn test_auto_tmm_detail_lists_preferences() {
        let client = MockTorrentClient::new();
        let mut config = config();
        let analyzer = ImpactAnalyzer::new(&config);

        let summary = analyzer.analyze(&client, &[], &["auto_tmm"]).await;
        assert_eq!(
            summary.operation_details["auto_tmm"]["note"],
            "Auto TMM is disabled"
        );

        config.auto_tmm.enabled = true;
        config.auto_tmm.category_changed = Some(true);
        let summary = ImpactAnalyzer::new(&config)
            .analyze(&client, &[], &["auto_tmm"])
            .await;
        assert_eq!(
            summary.operation_details["auto_tmm"]["preferences"],
            r#"{"auto_tmm_enabled":true,"category_changed_tmm_enabled":true}"#
        );
        assert!(client.mutating_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_thresholds_come_from_config() {
        let client = MockTorrentClient::new();
        let mut config = config();
        config.impact = ImpactThresholds {
            max_deletions: 0,
            ..Default::default()
        };

        let summary = ImpactAnalyzer::new(&config)
            .analyze(&client, &[flagged("a", "/data/one")], &["unregistered"])
            .await;

        assert_eq!(summary.warnings().len(), 1);
    }
}
