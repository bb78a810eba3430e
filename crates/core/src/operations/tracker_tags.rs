//! Tagging and share limits by tracker.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::config::TrackerRule;
use crate::report::OperationReport;
use crate::torrent_client::{Torrent, TorrentClient, Tracker};

use super::TagPlan;

/// qBittorrent's "use the global limit" value.
const USE_GLOBAL: i64 = -2;

/// Share limits sent in one `set_share_limits` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShareLimits {
    pub ratio: f64,
    /// Seeding time in minutes.
    pub minutes: i64,
}

impl ShareLimits {
    /// Limits of a rule; a missing half falls back to the global limit.
    pub fn from_rule(rule: &TrackerRule) -> Option<Self> {
        if !rule.has_share_limits() {
            return None;
        }
        Some(Self {
            ratio: rule.seed_ratio_limit.unwrap_or(USE_GLOBAL as f64),
            minutes: rule.seed_time_limit.unwrap_or(USE_GLOBAL),
        })
    }
}

/// Distinct limits with the hashes that receive them, in first-seen order.
pub type ShareLimitPlan = Vec<(ShareLimits, Vec<String>)>;

fn tracker_matches(tracker: &Tracker, key: &str) -> bool {
    let key = key.to_lowercase();
    match tracker.host() {
        Some(host) => host.contains(&key),
        None => tracker.url.to_lowercase().contains(&key),
    }
}

/// The first rule matching any tracker of `torrent`, trackers checked in order.
///
/// A rule key matches when it is a case-insensitive substring of the tracker
/// host, or of the whole URL for pseudo-trackers without a host.
pub fn match_rule<'a>(
    torrent: &Torrent,
    rules: &'a BTreeMap<String, TrackerRule>,
) -> Option<(&'a str, &'a TrackerRule)> {
    torrent.trackers.iter().find_map(|tracker| {
        rules
            .iter()
            .find(|(key, _)| tracker_matches(tracker, key))
            .map(|(key, rule)| (key.as_str(), rule))
    })
}

/// Tags to apply by tracker.
pub fn plan_tracker_tags(torrents: &[Torrent], rules: &BTreeMap<String, TrackerRule>) -> TagPlan {
    let mut plan = TagPlan::new();
    for torrent in torrents {
        let Some((key, rule)) = match_rule(torrent, rules) else {
            continue;
        };
        if let Some(tag) = rule.tag.as_deref() {
            debug!("{} matches tracker rule '{}'", torrent.name, key);
            plan.entry(tag.to_string())
                .or_default()
                .push(torrent.hash.clone());
        }
    }
    plan
}

/// Share limits to apply by tracker, grouped by distinct limits.
pub fn plan_share_limits(
    torrents: &[Torrent],
    rules: &BTreeMap<String, TrackerRule>,
) -> ShareLimitPlan {
    let mut plan: ShareLimitPlan = Vec::new();
    for torrent in torrents {
        let Some(limits) = match_rule(torrent, rules).and_then(|(_, rule)| ShareLimits::from_rule(rule))
        else {
            continue;
        };
        match plan.iter_mut().find(|(existing, _)| *existing == limits) {
            Some((_, hashes)) => hashes.push(torrent.hash.clone()),
            None => plan.push((limits, vec![torrent.hash.clone()])),
        }
    }
    plan
}

pub async fn apply_share_limits<C: TorrentClient + ?Sized>(
    client: &C,
    plan: &ShareLimitPlan,
    dry_run: bool,
    report: &mut OperationReport,
) {
    for (limits, hashes) in plan {
        if dry_run {
            info!(
                "[dry run] Would set ratio {} and seeding time {} minutes on {} torrents",
                limits.ratio,
                limits.minutes,
                hashes.len()
            );
            continue;
        }
        let result = client
            .set_share_limits(hashes, limits.ratio, limits.minutes)
            .await;
        if result.is_ok() {
            info!(
                "Set ratio {} and seeding time {} minutes on {} torrents",
                limits.ratio,
                limits.minutes,
                hashes.len()
            );
        }
        report.record_batch("set share limits", hashes.len(), result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockTorrentClient, RecordedCall};
    use crate::torrent_client::TrackerStatus;

    fn rules() -> BTreeMap<String, TrackerRule> {
        BTreeMap::from([
            (
                "aither".to_string(),
                TrackerRule {
                    tag: Some("AITHER".to_string()),
                    seed_time_limit: Some(10000),
                    seed_ratio_limit: None,
                },
            ),
            (
                "blutopia".to_string(),
                TrackerRule {
                    tag: Some("BLU".to_string()),
                    seed_time_limit: None,
                    seed_ratio_limit: Some(1.5),
                },
            ),
            (
                "dht".to_string(),
                TrackerRule {
                    tag: Some("DHT".to_string()),
                    ..Default::default()
                },
            ),
        ])
    }

    fn on_tracker(hash: &str, url: &str) -> Torrent {
        let mut torrent = fixtures::torrent(hash, hash, "/data");
        torrent.trackers = vec![fixtures::tracker(url, TrackerStatus::Working)];
        torrent
    }

    #[test]
    fn test_match_rule_by_host() {
        let rules = rules();
        let torrent = on_tracker("a", "https://AITHER.cc/announce/abc");
        assert_eq!(match_rule(&torrent, &rules).map(|(k, _)| k), Some("aither"));

        // Key in the path only must not match
        let torrent = on_tracker("b", "https://tracker.example/aither/announce");
        assert!(match_rule(&torrent, &rules).is_none());
    }

    #[test]
    fn test_match_rule_falls_back_to_url_for_pseudo_trackers() {
        let rules = rules();
        let torrent = on_tracker("a", "** [DHT] **");
        assert_eq!(match_rule(&torrent, &rules).map(|(k, _)| k), Some("dht"));
    }

    #[test]
    fn test_first_matching_tracker_wins() {
        let mut torrent = fixtures::torrent("a", "a", "/data");
        torrent.trackers = vec![
            fixtures::tracker("https://unknown.example/announce", TrackerStatus::Working),
            fixtures::tracker("https://blutopia.cc/announce", TrackerStatus::Working),
            fixtures::tracker("https://aither.cc/announce", TrackerStatus::Working),
        ];
        assert_eq!(
            match_rule(&torrent, &rules()).map(|(k, _)| k),
            Some("blutopia")
        );
    }

    #[test]
    fn test_plan_tracker_tags_groups_by_tag() {
        let torrents = vec![
            on_tracker("a", "https://aither.cc/a"),
            on_tracker("b", "https://blutopia.cc/a"),
            on_tracker("c", "https://aither.cc/a"),
            on_tracker("d", "https://nowhere.example/a"),
        ];
        let plan = plan_tracker_tags(&torrents, &rules());
        assert_eq!(plan["AITHER"], vec!["a", "c"]);
        assert_eq!(plan["BLU"], vec!["b"]);
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_plan_share_limits_fills_missing_half_with_global() {
        let torrents = vec![
            on_tracker("a", "https://aither.cc/a"),
            on_tracker("b", "https://blutopia.cc/a"),
            on_tracker("c", "https://aither.cc/a"),
            on_tracker("d", "** [DHT] **"),
        ];
        let plan = plan_share_limits(&torrents, &rules());
        assert_eq!(plan.len(), 2);
        assert_eq!(
            plan[0],
            (
                ShareLimits {
                    ratio: -2.0,
                    minutes: 10000
                },
                vec!["a".to_string(), "c".to_string()]
            )
        );
        assert_eq!(
            plan[1].0,
            ShareLimits {
                ratio: 1.5,
                minutes: -2
            }
        );
    }

    #[tokio::test]
    async fn test_apply_share_limits() {
        let client = MockTorrentClient::new();
        let torrents = vec![on_tracker("a", "https://aither.cc/a")];
        let plan = plan_share_limits(&torrents, &rules());
        let mut report = OperationReport::new("seed_limits");

        apply_share_limits(&client, &plan, false, &mut report).await;
        assert_eq!(
            client.mutating_calls().await,
            vec![RecordedCall::SetShareLimits {
                hashes: vec!["a".to_string()],
                ratio_limit: -2.0,
                seeding_time_limit: 10000,
            }]
        );

        client.clear_recorded().await;
        apply_share_limits(&client, &plan, true, &mut report).await;
        assert!(client.mutating_calls().await.is_empty());
        assert_eq!(report.succeeded, 1);
    }
}
