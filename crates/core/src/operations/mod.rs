//! Maintenance operations.
//!
//! Each operation is split into a read-only plan, shared by the impact
//! analyzer, and an apply step that issues batched client calls.

mod age;
mod auto_tmm;
mod cross_seed_tags;
mod hardlinks;
mod lifecycle;
mod tracker_tags;

pub use age::{age_tag, plan_age_tags};
pub use auto_tmm::{apply_auto_tmm, plan_auto_tmm};
pub use cross_seed_tags::plan_cross_seed_tags;
pub use hardlinks::{create_hardlinks, plan_hardlinks, HardlinkReport};
pub use lifecycle::{
    apply_auto_remove, apply_pause, apply_resume, plan_auto_remove, plan_pause, plan_resume,
};
pub use tracker_tags::{
    apply_share_limits, match_rule, plan_share_limits, plan_tracker_tags, ShareLimitPlan,
    ShareLimits,
};

use std::collections::BTreeMap;
use std::fmt;

use tracing::{info, warn};

use crate::report::OperationReport;
use crate::torrent_client::TorrentClient;

/// Tag to the hashes that should receive it.
pub type TagPlan = BTreeMap<String, Vec<String>>;

/// A selectable maintenance operation.
///
/// Variants are declared in live run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    AutoTmm,
    TagByTracker,
    SeedLimits,
    TagByAge,
    TagCrossSeeding,
    Unregistered,
    AutoRemove,
    Pause,
    Resume,
    Hardlinks,
    Orphaned,
}

impl Operation {
    pub const ALL: [Operation; 11] = [
        Operation::AutoTmm,
        Operation::TagByTracker,
        Operation::SeedLimits,
        Operation::TagByAge,
        Operation::TagCrossSeeding,
        Operation::Unregistered,
        Operation::AutoRemove,
        Operation::Pause,
        Operation::Resume,
        Operation::Hardlinks,
        Operation::Orphaned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::AutoTmm => "auto_tmm",
            Operation::TagByTracker => "tag_by_tracker",
            Operation::SeedLimits => "seed_limits",
            Operation::TagByAge => "tag_by_age",
            Operation::TagCrossSeeding => "tag_cross_seeding",
            Operation::Unregistered => "unregistered",
            Operation::AutoRemove => "auto_remove",
            Operation::Pause => "pause",
            Operation::Resume => "resume",
            Operation::Hardlinks => "hardlinks",
            Operation::Orphaned => "orphaned",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }

    /// Parse names into run order, dropping duplicates.
    ///
    /// Unknown names are logged and ignored.
    pub fn resolve<S: AsRef<str>>(names: &[S]) -> Vec<Operation> {
        let mut operations: Vec<Operation> = names
            .iter()
            .filter_map(|name| {
                let parsed = Self::parse(name.as_ref());
                if parsed.is_none() {
                    warn!("Unknown operation '{}', ignoring", name.as_ref());
                }
                parsed
            })
            .collect();
        operations.sort();
        operations.dedup();
        operations
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Apply a tag plan with one `add_tags` call per tag.
pub async fn apply_tag_plan<C: TorrentClient + ?Sized>(
    client: &C,
    plan: &TagPlan,
    dry_run: bool,
    report: &mut OperationReport,
) {
    for (tag, hashes) in plan {
        if hashes.is_empty() {
            continue;
        }
        if dry_run {
            info!("[dry run] Would tag {} torrents with '{}'", hashes.len(), tag);
            continue;
        }
        let result = client.add_tags(hashes, std::slice::from_ref(tag)).await;
        if result.is_ok() {
            info!("Tagged {} torrents with '{}'", hashes.len(), tag);
        }
        report.record_batch(&format!("tag '{}'", tag), hashes.len(), result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockTorrentClient, RecordedCall};

    #[test]
    fn test_parse_round_trips_names() {
        for op in Operation::ALL {
            assert_eq!(Operation::parse(op.as_str()), Some(op));
        }
        assert_eq!(Operation::parse("defrag"), None);
    }

    #[test]
    fn test_resolve_orders_and_dedups() {
        let ops = Operation::resolve(&[
            "resume",
            "unregistered",
            "bogus",
            "tag_by_tracker",
            "auto_tmm",
            "resume",
        ]);
        assert_eq!(
            ops,
            vec![
                Operation::AutoTmm,
                Operation::TagByTracker,
                Operation::Unregistered,
                Operation::Resume
            ]
        );
    }

    #[tokio::test]
    async fn test_apply_tag_plan_batches() {
        let client = MockTorrentClient::new();
        client.add_torrent(fixtures::torrent("a", "A", "/d")).await;
        client.add_torrent(fixtures::torrent("b", "B", "/d")).await;
        let mut plan = TagPlan::new();
        plan.insert("AITHER".to_string(), vec!["a".to_string(), "b".to_string()]);
        plan.insert("empty".to_string(), Vec::new());
        let mut report = OperationReport::new("tag_by_tracker");

        apply_tag_plan(&client, &plan, false, &mut report).await;

        assert_eq!(
            client.mutating_calls().await,
            vec![RecordedCall::AddTags {
                hashes: vec!["a".to_string(), "b".to_string()],
                tags: vec!["AITHER".to_string()],
            }]
        );
        assert_eq!(report.succeeded, 2);
    }
}
