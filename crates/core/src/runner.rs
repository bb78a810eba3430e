//! One maintenance run over a fresh torrent snapshot.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::deletion::{DeletionExecutor, DeletionReport};
use crate::impact::{ImpactAnalyzer, ImpactSummary};
use crate::operations::{
    apply_auto_remove, apply_auto_tmm, apply_pause, apply_resume, apply_share_limits, apply_tag_plan,
    create_hardlinks, plan_age_tags, plan_auto_remove, plan_cross_seed_tags, plan_hardlinks,
    plan_auto_tmm, plan_pause, plan_resume, plan_share_limits, plan_tracker_tags, Operation,
};
use crate::report::{OperationReport, RunReport};
use crate::torrent_client::{
    load_snapshot, CachedClient, Torrent, TorrentClient, TorrentClientError, TorrentReader,
};
use crate::unregistered::{apply_tags, Classifier};

/// Result of [`MaintenanceRunner::run`].
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Dry run: what would change.
    Preview(ImpactSummary),
    /// Live run: what was done.
    Applied(RunReport),
}

/// Runs the selected operations against a torrent client.
///
/// Every run builds its own response cache and snapshot; nothing is carried
/// over between runs.
pub struct MaintenanceRunner {
    client: Arc<dyn TorrentClient>,
    config: Config,
}

impl MaintenanceRunner {
    pub fn new(client: Arc<dyn TorrentClient>, config: Config) -> Self {
        Self { client, config }
    }

    /// Run `operations` (by name) once.
    ///
    /// `dry_run` is combined with the configured `dry_run`. Fails only when the
    /// torrent list cannot be fetched.
    pub async fn run<S: AsRef<str>>(
        &self,
        operations: &[S],
        dry_run: bool,
    ) -> Result<RunOutcome, TorrentClientError> {
        let dry_run = dry_run || self.config.dry_run;
        let client = CachedClient::new(
            Arc::clone(&self.client),
            Duration::from_secs(self.config.cache.ttl_secs),
        );

        let torrents = load_snapshot(&client).await?;
        info!(
            "Loaded {} torrents from {}",
            torrents.len(),
            self.client.name()
        );

        let outcome = if dry_run {
            info!("Dry run: analyzing impact only, no changes will be made");
            let summary = ImpactAnalyzer::new(&self.config)
                .analyze(&client, &torrents, operations)
                .await;
            RunOutcome::Preview(summary)
        } else {
            RunOutcome::Applied(self.apply(&client, torrents, operations).await?)
        };

        debug!(
            "Cache: {} hits, {} misses",
            client.hits(),
            client.misses()
        );
        Ok(outcome)
    }

    async fn apply<S: AsRef<str>>(
        &self,
        client: &CachedClient,
        mut torrents: Vec<Torrent>,
        operations: &[S],
    ) -> Result<RunReport, TorrentClientError> {
        let mut run = RunReport::default();
        // Set after deletions, so later operations do not act on removed torrents.
        let mut stale = false;

        for operation in Operation::resolve(operations) {
            if stale {
                torrents = load_snapshot(client).await?;
                stale = false;
            }
            info!("Running {}", operation);
            let mut report = OperationReport::new(operation.as_str());

            match operation {
                Operation::AutoTmm => match plan_auto_tmm(&self.config.auto_tmm) {
                    Some(preferences) => {
                        apply_auto_tmm(client, &preferences, false, &mut report).await;
                    }
                    None => {
                        info!("Auto TMM is disabled, skipping");
                        report.note("auto_tmm disabled");
                    }
                },
                Operation::TagByTracker => {
                    let plan = plan_tracker_tags(&torrents, &self.config.tracker_tags);
                    apply_tag_plan(client, &plan, false, &mut report).await;
                    let limits = plan_share_limits(&torrents, &self.config.tracker_tags);
                    apply_share_limits(client, &limits, false, &mut report).await;
                }
                Operation::SeedLimits => {
                    let limits = plan_share_limits(&torrents, &self.config.tracker_tags);
                    apply_share_limits(client, &limits, false, &mut report).await;
                }
                Operation::TagByAge => {
                    let plan = plan_age_tags(&torrents, Utc::now());
                    apply_tag_plan(client, &plan, false, &mut report).await;
                }
                Operation::TagCrossSeeding => {
                    let plan =
                        plan_cross_seed_tags(client, &torrents, &self.config.cross_seeding).await;
                    apply_tag_plan(client, &plan, false, &mut report).await;
                }
                Operation::Unregistered => {
                    stale = self
                        .unregistered(client, &torrents, &mut report, &mut run)
                        .await;
                }
                Operation::AutoRemove => {
                    let removable = plan_auto_remove(&torrents);
                    apply_auto_remove(client, &removable, false, &mut report).await;
                    stale = report.succeeded > 0;
                }
                Operation::Pause => {
                    apply_pause(client, &plan_pause(&torrents), false, &mut report).await;
                }
                Operation::Resume => {
                    apply_resume(client, &plan_resume(&torrents), false, &mut report).await;
                }
                Operation::Hardlinks => match &self.config.hardlinks.target_dir {
                    Some(target) => {
                        let linked =
                            create_hardlinks(client, &plan_hardlinks(&torrents), target, false)
                                .await;
                        report.succeeded = linked.linked;
                        report.failed = linked.failed;
                        if linked.skipped > 0 {
                            report.note(format!("{} links already existed", linked.skipped));
                        }
                    }
                    None => {
                        warn!("No hardlinks target_dir configured, skipping");
                        report.note("no target_dir configured");
                    }
                },
                Operation::Orphaned => {
                    warn!("Orphaned file detection requires a disk scan and is not performed");
                    report.note("not performed");
                }
            }

            info!(
                "{} finished: {} succeeded, {} failed",
                operation, report.succeeded, report.failed
            );
            run.operations.push(report);
        }

        Ok(run)
    }

    /// Tag, then delete by tag. Returns whether anything was deleted.
    async fn unregistered(
        &self,
        client: &CachedClient,
        torrents: &[Torrent],
        report: &mut OperationReport,
        run: &mut RunReport,
    ) -> bool {
        let classification = Classifier::from_config(&self.config.unregistered).classify(torrents);
        info!(
            "Found {} unregistered and {} cross-seeded unregistered torrents",
            classification.unregistered.hashes.len(),
            classification.cross_seeded.hashes.len()
        );
        apply_tags(client, &classification, false, report).await;

        if !self.config.deletion.use_delete_tags {
            return false;
        }

        // The executor must see the tags just applied.
        let fresh = match client.list_torrents().await {
            Ok(fresh) => fresh,
            Err(e) => {
                error!("Failed to re-list torrents, skipping deletion: {}", e);
                report.note(format!("deletion skipped: {}", e));
                return false;
            }
        };

        let deletion = DeletionExecutor::new(self.config.deletion.clone())
            .run(client, &fresh, false)
            .await;
        let deleted = deletion.deleted > 0;
        merge_deletion(report, run, deletion);
        deleted
    }
}

fn merge_deletion(report: &mut OperationReport, run: &mut RunReport, deletion: DeletionReport) {
    report.succeeded += deletion.deleted;
    report.failed += deletion.failed;
    if deletion.quarantined > 0 {
        report.note(format!(
            "{} files moved to the recycle bin",
            deletion.quarantined
        ));
    }
    if !deletion.kept_shared.is_empty() {
        report.note(format!(
            "kept files of {} torrents shared with other torrents",
            deletion.kept_shared.len()
        ));
    }
    report.notes.extend(deletion.notes);
    run.quarantine_failures.extend(deletion.quarantine_failures);
}
