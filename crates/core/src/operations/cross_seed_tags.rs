//! Tagging torrents that share an identical file structure.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::config::CrossSeedingConfig;
use crate::torrent_client::{Torrent, TorrentReader};

use super::TagPlan;

/// Group torrents by the set of their file names.
///
/// Groups of more than one torrent get the cross-seeding tag, the others the
/// unique tag. Torrents without a save path or without a file list are left
/// out.
pub async fn plan_cross_seed_tags<R: TorrentReader + ?Sized>(
    reader: &R,
    torrents: &[Torrent],
    config: &CrossSeedingConfig,
) -> TagPlan {
    let mut structures: BTreeMap<BTreeSet<String>, Vec<&Torrent>> = BTreeMap::new();

    for torrent in torrents {
        if torrent.save_path.is_none() {
            warn!("Skipping '{}': no save path", torrent.name);
            continue;
        }
        let files = match reader.list_files(&torrent.hash).await {
            Ok(files) if !files.is_empty() => files,
            Ok(_) => {
                warn!("Skipping '{}': empty file list", torrent.name);
                continue;
            }
            Err(e) => {
                warn!("Skipping '{}': failed to list files: {}", torrent.name, e);
                continue;
            }
        };
        let structure = files.into_iter().map(|f| f.name).collect();
        structures.entry(structure).or_default().push(torrent);
    }

    debug!("Collected {} unique file structures", structures.len());

    let mut plan = TagPlan::new();
    for group in structures.values() {
        let tag = if group.len() > 1 {
            &config.tag
        } else {
            &config.unique_tag
        };
        plan.entry(tag.clone())
            .or_default()
            .extend(group.iter().map(|t| t.hash.clone()));
    }

    info!(
        "Cross-seed detection: {} cross-seeded, {} unique",
        plan.get(&config.tag).map_or(0, Vec::len),
        plan.get(&config.unique_tag).map_or(0, Vec::len)
    );
    plan
}
