//! Automatic Torrent Management (auto TMM) preferences.

use serde_json::{Map, Value};
use tracing::info;

use crate::config::AutoTmmConfig;
use crate::report::OperationReport;
use crate::torrent_client::TorrentClient;

/// Preferences enabling auto TMM, or `None` when it is disabled.
///
/// Relocation switches left unset in the config are not sent.
pub fn plan_auto_tmm(config: &AutoTmmConfig) -> Option<Value> {
    if !config.enabled {
        return None;
    }
    let mut preferences = Map::new();
    preferences.insert("auto_tmm_enabled".to_string(), Value::Bool(true));
    for (key, value) in [
        ("torrent_changed_tmm_enabled", config.torrent_changed),
        ("save_path_changed_tmm_enabled", config.save_path_changed),
        ("category_changed_tmm_enabled", config.category_changed),
    ] {
        if let Some(value) = value {
            preferences.insert(key.to_string(), Value::Bool(value));
        }
    }
    Some(Value::Object(preferences))
}

pub async fn apply_auto_tmm<C: TorrentClient + ?Sized>(
    client: &C,
    preferences: &Value,
    dry_run: bool,
    report: &mut OperationReport,
) {
    if dry_run {
        info!("[dry run] Would set preferences {}", preferences);
        return;
    }
    let result = client.set_preferences(preferences).await;
    if result.is_ok() {
        info!("Enabled Automatic Torrent Management (auto TMM)");
    }
    report.record_batch("set preferences", 1, result);
}
