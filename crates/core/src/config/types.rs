use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub qbittorrent: QBittorrentConfig,
    /// Run every operation in preview mode.
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub unregistered: UnregisteredConfig,
    #[serde(default)]
    pub deletion: DeletionConfig,
    /// Per-tracker tagging and seeding rules, keyed by a fragment of the tracker host.
    #[serde(default)]
    pub tracker_tags: BTreeMap<String, TrackerRule>,
    #[serde(default)]
    pub cross_seeding: CrossSeedingConfig,
    #[serde(default)]
    pub hardlinks: HardlinkConfig,
    #[serde(default)]
    pub auto_tmm: AutoTmmConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub impact: ImpactThresholds,
}

/// qBittorrent Web API connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    /// Web UI base URL (e.g., "http://localhost:8080")
    pub url: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

/// Unregistered tracker detection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnregisteredConfig {
    /// Tracker messages that mean the torrent is gone from the tracker.
    /// Entries prefixed with `starts_with:` match by prefix.
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default = "default_unregistered_tag")]
    pub default_tag: String,
    #[serde(default = "default_cross_seed_tag")]
    pub cross_seed_tag: String,
    /// Tag for torrents with a failing tracker that is not an unregistered message.
    #[serde(default)]
    pub other_issues_tag: Option<String>,
}

fn default_unregistered_tag() -> String {
    "unregistered".to_string()
}

fn default_cross_seed_tag() -> String {
    "unregistered:crossseeding".to_string()
}

impl Default for UnregisteredConfig {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            default_tag: default_unregistered_tag(),
            cross_seed_tag: default_cross_seed_tag(),
            other_issues_tag: None,
        }
    }
}

/// Tag-driven deletion policy
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeletionConfig {
    #[serde(default)]
    pub use_delete_tags: bool,
    /// Tags that trigger deletion, checked in order.
    #[serde(default)]
    pub delete_tags: Vec<String>,
    /// Whether deleting a torrent carrying the tag also removes its files.
    #[serde(default)]
    pub delete_files: HashMap<String, bool>,
    /// Quarantine directory used instead of permanent file removal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recycle_bin: Option<PathBuf>,
}

impl DeletionConfig {
    /// Whether files of torrents deleted for `tag` should be removed.
    pub fn deletes_files(&self, tag: &str) -> bool {
        self.delete_files.get(tag).copied().unwrap_or(false)
    }

    /// First configured delete tag for which `has_tag` holds.
    pub fn matching_tag(&self, has_tag: impl Fn(&str) -> bool) -> Option<&str> {
        self.delete_tags
            .iter()
            .map(String::as_str)
            .find(|tag| has_tag(tag))
    }
}

/// Tagging and seed limits for torrents on a matching tracker
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct TrackerRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Minutes; -2 = global limit, -1 = unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_time_limit: Option<i64>,
    /// -2 = global limit, -1 = unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_ratio_limit: Option<f64>,
}

impl TrackerRule {
    pub fn has_share_limits(&self) -> bool {
        self.seed_time_limit.is_some() || self.seed_ratio_limit.is_some()
    }
}

/// Tags used when grouping torrents by identical file structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrossSeedingConfig {
    #[serde(default = "default_cross_seeding_tag")]
    pub tag: String,
    #[serde(default = "default_unique_tag")]
    pub unique_tag: String,
}

fn default_cross_seeding_tag() -> String {
    "cross-seed".to_string()
}

fn default_unique_tag() -> String {
    "not-cross-seeding".to_string()
}

impl Default for CrossSeedingConfig {
    fn default() -> Self {
        Self {
            tag: default_cross_seeding_tag(),
            unique_tag: default_unique_tag(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HardlinkConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_dir: Option<PathBuf>,
}

/// Automatic Torrent Management preferences.
///
/// The `*_changed` switches map onto qBittorrent's relocation preferences;
/// unset ones are left as they are on the client.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AutoTmmConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Relocate a torrent when its category changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub torrent_changed: Option<bool>,
    /// Relocate affected torrents when the default save path changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_path_changed: Option<bool>,
    /// Relocate affected torrents when a category save path changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_changed: Option<bool>,
}

/// Per-run API response cache
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
}

fn default_ttl() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
        }
    }
}

/// Thresholds above which a dry-run preview carries a warning
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ImpactThresholds {
    #[serde(default = "default_max_free_gb")]
    pub max_free_gb: f64,
    #[serde(default = "default_max_deletions")]
    pub max_deletions: usize,
    #[serde(default = "default_max_orphaned_files")]
    pub max_orphaned_files: usize,
}

fn default_max_free_gb() -> f64 {
    50.0
}

fn default_max_deletions() -> usize {
    20
}

fn default_max_orphaned_files() -> usize {
    50
}

impl Default for ImpactThresholds {
    fn default() -> Self {
        Self {
            max_free_gb: default_max_free_gb(),
            max_deletions: default_max_deletions(),
            max_orphaned_files: default_max_orphaned_files(),
        }
    }
}

/// Sanitized config for logs and reports (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub qbittorrent_url: String,
    pub password_configured: bool,
    pub dry_run: bool,
    pub pattern_count: usize,
    pub use_delete_tags: bool,
    pub delete_tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recycle_bin: Option<PathBuf>,
    pub tracker_rules: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            qbittorrent_url: config.qbittorrent.url.clone(),
            password_configured: !config.qbittorrent.password.is_empty(),
            dry_run: config.dry_run,
            pattern_count: config.unregistered.patterns.len(),
            use_delete_tags: config.deletion.use_delete_tags,
            delete_tags: config.deletion.delete_tags.clone(),
            recycle_bin: config.deletion.recycle_bin.clone(),
            tracker_rules: config.tracker_tags.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[qbittorrent]
url = "http://localhost:8080"
username = "admin"
"#;

    #[test]
    fn test_deserialize_minimal_uses_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.qbittorrent.timeout_secs, 30);
        assert!(!config.dry_run);
        assert_eq!(config.unregistered.default_tag, "unregistered");
        assert_eq!(config.unregistered.cross_seed_tag, "unregistered:crossseeding");
        assert!(config.unregistered.other_issues_tag.is_none());
        assert!(!config.deletion.use_delete_tags);
        assert!(config.deletion.recycle_bin.is_none());
        assert_eq!(config.cross_seeding.tag, "cross-seed");
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.impact, ImpactThresholds::default());
        assert_eq!(config.auto_tmm, AutoTmmConfig::default());
    }

    #[test]
    fn test_deserialize_missing_qbittorrent_fails() {
        let result: Result<Config, _> = toml::from_str("dry_run = true\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
dry_run = true

[qbittorrent]
url = "http://qbit:8080"
username = "admin"
password = "secret"

[unregistered]
patterns = ["Unregistered torrent", "starts_with:Trump"]
other_issues_tag = "issue"

[deletion]
use_delete_tags = true
delete_tags = ["unregistered"]
recycle_bin = "/data/recycle"

[deletion.delete_files]
unregistered = true

[tracker_tags.aither]
tag = "AITHER"
seed_time_limit = 100
seed_ratio_limit = 1.5

[auto_tmm]
enabled = true
torrent_changed = true
category_changed = false
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.dry_run);
        assert_eq!(config.unregistered.patterns.len(), 2);
        assert_eq!(config.unregistered.other_issues_tag.as_deref(), Some("issue"));
        assert!(config.deletion.deletes_files("unregistered"));
        assert!(!config.deletion.deletes_files("unregistered:crossseeding"));
        assert_eq!(
            config.deletion.recycle_bin,
            Some(PathBuf::from("/data/recycle"))
        );

        let rule = &config.tracker_tags["aither"];
        assert_eq!(rule.tag.as_deref(), Some("AITHER"));
        assert_eq!(rule.seed_time_limit, Some(100));
        assert_eq!(rule.seed_ratio_limit, Some(1.5));
        assert!(rule.has_share_limits());

        assert!(config.auto_tmm.enabled);
        assert_eq!(config.auto_tmm.torrent_changed, Some(true));
        assert_eq!(config.auto_tmm.save_path_changed, None);
        assert_eq!(config.auto_tmm.category_changed, Some(false));
    }

    #[test]
    fn test_matching_tag_respects_configured_order() {
        let deletion = DeletionConfig {
            use_delete_tags: true,
            delete_tags: vec!["first".to_string(), "second".to_string()],
            ..Default::default()
        };
        let tags = ["second", "first"];
        assert_eq!(deletion.matching_tag(|t| tags.contains(&t)), Some("first"));
        assert_eq!(deletion.matching_tag(|t| t == "other"), None);
    }

    #[test]
    fn test_sanitized_config_hides_password() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.qbittorrent.password = "hunter2".to_string();

        let sanitized = SanitizedConfig::from(&config);
        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(sanitized.password_configured);
        assert!(!json.contains("hunter2"));
    }
}
