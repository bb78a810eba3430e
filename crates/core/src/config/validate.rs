use reqwest::Url;
use tracing::warn;

use super::{types::Config, ConfigError};

const MAX_SEED_TIME_MINUTES: i64 = 525_600;
const MAX_SEED_RATIO: f64 = 100.0;

/// Validate configuration
///
/// Every problem found is collected so a broken config is reported in one go.
/// Must run before any client call: a run never starts on an invalid config.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    let url = config.qbittorrent.url.trim();
    match Url::parse(url) {
        Ok(parsed) => {
            if !matches!(parsed.scheme(), "http" | "https") {
                errors.push(format!(
                    "qbittorrent.url has invalid scheme '{}', use http or https",
                    parsed.scheme()
                ));
            }
            if parsed.host_str().map_or(true, str::is_empty) {
                errors.push(format!("qbittorrent.url '{}' is missing a host", url));
            }
        }
        Err(e) => errors.push(format!(
            "qbittorrent.url '{}' is not a valid URL like http://host:port: {}",
            url, e
        )),
    }
    if config.qbittorrent.username.trim().is_empty() {
        errors.push("qbittorrent.username cannot be empty".to_string());
    }

    let unregistered = &config.unregistered;
    if unregistered.default_tag.trim().is_empty() {
        errors.push("unregistered.default_tag cannot be empty".to_string());
    }
    if unregistered.cross_seed_tag.trim().is_empty() {
        errors.push("unregistered.cross_seed_tag cannot be empty".to_string());
    }
    if unregistered.default_tag == unregistered.cross_seed_tag {
        errors.push(
            "unregistered.default_tag and unregistered.cross_seed_tag must differ".to_string(),
        );
    }
    if let Some(tag) = &unregistered.other_issues_tag {
        if tag.trim().is_empty() {
            errors.push("unregistered.other_issues_tag cannot be empty when set".to_string());
        }
    }
    if unregistered.patterns.is_empty() {
        warn!("No unregistered patterns configured, unregistered checks will flag nothing");
    }

    let deletion = &config.deletion;
    if deletion.use_delete_tags && deletion.delete_tags.is_empty() {
        errors.push("deletion.use_delete_tags is set but deletion.delete_tags is empty".to_string());
    }
    if deletion.delete_tags.iter().any(|t| t.trim().is_empty()) {
        errors.push("deletion.delete_tags cannot contain empty tags".to_string());
    }
    if let Some(bin) = &deletion.recycle_bin {
        if !bin.is_absolute() {
            errors.push(format!(
                "deletion.recycle_bin must be an absolute path: {}",
                bin.display()
            ));
        }
    }

    for (key, rule) in &config.tracker_tags {
        if let Some(tag) = &rule.tag {
            if tag.trim().is_empty() {
                errors.push(format!("tracker_tags.{}.tag cannot be empty", key));
            }
        }
        if let Some(minutes) = rule.seed_time_limit {
            if minutes < -2 {
                errors.push(format!(
                    "tracker_tags.{}.seed_time_limit must be >= -2 (-2 = global, -1 = unlimited)",
                    key
                ));
            } else if minutes > MAX_SEED_TIME_MINUTES {
                errors.push(format!(
                    "tracker_tags.{}.seed_time_limit exceeds {} minutes: {}",
                    key, MAX_SEED_TIME_MINUTES, minutes
                ));
            } else if minutes == 0 {
                warn!(
                    "tracker_tags.{}.seed_time_limit is 0, torrents will stop seeding immediately",
                    key
                );
            }
        }
        if let Some(ratio) = rule.seed_ratio_limit {
            if !ratio.is_finite() || ratio < -2.0 {
                errors.push(format!(
                    "tracker_tags.{}.seed_ratio_limit must be a number >= -2 (-2 = global, -1 = unlimited)",
                    key
                ));
            } else if ratio > MAX_SEED_RATIO {
                errors.push(format!(
                    "tracker_tags.{}.seed_ratio_limit exceeds {}: {}",
                    key, MAX_SEED_RATIO, ratio
                ));
            } else if ratio == 0.0 {
                warn!(
                    "tracker_tags.{}.seed_ratio_limit is 0, torrents will stop seeding immediately",
                    key
                );
            }
        }
    }

    if config.cross_seeding.tag.trim().is_empty() || config.cross_seeding.unique_tag.trim().is_empty()
    {
        errors.push("cross_seeding tags cannot be empty".to_string());
    }

    if let Some(target) = &config.hardlinks.target_dir {
        if !target.is_absolute() {
            errors.push(format!(
                "hardlinks.target_dir must be an absolute path: {}",
                target.display()
            ));
        }
    }

    if config.cache.ttl_secs == 0 {
        errors.push("cache.ttl_secs must be greater than 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
