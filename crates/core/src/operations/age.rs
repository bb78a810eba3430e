//! Tagging by age.

use chrono::{DateTime, Datelike, Utc};
use tracing::debug;

use crate::torrent_client::Torrent;

use super::TagPlan;

/// Age bucket tag for a torrent added at `added`, in calendar months.
pub fn age_tag(added: DateTime<Utc>, now: DateTime<Utc>) -> &'static str {
    let months = (now.year() - added.year()) * 12 + (now.month() as i32 - added.month() as i32);
    match months {
        m if m <= 1 => ">1_month",
        2 => ">2_months",
        3 => ">3_months",
        4 => ">4_months",
        5 => ">5_months",
        6 => ">6_months",
        _ => "6_months_plus",
    }
}

/// Age tags for every torrent with a known added date.
pub fn plan_age_tags(torrents: &[Torrent], now: DateTime<Utc>) -> TagPlan {
    let mut plan = TagPlan::new();
    for torrent in torrents {
        let Some(added) = torrent.added_at else {
            debug!("{} has no added date, skipping age tag", torrent.name);
            continue;
        };
        plan.entry(age_tag(added, now).to_string())
            .or_default()
            .push(torrent.hash.clone());
    }
    plan
}
