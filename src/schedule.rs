// When the coach wakes up. The original deployment ran on a cron trigger at
// minute 0 of hours 17,19,21,23,1 (evening every 2h plus the post-midnight
// slot the vampire rule exists for); this reproduces that in-process.

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};

pub const DEFAULT_HOURS: [u32; 5] = [17, 19, 21, 23, 1];

/// Parses a comma-separated hour list ("17,19,21,23,1"). Out-of-range and
/// junk entries are dropped; an empty result falls back to the defaults.
pub fn parse_hours(raw: &str) -> Vec<u32> {
    let mut hours: Vec<u32> = raw
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .filter(|h| *h < 24)
        .collect();
    hours.sort_unstable();
    hours.dedup();

    if hours.is_empty() {
        DEFAULT_HOURS.to_vec()
    } else {
        hours
    }
}

/// The next minute-0 moment strictly after `now` whose hour is in the set.
pub fn next_run_after(now: NaiveDateTime, hours: &[u32]) -> NaiveDateTime {
    let hours: &[u32] = if hours.is_empty() {
        &DEFAULT_HOURS
    } else {
        hours
    };

    let mut candidate = NaiveDateTime::new(
        now.date(),
        NaiveTime::from_hms_opt(now.hour(), 0, 0).unwrap_or_default(),
    );
    loop {
        candidate += Duration::hours(1);
        if hours.contains(&candidate.hour()) {
            return candidate;
        }
    }
}
