// Date bucketing for the practice sheet.
//
// The sheet is filled in by hand from a French-locale Google account, so dates
// arrive either as plain `DD/MM/YYYY` or with French month names
// ("12 janv. 2024"). Rows that still don't parse are dropped upstream.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

/// Activity logged between midnight and this hour still counts toward the
/// previous day (the "vampire rule" - a 1 AM session belongs to yesterday).
pub const DAY_ROLLOVER_HOUR: u32 = 3;

/// French month names (full and abbreviated) mapped to numeric months.
/// Extend here, not in the parsing code.
const FRENCH_MONTHS: [(&str, &str); 20] = [
    ("janvier", "01"),
    ("février", "02"),
    ("mars", "03"),
    ("avril", "04"),
    ("mai", "05"),
    ("juin", "06"),
    ("juillet", "07"),
    ("août", "08"),
    ("septembre", "09"),
    ("octobre", "10"),
    ("novembre", "11"),
    ("décembre", "12"),
    ("janv.", "01"),
    ("févr.", "02"),
    ("avr.", "04"),
    ("juil.", "07"),
    ("sept.", "09"),
    ("oct.", "10"),
    ("nov.", "11"),
    ("déc.", "12"),
];

/// Parses a raw sheet cell into a calendar date.
///
/// Month names are substituted first, then separators are normalized (commas
/// dropped, dots and spaces become slashes) and the result is read as
/// `DD/MM/YYYY`. Returns `None` for anything unparseable.
pub fn parse_practice_date(raw: &str) -> Option<NaiveDate> {
    let mut clean = raw.trim().to_lowercase();
    if clean.is_empty() {
        return None;
    }

    for (name, number) in FRENCH_MONTHS {
        if clean.contains(name) {
            clean = clean.replace(name, number);
            break;
        }
    }

    let mut normalized = String::with_capacity(clean.len());
    for c in clean.chars() {
        match c {
            ',' => {}
            '.' | ' ' => normalized.push('/'),
            other => normalized.push(other),
        }
    }
    while normalized.contains("//") {
        normalized = normalized.replace("//", "/");
    }
    let normalized = normalized.trim_matches('/');

    NaiveDate::parse_from_str(normalized, "%d/%m/%Y").ok()
}

/// The calendar day this wall-clock moment counts toward.
pub fn practice_day(now: NaiveDateTime) -> NaiveDate {
    if now.hour() < DAY_ROLLOVER_HOUR {
        now.date() - Duration::days(1)
    } else {
        now.date()
    }
}

/// Days elapsed since the start of the current week-cycle (0 on a Wednesday).
pub fn days_since_cycle_start(day: NaiveDate) -> u32 {
    // num_days_from_monday: Mon=0 .. Sun=6; the cycle starts Wednesday (2).
    (day.weekday().num_days_from_monday() + 7 - 2) % 7
}

/// The most recent Wednesday on or before `day`.
pub fn cycle_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(days_since_cycle_start(day) as i64)
}

pub fn days_remaining_in_cycle(day: NaiveDate) -> u32 {
    6 - days_since_cycle_start(day)
}

/// ISO year/week of `day` shifted back two days, so that a Wednesday-start
/// cycle falls entirely into one ISO-week bucket. Used for trend grouping.
pub fn iso_week_key(day: NaiveDate) -> (i32, u32) {
    let shifted = day - Duration::days(2);
    (shifted.iso_week().year(), shifted.iso_week().week())
}
