// Turns the raw practice table into the context snapshot the rules and the
// prompt run on. Pure: the sheet I/O lives in infra, the wall clock is an
// argument.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use super::coaching_models::{ContextSnapshot, RawTable, Targets, SKILL_COLUMNS};
use super::dates;

/// How many week-cycle totals the trend summary keeps.
const TREND_PERIODS: usize = 4;

/// Unrecoverable aggregation failure. Aborts the whole invocation - a sheet
/// without a date column is operator error, not something to paper over.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("practice sheet has no Date column")]
    MissingDateColumn,
}

/// One aggregated calendar day. Duplicate raw rows for the same date are
/// summed into a single record.
struct DayRecord {
    skills: Vec<f64>,
    total: f64,
}

/// Builds the per-invocation snapshot from raw sheet rows.
///
/// Rows with unparseable dates are silently dropped; blank or non-numeric
/// skill cells count as zero; rows dated after the current practice day are
/// ignored (the sheet sometimes has pre-filled future dates).
pub fn build_snapshot(
    table: &RawTable,
    now: NaiveDateTime,
    targets: Targets,
) -> Result<ContextSnapshot, ContextError> {
    let headers: Vec<&str> = table.headers.iter().map(|h| h.trim()).collect();
    let date_col = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("date"))
        .ok_or(ContextError::MissingDateColumn)?;

    let skill_cols: Vec<(usize, &'static str)> = SKILL_COLUMNS
        .iter()
        .filter_map(|skill| {
            headers
                .iter()
                .position(|h| h == skill)
                .map(|idx| (idx, *skill))
        })
        .collect();

    let today = dates::practice_day(now);

    let mut by_day: BTreeMap<NaiveDate, DayRecord> = BTreeMap::new();
    for row in &table.rows {
        let raw_date = row.get(date_col).map(String::as_str).unwrap_or("");
        let Some(day) = dates::parse_practice_date(raw_date) else {
            continue;
        };
        if day > today {
            continue;
        }

        let record = by_day.entry(day).or_insert_with(|| DayRecord {
            skills: vec![0.0; skill_cols.len()],
            total: 0.0,
        });
        for (slot, (col, _)) in skill_cols.iter().enumerate() {
            let value = parse_cell(row.get(*col).map(String::as_str).unwrap_or(""));
            record.skills[slot] += value;
            record.total += value;
        }
    }

    let today_record = by_day.get(&today);
    let today_total = today_record.map(|r| r.total).unwrap_or(0.0);

    let start = dates::cycle_start(today);
    let days_elapsed = dates::days_since_cycle_start(today);
    let week: Vec<&DayRecord> = by_day.range(start..=today).map(|(_, r)| r).collect();
    let week_total: f64 = week.iter().map(|r| r.total).sum();
    let weekly_average = week_total / (days_elapsed as f64 + 1.0);

    // Per-skill share of this week's hours, truncated to whole percent.
    let mut skill_sums = vec![0.0; skill_cols.len()];
    for record in &week {
        for (slot, value) in record.skills.iter().enumerate() {
            skill_sums[slot] += value;
        }
    }
    let distribution_total: f64 = skill_sums.iter().sum();
    let week_distribution = if distribution_total > 0.0 {
        skill_cols
            .iter()
            .enumerate()
            .map(|(slot, (_, name))| {
                let pct = (skill_sums[slot] / distribution_total * 100.0) as i64;
                format!("{}:{}%", short_name(name), pct)
            })
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        "0%".to_string()
    };

    // Trend: day totals grouped by shifted ISO week, last four buckets in
    // chronological order, newest labelled "Current Week".
    let mut week_totals: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for (day, record) in &by_day {
        *week_totals.entry(dates::iso_week_key(*day)).or_insert(0.0) += record.total;
    }
    let totals: Vec<f64> = week_totals.values().copied().collect();
    let recent = &totals[totals.len().saturating_sub(TREND_PERIODS)..];
    let four_week_trend = recent
        .iter()
        .enumerate()
        .map(|(i, hours)| {
            let label = if i == recent.len() - 1 {
                "Current Week".to_string()
            } else {
                format!("Week {}", i + 1)
            };
            format!("{label}: {hours:.1}h")
        })
        .collect::<Vec<_>>()
        .join(", ");

    let todays_practice = match today_record {
        Some(record) => skill_cols
            .iter()
            .enumerate()
            .map(|(slot, (_, name))| format!("{}:{}", short_name(name), record.skills[slot]))
            .collect::<Vec<_>>()
            .join(", "),
        None => "No practice yet".to_string(),
    };

    Ok(ContextSnapshot {
        current_time: now.format("%H:%M").to_string(),
        today_total,
        daily_target: targets.daily,
        weekly_target: targets.weekly,
        days_remaining_in_week: dates::days_remaining_in_cycle(today),
        todays_practice,
        week_total_hours: week_total,
        weekly_average,
        week_distribution,
        four_week_trend,
    })
}

/// Blank and non-numeric cells become 0.0; decimal commas are accepted
/// ("1,5" is how a French locale writes 1.5).
fn parse_cell(raw: &str) -> f64 {
    raw.trim().replace(',', ".").parse().unwrap_or(0.0)
}

/// "Speaking Practice" renders as "Speaking" in the compact strings.
fn short_name(column: &str) -> &str {
    column.split_whitespace().next().unwrap_or(column)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: ["Date", "Listening", "Speaking Practice", "Reading", "Writing"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn single_row_scenario() {
        // Friday 2024-03-01, one reading session of 1.5h.
        let t = table(&[&["01/03/2024", "", "", "1.5", ""]]);
        let ctx = build_snapshot(&t, at(2024, 3, 1, 10, 0), Targets::default()).unwrap();

        assert_eq!(ctx.today_total, 1.5);
        assert_eq!(ctx.week_total_hours, 1.5);
        // Cycle started Wednesday 2024-02-28, so 3 days elapsed including today.
        assert!((ctx.weekly_average - 0.5).abs() < 1e-9);
        assert_eq!(ctx.days_remaining_in_week, 4);
        assert_eq!(ctx.current_time, "10:00");
        assert_eq!(
            ctx.todays_practice,
            "Listening:0, Speaking:0, Reading:1.5, Writing:0"
        );
    }

    #[test]
    fn malformed_dates_are_dropped_not_fatal() {
        let t = table(&[
            &["not-a-date", "2", "", "", ""],
            &["01/03/2024", "1", "", "", ""],
        ]);
        let ctx = build_snapshot(&t, at(2024, 3, 1, 10, 0), Targets::default()).unwrap();
        assert_eq!(ctx.today_total, 1.0);
    }

    #[test]
    fn future_rows_are_ignored() {
        let t = table(&[
            &["01/03/2024", "1", "", "", ""],
            &["02/03/2024", "5", "", "", ""],
        ]);
        let ctx = build_snapshot(&t, at(2024, 3, 1, 10, 0), Targets::default()).unwrap();
        assert_eq!(ctx.today_total, 1.0);
        assert_eq!(ctx.week_total_hours, 1.0);
    }

    #[test]
    fn vampire_rule_keeps_yesterday_current() {
        // 01:30 on March 2nd still counts as March 1st.
        let t = table(&[&["01/03/2024", "", "", "1.5", ""]]);
        let ctx = build_snapshot(&t, at(2024, 3, 2, 1, 30), Targets::default()).unwrap();
        assert_eq!(ctx.today_total, 1.5);
    }

    #[test]
    fn duplicate_dates_are_summed() {
        let t = table(&[
            &["01/03/2024", "1", "", "", ""],
            &["01/03/2024", "", "0,5", "", ""],
        ]);
        let ctx = build_snapshot(&t, at(2024, 3, 1, 10, 0), Targets::default()).unwrap();
        assert_eq!(ctx.today_total, 1.5);
    }

    #[test]
    fn blank_and_garbage_cells_count_as_zero() {
        let t = table(&[&["01/03/2024", " ", "abc", "2", ""]]);
        let ctx = build_snapshot(&t, at(2024, 3, 1, 10, 0), Targets::default()).unwrap();
        assert_eq!(ctx.today_total, 2.0);
    }

    #[test]
    fn distribution_percentages_sum_to_about_100() {
        let t = table(&[&["01/03/2024", "1", "1", "1", "1"]]);
        let ctx = build_snapshot(&t, at(2024, 3, 1, 10, 0), Targets::default()).unwrap();

        let total: i64 = ctx
            .week_distribution
            .split(", ")
            .map(|part| {
                part.rsplit(':')
                    .next()
                    .unwrap()
                    .trim_end_matches('%')
                    .parse::<i64>()
                    .unwrap()
            })
            .sum();
        assert!((96..=100).contains(&total), "sum was {total}");
    }

    #[test]
    fn empty_week_renders_zero_distribution() {
        // Rows exist but carry no hours this week.
        let t = table(&[&["01/03/2024", "", "", "", ""]]);
        let ctx = build_snapshot(&t, at(2024, 3, 1, 10, 0), Targets::default()).unwrap();
        assert_eq!(ctx.week_distribution, "0%");
    }

    #[test]
    fn trend_labels_end_with_current_week() {
        // Two consecutive Wednesday cycles.
        let t = table(&[
            &["21/02/2024", "2", "", "", ""],
            &["28/02/2024", "", "", "1", ""],
        ]);
        let ctx = build_snapshot(&t, at(2024, 2, 29, 10, 0), Targets::default()).unwrap();
        assert_eq!(ctx.four_week_trend, "Week 1: 2.0h, Current Week: 1.0h");
    }

    #[test]
    fn no_rows_today_reads_as_no_practice() {
        let t = table(&[&["28/02/2024", "1", "", "", ""]]);
        let ctx = build_snapshot(&t, at(2024, 3, 1, 10, 0), Targets::default()).unwrap();
        assert_eq!(ctx.today_total, 0.0);
        assert_eq!(ctx.todays_practice, "No practice yet");
    }

    #[test]
    fn missing_date_column_is_fatal() {
        let t = RawTable {
            headers: vec!["Jour".into(), "Listening".into()],
            rows: vec![vec!["01/03/2024".into(), "1".into()]],
        };
        assert!(matches!(
            build_snapshot(&t, at(2024, 3, 1, 10, 0), Targets::default()),
            Err(ContextError::MissingDateColumn)
        ));
    }

    #[test]
    fn date_column_match_is_case_insensitive() {
        let t = RawTable {
            headers: vec!["DATE".into(), "Reading".into()],
            rows: vec![vec!["01/03/2024".into(), "1".into()]],
        };
        let ctx = build_snapshot(&t, at(2024, 3, 1, 10, 0), Targets::default()).unwrap();
        assert_eq!(ctx.today_total, 1.0);
    }
}
