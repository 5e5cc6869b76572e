// The decision cascade: one notification category (or silence) per run.
//
// Order matters - the conditions are not mutually exclusive. Goal-just-met
// implies progress, so a day that jumps straight past the daily target always
// reports as goal-met and never as plain progress.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};

use super::coaching_models::{AgentState, ContextSnapshot, NotificationKind};

/// When the weekly review fires on the calendar, checked against raw wall
/// time: the run in the 1 AM slot on Tuesday night (end of the Wednesday
/// cycle, after the vampire shift).
pub const WEEKLY_CHECK_WEEKDAY: Weekday = Weekday::Tue;
pub const WEEKLY_CHECK_HOUR: u32 = 1;

/// Picks the notification category for this run, first match wins:
/// 1. weekly check moment, or the weekly target was just crossed;
/// 2. daily goal met for the first time today;
/// 3. more hours logged than last observed;
/// 4. nothing logged yet and the goal still open.
/// Anything else stays silent.
pub fn decide(
    now: NaiveDateTime,
    ctx: &ContextSnapshot,
    state: &AgentState,
) -> Option<NotificationKind> {
    let weekly_check_moment =
        now.weekday() == WEEKLY_CHECK_WEEKDAY && now.hour() == WEEKLY_CHECK_HOUR;
    let weekly_crossed =
        ctx.week_total_hours >= ctx.weekly_target && state.last_weekly < ctx.weekly_target;
    let goal_just_met = ctx.today_total >= ctx.daily_target && !state.goal_achieved;
    let has_progressed = ctx.today_total > state.last_daily;

    if weekly_check_moment || weekly_crossed {
        Some(NotificationKind::WeeklySummary)
    } else if goal_just_met {
        Some(NotificationKind::PostAction)
    } else if has_progressed {
        Some(NotificationKind::PostAction)
    } else if !state.goal_achieved {
        Some(NotificationKind::PreAction)
    } else {
        None
    }
}

/// The state to persist at the end of this run. Written unconditionally: the
/// sheet returns 0 for a fresh day, which is what resets `goal_achieved`.
pub fn next_state(now: NaiveDateTime, ctx: &ContextSnapshot) -> AgentState {
    AgentState {
        last_run: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        last_daily: ctx.today_total,
        last_weekly: ctx.week_total_hours,
        goal_achieved: ctx.today_total >= ctx.daily_target,
    }
}
