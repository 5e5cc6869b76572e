use serde::Serialize;

/// The skill columns we look for in the practice sheet. The operator may not
/// have all of them; aggregation uses whichever ones the header contains.
pub const SKILL_COLUMNS: [&str; 4] = ["Listening", "Speaking Practice", "Reading", "Writing"];

/// One worksheet read verbatim: a header row plus string cells.
/// Parsing (dates, numbers) happens in the aggregator, not in the sheet layer.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Daily and weekly practice targets, in hours.
#[derive(Debug, Clone, Copy)]
pub struct Targets {
    pub daily: f64,
    pub weekly: f64,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            daily: 2.0,
            weekly: 14.0,
        }
    }
}

/// Everything the rule cascade and the prompt need to know about the current
/// moment. Recomputed from scratch on every invocation, never persisted.
///
/// Serializes to the JSON blob that gets embedded into the Gemini prompt, so
/// field names double as prompt placeholders.
#[derive(Debug, Clone, Serialize)]
pub struct ContextSnapshot {
    /// Actual wall time ("HH:MM"), not the shifted practice day.
    pub current_time: String,
    pub today_total: f64,
    pub daily_target: f64,
    pub weekly_target: f64,
    pub days_remaining_in_week: u32,
    /// Today's per-skill breakdown, e.g. "Listening:0.5, Reading:1", or
    /// "No practice yet".
    pub todays_practice: String,
    pub week_total_hours: f64,
    pub weekly_average: f64,
    /// Per-skill share of this week's hours, e.g. "Listening:40%, Reading:60%".
    pub week_distribution: String,
    /// Last four week-cycle totals, oldest first, newest labelled
    /// "Current Week".
    pub four_week_trend: String,
}

/// The single persisted record: what the previous invocation observed.
/// Read once at the start of a run, written once at the end - every run,
/// including the silent ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentState {
    pub last_run: String,
    pub last_daily: f64,
    pub last_weekly: f64,
    pub goal_achieved: bool,
}

/// Which instruction template a notification uses. Also the category tag under
/// which messages are logged and deduplicated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    PreAction,
    PostAction,
    WeeklySummary,
}

impl NotificationKind {
    /// The tag written to the `logs` worksheet `Type` column.
    pub fn tag(&self) -> &'static str {
        match self {
            NotificationKind::PreAction => "pre_action",
            NotificationKind::PostAction => "post_action",
            NotificationKind::WeeklySummary => "weekly_summary",
        }
    }
}
