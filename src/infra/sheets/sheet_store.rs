// Sheet-backed implementations of the core ports. One spreadsheet carries
// everything: the operator's practice log plus the two worksheets this bot
// owns (`agent_state` and `logs`), created on first use.

use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;

use crate::core::coaching::{
    AgentState, FetchError, HistoryStore, NotificationKind, PracticeSource, RawTable, StateStore,
    StoreError,
};

use super::sheets_client::SheetsClient;

/// Preferred name of the operator's data worksheet; falls back to the first
/// sheet when absent.
const DATA_WORKSHEET_DEFAULT: &str = "file";

const STATE_WORKSHEET: &str = "agent_state";
const STATE_HEADER: [&str; 4] = [
    "LastRunTime",
    "LastDailyTotal",
    "LastWeeklyTotal",
    "DailyGoalAchieved",
];

const LOG_WORKSHEET: &str = "logs";
const LOG_HEADER: [&str; 3] = ["Timestamp", "Type", "Message"];

type ClientError = Box<dyn Error + Send + Sync>;

pub struct SheetStore {
    client: Arc<SheetsClient>,
    sheet_key: String,
    /// Operator-configured data worksheet name, if any.
    worksheet: Option<String>,
    /// Timestamps in sheet cells are written in the coach timezone.
    tz: Tz,
}

impl SheetStore {
    pub fn new(
        client: Arc<SheetsClient>,
        sheet_key: impl Into<String>,
        worksheet: Option<String>,
        tz: Tz,
    ) -> Self {
        Self {
            client,
            sheet_key: sheet_key.into(),
            worksheet,
            tz,
        }
    }

    fn timestamp(&self) -> String {
        Utc::now()
            .with_timezone(&self.tz)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    /// Resolves the practice data worksheet: configured name if it exists,
    /// then the conventional default, then the first sheet.
    async fn data_worksheet(&self) -> Result<String, ClientError> {
        let titles = self.client.sheet_titles(&self.sheet_key).await?;

        if let Some(configured) = &self.worksheet {
            if titles.iter().any(|t| t == configured) {
                return Ok(configured.clone());
            }
            tracing::warn!(
                "configured worksheet '{}' not found, falling back",
                configured
            );
        }
        if titles.iter().any(|t| t == DATA_WORKSHEET_DEFAULT) {
            return Ok(DATA_WORKSHEET_DEFAULT.to_string());
        }

        titles
            .into_iter()
            .next()
            .ok_or_else(|| "spreadsheet has no worksheets".into())
    }

    /// Creates the worksheet with its header row if it does not exist yet.
    /// Returns true when it was just created.
    async fn ensure_worksheet(&self, title: &str, header: &[&str]) -> Result<bool, ClientError> {
        let titles = self.client.sheet_titles(&self.sheet_key).await?;
        if titles.iter().any(|t| t == title) {
            return Ok(false);
        }

        self.client
            .add_worksheet(&self.sheet_key, title, 1000, header.len() as u32)
            .await?;
        let header_row: Vec<String> = header.iter().map(|h| h.to_string()).collect();
        self.client
            .append_row(&self.sheet_key, title, &header_row)
            .await?;

        Ok(true)
    }
}

fn store_err(e: ClientError) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl PracticeSource for SheetStore {
    async fn fetch_table(&self) -> Result<RawTable, FetchError> {
        let worksheet = self
            .data_worksheet()
            .await
            .map_err(|e| FetchError::Backend(e.to_string()))?;
        let mut rows = self
            .client
            .read_range(&self.sheet_key, &SheetsClient::range(&worksheet, "A1:Z"))
            .await
            .map_err(|e| FetchError::Backend(e.to_string()))?;

        if rows.is_empty() {
            return Ok(RawTable::default());
        }
        let headers = rows.remove(0);
        Ok(RawTable { headers, rows })
    }
}

#[async_trait]
impl StateStore for SheetStore {
    async fn read_state(&self) -> Result<AgentState, StoreError> {
        let created = self
            .ensure_worksheet(STATE_WORKSHEET, &STATE_HEADER)
            .await
            .map_err(store_err)?;
        if created {
            // Seed row 2 so later updates always have a slot to overwrite.
            let seed: Vec<String> = vec![
                "1970-01-01 00:00:00".into(),
                "0".into(),
                "0".into(),
                "false".into(),
            ];
            self.client
                .append_row(&self.sheet_key, STATE_WORKSHEET, &seed)
                .await
                .map_err(store_err)?;
            return Ok(AgentState::default());
        }

        let rows = self
            .client
            .read_range(
                &self.sheet_key,
                &SheetsClient::range(STATE_WORKSHEET, "A2:D2"),
            )
            .await
            .map_err(store_err)?;
        let row = rows.into_iter().next().unwrap_or_default();

        Ok(AgentState {
            last_run: row.first().cloned().unwrap_or_default(),
            last_daily: parse_hours_cell(row.get(1)),
            last_weekly: parse_hours_cell(row.get(2)),
            goal_achieved: row
                .get(3)
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }

    async fn write_state(&self, state: &AgentState) -> Result<(), StoreError> {
        self.ensure_worksheet(STATE_WORKSHEET, &STATE_HEADER)
            .await
            .map_err(store_err)?;

        let row = vec![
            state.last_run.clone(),
            state.last_daily.to_string(),
            state.last_weekly.to_string(),
            state.goal_achieved.to_string(),
        ];
        self.client
            .update_range(
                &self.sheet_key,
                &SheetsClient::range(STATE_WORKSHEET, "A2:D2"),
                &[row],
            )
            .await
            .map_err(store_err)
    }
}

#[async_trait]
impl HistoryStore for SheetStore {
    async fn recent_messages(
        &self,
        kind: NotificationKind,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        self.ensure_worksheet(LOG_WORKSHEET, &LOG_HEADER)
            .await
            .map_err(store_err)?;

        let rows = self
            .client
            .read_range(&self.sheet_key, &SheetsClient::range(LOG_WORKSHEET, "A:C"))
            .await
            .map_err(store_err)?;

        let matching: Vec<String> = rows
            .iter()
            .skip(1) // header
            .filter(|row| row.get(1).map(String::as_str) == Some(kind.tag()))
            .filter_map(|row| row.get(2).cloned())
            .collect();

        let start = matching.len().saturating_sub(limit);
        Ok(matching[start..].to_vec())
    }

    async fn append(&self, kind: NotificationKind, message: &str) -> Result<(), StoreError> {
        self.ensure_worksheet(LOG_WORKSHEET, &LOG_HEADER)
            .await
            .map_err(store_err)?;

        let row = vec![
            self.timestamp(),
            kind.tag().to_string(),
            message.to_string(),
        ];
        self.client
            .append_row(&self.sheet_key, LOG_WORKSHEET, &row)
            .await
            .map_err(store_err)
    }
}

/// Sheets formats numbers per locale; accept both "1.5" and "1,5".
fn parse_hours_cell(cell: Option<&String>) -> f64 {
    cell.map(|v| v.trim().replace(',', "."))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0)
}
