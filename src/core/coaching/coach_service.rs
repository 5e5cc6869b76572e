// The orchestrator: one scheduled check-in, start to finish.
//
// Two failure classes, per the error design:
// - fatal-to-invocation: practice fetch / snapshot build. The run aborts,
//   nothing is sent, state is not touched.
// - degraded-but-continue: state read, history read/write, generation,
//   delivery, state write. Each is logged and swallowed so the rest of the
//   run proceeds on best-effort defaults.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

use crate::core::ai::{AiProvider, CoachAgent};

use super::coaching_models::{AgentState, NotificationKind, RawTable, Targets};
use super::context::{self, ContextError};
use super::rules;

/// How many prior messages of a category the generator sees, to keep it from
/// repeating jokes.
pub const HISTORY_LIMIT: usize = 4;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("sheet backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sheet backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook URL is not configured")]
    NotConfigured,
    #[error("webhook delivery failed: {0}")]
    Delivery(String),
}

/// The fatal class. Everything else degrades in place.
#[derive(Debug, Error)]
pub enum CheckInError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Context(#[from] ContextError),
}

// ============================================================================
// PORTS
// ============================================================================
// The core defines what it needs from the outside world; infra provides the
// sheet- and webhook-backed implementations.

#[async_trait]
pub trait PracticeSource: Send + Sync {
    /// The practice worksheet, header row included, cells as raw strings.
    async fn fetch_table(&self) -> Result<RawTable, FetchError>;
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn read_state(&self) -> Result<AgentState, StoreError>;
    /// Overwrites the single persisted slot.
    async fn write_state(&self, state: &AgentState) -> Result<(), StoreError>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Up to `limit` most recent messages of this category, oldest first.
    async fn recent_messages(
        &self,
        kind: NotificationKind,
        limit: usize,
    ) -> Result<Vec<String>, StoreError>;

    async fn append(&self, kind: NotificationKind, message: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}

/// What a run did, for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckInOutcome {
    Sent {
        kind: NotificationKind,
        message: String,
    },
    Skipped,
}

pub struct CoachService<P: AiProvider> {
    source: Arc<dyn PracticeSource>,
    state: Arc<dyn StateStore>,
    history: Arc<dyn HistoryStore>,
    notifier: Arc<dyn Notifier>,
    agent: CoachAgent<P>,
    targets: Targets,
}

impl<P: AiProvider> CoachService<P> {
    pub fn new(
        source: Arc<dyn PracticeSource>,
        state: Arc<dyn StateStore>,
        history: Arc<dyn HistoryStore>,
        notifier: Arc<dyn Notifier>,
        agent: CoachAgent<P>,
        targets: Targets,
    ) -> Self {
        Self {
            source,
            state,
            history,
            notifier,
            agent,
            targets,
        }
    }

    /// Runs one scheduled check-in at wall time `now` (in the coach timezone).
    pub async fn run_check_in(&self, now: NaiveDateTime) -> Result<CheckInOutcome, CheckInError> {
        let table = self.source.fetch_table().await?;
        let snapshot = context::build_snapshot(&table, now, self.targets)?;

        let state = match self.state.read_state().await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("state read failed, using defaults: {e}");
                AgentState::default()
            }
        };

        tracing::info!(
            today = snapshot.today_total,
            week = snapshot.week_total_hours,
            last_daily = state.last_daily,
            goal_achieved = state.goal_achieved,
            "evaluating check-in"
        );

        let outcome = match rules::decide(now, &snapshot, &state) {
            Some(kind) => {
                let history = match self.history.recent_messages(kind, HISTORY_LIMIT).await {
                    Ok(history) => history,
                    Err(e) => {
                        tracing::warn!("history read failed, generating without it: {e}");
                        Vec::new()
                    }
                };

                let message = self.agent.generate(kind, &snapshot, &history).await;

                if let Err(e) = self.notifier.send(&message).await {
                    tracing::warn!("notification not delivered: {e}");
                }
                if let Err(e) = self.history.append(kind, &message).await {
                    tracing::warn!("history append failed: {e}");
                }

                tracing::info!(kind = kind.tag(), "sent: {message}");
                CheckInOutcome::Sent { kind, message }
            }
            None => {
                tracing::info!("goal met and nothing new - staying silent");
                CheckInOutcome::Skipped
            }
        };

        let next = rules::next_state(now, &snapshot);
        if let Err(e) = self.state.write_state(&next).await {
            tracing::warn!("state write failed: {e}");
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StubSource {
        table: RawTable,
        fail: bool,
    }

    #[async_trait]
    impl PracticeSource for StubSource {
        async fn fetch_table(&self) -> Result<RawTable, FetchError> {
            if self.fail {
                return Err(FetchError::Backend("boom".into()));
            }
            Ok(self.table.clone())
        }
    }

    #[derive(Default)]
    struct MemState {
        stored: Mutex<Option<AgentState>>,
        writes: Mutex<Vec<AgentState>>,
        fail_read: bool,
    }

    #[async_trait]
    impl StateStore for MemState {
        async fn read_state(&self) -> Result<AgentState, StoreError> {
            if self.fail_read {
                return Err(StoreError::Backend("boom".into()));
            }
            Ok(self.stored.lock().unwrap().clone().unwrap_or_default())
        }

        async fn write_state(&self, state: &AgentState) -> Result<(), StoreError> {
            self.writes.lock().unwrap().push(state.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemHistory {
        entries: Mutex<Vec<(NotificationKind, String)>>,
    }

    #[async_trait]
    impl HistoryStore for MemHistory {
        async fn recent_messages(
            &self,
            kind: NotificationKind,
            limit: usize,
        ) -> Result<Vec<String>, StoreError> {
            let matching: Vec<String> = self
                .entries
                .lock()
                .unwrap()
                .iter()
                .filter(|(k, _)| *k == kind)
                .map(|(_, m)| m.clone())
                .collect();
            let start = matching.len().saturating_sub(limit);
            Ok(matching[start..].to_vec())
        }

        async fn append(&self, kind: NotificationKind, message: &str) -> Result<(), StoreError> {
            self.entries.lock().unwrap().push((kind, message.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, message: &str) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Delivery("503".into()));
            }
            self.sent.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    struct CannedProvider;

    #[async_trait]
    impl AiProvider for CannedProvider {
        async fn complete(
            &self,
            _system: &str,
            _prompt: &str,
        ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
            Ok("Go study, no cap.".to_string())
        }
    }

    fn practice_table(rows: &[&[&str]]) -> RawTable {
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

    fn friday_morning() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn service(
        source: StubSource,
        state: Arc<MemState>,
        notifier: Arc<RecordingNotifier>,
        history: Arc<MemHistory>,
    ) -> CoachService<CannedProvider> {
        CoachService::new(
            Arc::new(source),
            state,
            history,
            notifier,
            CoachAgent::new(CannedProvider),
            Targets::default(),
        )
    }

    #[tokio::test]
    async fn progress_run_sends_logs_and_persists() {
        let state = Arc::new(MemState::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let history = Arc::new(MemHistory::default());
        let coach = service(
            StubSource {
                table: practice_table(&[&["01/03/2024", "", "", "1.5", ""]]),
                fail: false,
            },
            Arc::clone(&state),
            Arc::clone(&notifier),
            Arc::clone(&history),
        );

        let outcome = coach.run_check_in(friday_morning()).await.unwrap();

        assert!(matches!(
            outcome,
            CheckInOutcome::Sent {
                kind: NotificationKind::PostAction,
                ..
            }
        ));
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
        assert_eq!(history.entries.lock().unwrap().len(), 1);

        let writes = state.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].last_daily, 1.5);
        assert!(!writes[0].goal_achieved);
    }

    #[tokio::test]
    async fn silent_run_still_writes_state() {
        let state = Arc::new(MemState {
            stored: Mutex::new(Some(AgentState {
                last_run: "2024-03-01 08:00:00".into(),
                last_daily: 2.0,
                last_weekly: 5.0,
                goal_achieved: true,
            })),
            ..Default::default()
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let history = Arc::new(MemHistory::default());
        let coach = service(
            StubSource {
                table: practice_table(&[&["01/03/2024", "2", "", "", ""]]),
                fail: false,
            },
            Arc::clone(&state),
            Arc::clone(&notifier),
            Arc::clone(&history),
        );

        let outcome = coach.run_check_in(friday_morning()).await.unwrap();

        assert_eq!(outcome, CheckInOutcome::Skipped);
        assert!(notifier.sent.lock().unwrap().is_empty());
        assert!(history.entries.lock().unwrap().is_empty());
        assert_eq!(state.writes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn state_read_failure_falls_back_to_defaults() {
        let state = Arc::new(MemState {
            fail_read: true,
            ..Default::default()
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let coach = service(
            StubSource {
                table: practice_table(&[&["28/02/2024", "1", "", "", ""]]),
                fail: false,
            },
            Arc::clone(&state),
            Arc::clone(&notifier),
            Arc::new(MemHistory::default()),
        );

        // Defaults mean goal not achieved and nothing logged today: pre_action.
        let outcome = coach.run_check_in(friday_morning()).await.unwrap();
        assert!(matches!(
            outcome,
            CheckInOutcome::Sent {
                kind: NotificationKind::PreAction,
                ..
            }
        ));
        assert_eq!(state.writes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delivery_failure_does_not_abort_the_run() {
        let state = Arc::new(MemState::default());
        let history = Arc::new(MemHistory::default());
        let coach = service(
            StubSource {
                table: practice_table(&[&["01/03/2024", "1", "", "", ""]]),
                fail: false,
            },
            Arc::clone(&state),
            Arc::new(RecordingNotifier {
                fail: true,
                ..Default::default()
            }),
            Arc::clone(&history),
        );

        let outcome = coach.run_check_in(friday_morning()).await.unwrap();
        assert!(matches!(outcome, CheckInOutcome::Sent { .. }));
        // Message is still logged and state still written.
        assert_eq!(history.entries.lock().unwrap().len(), 1);
        assert_eq!(state.writes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_aborts_without_state_write() {
        let state = Arc::new(MemState::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let coach = service(
            StubSource {
                table: RawTable::default(),
                fail: true,
            },
            Arc::clone(&state),
            Arc::clone(&notifier),
            Arc::new(MemHistory::default()),
        );

        assert!(coach.run_check_in(friday_morning()).await.is_err());
        assert!(notifier.sent.lock().unwrap().is_empty());
        assert!(state.writes.lock().unwrap().is_empty());
    }
}
