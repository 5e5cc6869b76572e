pub mod coach_service;
pub mod coaching_models;
pub mod context;
pub mod dates;
pub mod rules;

pub use coach_service::{
    CheckInError, CheckInOutcome, CoachService, FetchError, HistoryStore, Notifier, NotifyError,
    PracticeSource, StateStore, StoreError, HISTORY_LIMIT,
};
pub use coaching_models::{AgentState, ContextSnapshot, NotificationKind, RawTable, Targets};
pub use context::ContextError;
