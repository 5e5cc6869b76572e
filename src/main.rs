// This is the entry point of the Chaos Coach bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (date bucketing, aggregation, rules, prompts)
// - `infra/` = Implementations of core traits (Google Sheets, Gemini, webhook)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Run the check-in loop on the configured schedule

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with a pile of identical mod.rs files.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

mod schedule;

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use chrono_tz::Tz;

use crate::core::ai::CoachAgent;
use crate::core::coaching::{CoachService, HistoryStore, PracticeSource, StateStore, Targets};
use crate::infra::ai::GeminiClient;
use crate::infra::discord::DiscordWebhookNotifier;
use crate::infra::sheets::{ServiceAccountAuth, SheetStore, SheetsClient};

const DEFAULT_GEMINI_MODEL: &str = "gemini-flash-lite-latest";
const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Paris;
const GEMINI_TEMPERATURE: f32 = 0.9;

fn env_f64(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // ========================================================================
    // CONFIGURATION
    // ========================================================================

    let sheet_key =
        std::env::var("SHEET_KEY").context("Missing SHEET_KEY environment variable")?;
    let gemini_api_key =
        std::env::var("GEMINI_API_KEY").context("Missing GEMINI_API_KEY environment variable")?;
    let gemini_model =
        std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string());
    let worksheet = std::env::var("PRACTICE_WORKSHEET").ok();

    // All wall-clock decisions (practice day, weekly check, schedule) happen
    // in the coach timezone, wherever the process runs.
    let tz = std::env::var("COACH_TZ")
        .ok()
        .and_then(|v| Tz::from_str(&v).ok())
        .unwrap_or(DEFAULT_TIMEZONE);

    let targets = Targets {
        daily: env_f64("DAILY_TARGET", Targets::default().daily),
        weekly: env_f64("WEEKLY_TARGET", Targets::default().weekly),
    };
    let hours = schedule::parse_hours(&std::env::var("SCHEDULE_HOURS").unwrap_or_default());
    // RUN_ONCE=true does a single check-in and exits, for external cron.
    let run_once = env_flag("RUN_ONCE");

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let auth = ServiceAccountAuth::from_env()
        .await
        .map_err(|e| anyhow::anyhow!("Google service account credentials: {e}"))?;
    let sheets = Arc::new(SheetsClient::new(auth));
    let store = Arc::new(SheetStore::new(
        Arc::clone(&sheets),
        sheet_key,
        worksheet,
        tz,
    ));

    let agent = CoachAgent::new(GeminiClient::new(
        gemini_api_key,
        gemini_model,
        GEMINI_TEMPERATURE,
    ));
    let notifier = Arc::new(DiscordWebhookNotifier::from_env());

    let coach = CoachService::new(
        Arc::clone(&store) as Arc<dyn PracticeSource>,
        Arc::clone(&store) as Arc<dyn StateStore>,
        Arc::clone(&store) as Arc<dyn HistoryStore>,
        notifier,
        agent,
        targets,
    );

    tracing::info!(%tz, ?hours, run_once, "Chaos Coach is up");

    // ========================================================================
    // CHECK-IN LOOP
    // ========================================================================

    loop {
        if !run_once {
            let now = chrono::Utc::now().with_timezone(&tz).naive_local();
            let next = schedule::next_run_after(now, &hours);
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::info!("next check-in at {next}");
            tokio::time::sleep(wait).await;
        }

        let now = chrono::Utc::now().with_timezone(&tz).naive_local();
        match coach.run_check_in(now).await {
            Ok(outcome) => tracing::info!(?outcome, "check-in finished"),
            Err(e) => tracing::error!("check-in aborted: {e}"),
        }

        if run_once {
            break;
        }
    }

    Ok(())
}
