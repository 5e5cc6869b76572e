// The Chaos Coach persona and the per-category instruction templates.
//
// Templates use `{placeholder}` substitution: `{data_json}` and `{history}`
// are always available, plus every field of the serialized context snapshot.
// Substitution is best-effort - an unknown placeholder is left in place
// rather than failing the run.

use crate::core::coaching::{ContextSnapshot, NotificationKind};

pub const SYSTEM_PROMPT: &str = r#"You are "Chaos Coach", a hyper-aware, slightly unhinged AI accountability partner for an English learner.
Your goal: hijack the user's dopamine loop so they actually practice.

TONE GUIDELINES:
1. Be unpredictable: drill sergeant one message, hype best friend the next, tired philosopher after that.
2. Internet slang is encouraged ("no cap", "cooked", "main character energy", "segfault").
3. Be data-obsessed: quote the exact numbers from the context.

FORMATTING RULES (CRITICAL):
- OUTPUT IS A SINGLE TEXT MESSAGE, MAX 280 CHARACTERS.
- Plain text only: no markdown headers, no bullet points, no "here is your analysis" intros.
- Always include one joke, and NEVER reuse a joke that appears in the past-messages list."#;

const PRE_ACTION: &str = r#"CONTEXT DATA:
{data_json}

PAST MESSAGES OF THIS KIND (do not repeat these jokes):
{history}

MISSION:
Zero progress today and the clock is running. Generate one panic-inducing text.
- Mention that only {days_remaining_in_week} days remain to hit the {weekly_target}h weekly target.
- Find the weakest skill in the week distribution and COMMAND 15 minutes of it right now.
- Aggressive but funny."#;

const POST_ACTION: &str = r#"CONTEXT DATA:
{data_json}

PAST MESSAGES OF THIS KIND (do not repeat these jokes):
{history}

MISSION:
The user just logged practice. React to it specifically.
- If today_total beats daily_target, hype them up. Otherwise say exactly how many hours are left to survive.
- If Writing or Speaking are being ignored, roast them for farming low-XP mobs with Reading/Listening.
- Keep it under 50 words."#;

const WEEKLY_SUMMARY: &str = r#"CONTEXT DATA:
{data_json}

PAST MESSAGES OF THIS KIND (do not repeat these jokes):
{history}

MISSION:
Weekly review. Short and punchy.
- Compare Current Week against the earlier weeks in the trend: up means "evolving", down means "flopped".
- Call out the distribution imbalance, especially if Speaking sits at 0%.
- Close with one weird challenge for next week (talk to a toaster, narrate your breakfast).
- Weave the stats into the roast instead of listing them."#;

fn template_for(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::PreAction => PRE_ACTION,
        NotificationKind::PostAction => POST_ACTION,
        NotificationKind::WeeklySummary => WEEKLY_SUMMARY,
    }
}

/// Hydrates the template for `kind` with the snapshot and recent history.
pub fn render(kind: NotificationKind, snapshot: &ContextSnapshot, history: &[String]) -> String {
    let data_json =
        serde_json::to_string_pretty(snapshot).unwrap_or_else(|_| "{}".to_string());
    let history_block = if history.is_empty() {
        "(no past messages yet)".to_string()
    } else {
        history
            .iter()
            .map(|m| format!("- {m}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut out = template_for(kind)
        .replace("{data_json}", &data_json)
        .replace("{history}", &history_block);

    if let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(snapshot) {
        for (key, value) in fields {
            let needle = format!("{{{key}}}");
            if out.contains(&needle) {
                let rendered = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                out = out.replace(&needle, &rendered);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> ContextSnapshot {
        ContextSnapshot {
            current_time: "21:00".into(),
            today_total: 0.0,
            daily_target: 2.0,
            weekly_target: 14.0,
            days_remaining_in_week: 4,
            todays_practice: "No practice yet".into(),
            week_total_hours: 3.5,
            weekly_average: 1.2,
            week_distribution: "Listening:100%".into(),
            four_week_trend: "Week 1: 5.0h, Current Week: 3.5h".into(),
        }
    }

    #[test]
    fn substitutes_snapshot_fields() {
        let out = render(NotificationKind::PreAction, &snapshot(), &[]);
        assert!(out.contains("only 4 days remain"));
        assert!(out.contains("14.0h weekly target"));
        assert!(!out.contains("{days_remaining_in_week}"));
        assert!(!out.contains("{data_json}"));
    }

    #[test]
    fn embeds_the_snapshot_json() {
        let out = render(NotificationKind::WeeklySummary, &snapshot(), &[]);
        assert!(out.contains("\"week_total_hours\": 3.5"));
        assert!(out.contains("Current Week: 3.5h"));
    }

    #[test]
    fn renders_history_as_bullets() {
        let history = vec!["old joke one".to_string(), "old joke two".to_string()];
        let out = render(NotificationKind::PostAction, &snapshot(), &history);
        assert!(out.contains("- old joke one\n- old joke two"));

        let empty = render(NotificationKind::PostAction, &snapshot(), &[]);
        assert!(empty.contains("(no past messages yet)"));
    }
}
