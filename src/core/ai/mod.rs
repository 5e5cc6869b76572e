pub mod coach_agent;
pub mod prompts;

pub use coach_agent::{AiProvider, CoachAgent, FALLBACK_MESSAGE, MAX_MESSAGE_CHARS};
