use async_trait::async_trait;
use std::error::Error;

use crate::core::coaching::{ContextSnapshot, NotificationKind};

use super::prompts;

/// Hard cap on outgoing messages. Anything longer is cut, not rejected.
pub const MAX_MESSAGE_CHARS: usize = 280;

/// What goes out when the model call fails. The notification still happens,
/// just without the wit.
pub const FALLBACK_MESSAGE: &str = "Chaos Coach just blue-screened. No excuses though: go study.";

/// A text-completion backend: one system persona string, one instruction
/// string, one generated text back.
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<String, Box<dyn Error + Send + Sync>>;
}

// Blanket implementation so the service can hold a trait object if it ever
// needs to switch providers at runtime.
#[async_trait]
impl AiProvider for Box<dyn AiProvider> {
    async fn complete(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        (**self).complete(system, prompt).await
    }
}

/// Generates the coaching messages. Infallible by contract: provider errors
/// degrade to [`FALLBACK_MESSAGE`] instead of propagating.
pub struct CoachAgent<P: AiProvider> {
    provider: P,
}

impl<P: AiProvider> CoachAgent<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub async fn generate(
        &self,
        kind: NotificationKind,
        snapshot: &ContextSnapshot,
        history: &[String],
    ) -> String {
        let prompt = prompts::render(kind, snapshot, history);

        match self.provider.complete(prompts::SYSTEM_PROMPT, &prompt).await {
            Ok(text) => cap(text.trim()),
            Err(e) => {
                tracing::error!(kind = kind.tag(), "generation failed: {e}");
                FALLBACK_MESSAGE.to_string()
            }
        }
    }
}

fn cap(text: &str) -> String {
    text.chars().take(MAX_MESSAGE_CHARS).collect()
}
