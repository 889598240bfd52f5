//! In-process gateway with a canned outcome.
//!
//! Records every prompt it receives so callers can inspect what the
//! composer produced.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::CompletionGateway;

enum Outcome {
    Reply(String),
    Exhausted,
    NoCredentials,
}

/// Gateway that always answers the same way.
pub struct FixedGateway {
    outcome: Outcome,
    prompts: Mutex<Vec<String>>,
}

impl FixedGateway {
    /// Always reply with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::with_outcome(Outcome::Reply(text.into()))
    }

    /// Always fail as if every credential were rate limited.
    pub fn exhausted() -> Self {
        Self::with_outcome(Outcome::Exhausted)
    }

    /// Always fail with no credentials.
    pub fn unconfigured() -> Self {
        Self::with_outcome(Outcome::NoCredentials)
    }

    fn with_outcome(outcome: Outcome) -> Self {
        Self {
            outcome,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// The most recent prompt, if any.
    pub fn last_prompt(&self) -> Option<String> {
        self.prompts().pop()
    }
}

#[async_trait]
impl CompletionGateway for FixedGateway {
    async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        match &self.outcome {
            Outcome::Reply(text) => Ok(text.clone()),
            Outcome::Exhausted => Err(GatewayError::Exhausted {
                attempts: 1,
                last: Box::new(GatewayError::RateLimited("HTTP 429".to_string())),
            }),
            Outcome::NoCredentials => Err(GatewayError::NoCredentials),
        }
    }

    fn name(&self) -> &str {
        "fixed"
    }
}
