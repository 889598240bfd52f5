//! Inmo Gateway crate - text completion behind a trait.
//!
//! The chat pipeline only sees [`CompletionGateway`]. The production
//! implementation is [`GeminiGateway`]; [`FixedGateway`] answers in-process.

use async_trait::async_trait;

pub mod error;
pub mod fixed;
pub mod gemini;

pub use error::{FailureKind, GatewayError};
pub use fixed::FixedGateway;
pub use gemini::GeminiGateway;

/// Opaque text-completion service.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Produce prose for `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String, GatewayError>;

    /// Short identifier for logs.
    fn name(&self) -> &str {
        "gateway"
    }
}
