//! Conversational property search for Inmo.
//!
//! Provides rule-based filter extraction, follow-up resolution against the
//! previous turn, prompt composition and the orchestrator that ties them to
//! the listing search and the completion gateway.

pub mod composer;
pub mod error;
pub mod extractor;
pub mod follow_up;
pub mod metrics;
pub mod orchestrator;
pub mod types;

pub use composer::{PromptContext, ResponseComposer, StyleHint};
pub use error::ChatError;
pub use extractor::FilterExtractor;
pub use follow_up::{FollowUpMatch, FollowUpResolver, Resolution};
pub use metrics::{ChatMetrics, MetricsSnapshot};
pub use orchestrator::{ChatOrchestrator, EXHAUSTED_MESSAGE, FALLBACK_MESSAGE};
pub use types::{ChatReply, ChatRequest, PriorContext};
