//! Request and reply types for the chat pipeline.

use serde::{Deserialize, Serialize};

use inmo_core::types::{FilterSet, Listing};

fn default_channel() -> String {
    "web".to_string()
}

/// Inbound chat request.
///
/// Spanish field names from older clients are accepted as aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Caller-supplied filter overrides.
    #[serde(default)]
    pub filters: Option<FilterSet>,
    /// Listings shown in the previous turn.
    #[serde(default, alias = "contexto_anterior")]
    pub prior_context: Option<PriorContext>,
    /// The caller marks this message as a follow-up.
    #[serde(default, alias = "es_seguimiento")]
    pub follow_up: bool,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            channel: default_channel(),
            filters: None,
            prior_context: None,
            follow_up: false,
        }
    }

    pub fn on_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_prior_results(mut self, results: Vec<Listing>) -> Self {
        self.prior_context = Some(PriorContext { results });
        self
    }

    pub fn as_follow_up(mut self) -> Self {
        self.follow_up = true;
        self
    }

    /// Prior-turn listings, empty when none were supplied.
    pub fn prior_results(&self) -> &[Listing] {
        self.prior_context
            .as_ref()
            .map(|c| c.results.as_slice())
            .unwrap_or_default()
    }
}

/// Context carried over from the previous turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriorContext {
    #[serde(default, alias = "resultados")]
    pub results: Vec<Listing>,
}

/// Outbound chat reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_count: Option<usize>,
    pub search_performed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "propiedades")]
    pub listings: Option<Vec<Listing>>,
}
