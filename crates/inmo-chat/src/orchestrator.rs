//! Chat orchestrator - one exchange from user message to generated reply.
//!
//! Pipeline:
//! 1. validate the message
//! 2. gather history and catalog facets
//! 3. resolve follow-ups against the previous turn's listings
//! 4. merge caller filters with extracted ones and search when warranted
//! 5. compose the prompt and call the gateway (no lock held)
//! 6. log the exchange and update metrics

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use inmo_core::config::{ChatConfig, VocabularyConfig};
use inmo_core::types::{ConversationEntry, FilterSet, Listing};
use inmo_gateway::{CompletionGateway, GatewayError};
use inmo_storage::{ConversationLog, ListingSearch};

use crate::composer::{PromptContext, ResponseComposer};
use crate::error::ChatError;
use crate::extractor::FilterExtractor;
use crate::follow_up::FollowUpResolver;
use crate::metrics::ChatMetrics;
use crate::types::{ChatReply, ChatRequest};

/// Reply when every credential failed.
pub const EXHAUSTED_MESSAGE: &str =
    "Disculpá, en este momento no puedo generar una respuesta. Por favor, intentá más tarde.";

/// Reply for any other generation failure.
pub const FALLBACK_MESSAGE: &str =
    "Ocurrió un error procesando tu consulta. Por favor, intentá nuevamente en unos momentos.";

pub struct ChatOrchestrator {
    search: Arc<ListingSearch>,
    log: Arc<ConversationLog>,
    gateway: Arc<dyn CompletionGateway>,
    metrics: Arc<ChatMetrics>,
    extractor: FilterExtractor,
    follow_up: FollowUpResolver,
    composer: ResponseComposer,
    config: ChatConfig,
}

impl ChatOrchestrator {
    pub fn new(
        search: Arc<ListingSearch>,
        log: Arc<ConversationLog>,
        gateway: Arc<dyn CompletionGateway>,
        metrics: Arc<ChatMetrics>,
        config: ChatConfig,
        vocabulary: VocabularyConfig,
    ) -> Self {
        Self {
            search,
            log,
            gateway,
            metrics,
            extractor: FilterExtractor::new(vocabulary.clone()),
            follow_up: FollowUpResolver::new(vocabulary),
            composer: ResponseComposer::new(&config),
            config,
        }
    }

    pub fn metrics(&self) -> &Arc<ChatMetrics> {
        &self.metrics
    }

    pub fn search(&self) -> &Arc<ListingSearch> {
        &self.search
    }

    /// Run one exchange.
    ///
    /// Only validation errors are returned; generation failures are answered
    /// with a fallback message and still logged.
    pub async fn handle(&self, request: &ChatRequest) -> Result<ChatReply, ChatError> {
        let started = Instant::now();
        self.metrics.record_request();

        let message = match self.validate(&request.message) {
            Ok(m) => m,
            Err(e) => {
                self.metrics.record_failure();
                return Err(e);
            }
        };
        let channel = match request.channel.trim() {
            "" => "web",
            c => c,
        };

        let history = self.log.recent_messages(channel, self.config.history_window);
        let facets = self.search.store().facets();

        // Follow-up
        let prior = request.prior_results();
        let is_follow_up = request.follow_up || self.follow_up.is_follow_up(message);
        let detail = if is_follow_up {
            self.follow_up.resolve(message, prior).map(|m| {
                debug!(id = %m.listing.id, resolution = ?m.resolution, "Follow-up resolved");
                self.refresh(m.listing)
            })
        } else {
            None
        };

        // Filters and search
        let filters = effective_filters(&self.extractor, request);

        let searching = !filters.is_empty() && !(is_follow_up && !prior.is_empty());
        let (results, search_performed): (Option<Vec<Listing>>, bool) = if searching {
            self.metrics.record_search();
            (Some(self.search.search(&filters)), true)
        } else if !prior.is_empty() {
            (Some(prior.to_vec()), true)
        } else {
            (None, false)
        };

        // Generation
        let prompt = self.composer.compose(&PromptContext {
            user_text: message,
            listings: results.as_deref(),
            detail: detail.as_ref(),
            filters: &filters,
            channel,
            facets: &facets,
            history: &history,
        });

        self.metrics.record_gateway_call();
        let (response, generated) = match self.gateway.complete(&prompt).await {
            Ok(text) => (text, true),
            Err(e) => {
                warn!(
                    gateway = self.gateway.name(),
                    kind = %e.kind(),
                    error = %e,
                    "Generation failed"
                );
                (fallback_for(&e).to_string(), false)
            }
        };

        // Bookkeeping
        let results_count = results.as_ref().map_or(0, |r| r.len());
        let elapsed = started.elapsed().as_secs_f64();
        let mut entry = ConversationEntry::new(channel, message, &response);
        entry.response_time = elapsed;
        entry.search_performed = search_performed;
        entry.results_count = u32::try_from(results_count).unwrap_or(u32::MAX);
        self.log.append(&entry);

        if generated {
            self.metrics.record_success();
        } else {
            self.metrics.record_failure();
        }

        info!(
            channel,
            follow_up = is_follow_up,
            search_performed,
            results = results_count,
            elapsed_ms = (elapsed * 1000.0) as u64,
            "Chat exchange completed"
        );

        let listings = match results {
            Some(r) if !r.is_empty() => Some(r),
            _ if !prior.is_empty() => Some(prior.to_vec()),
            _ => None,
        };

        Ok(ChatReply {
            response,
            results_count: (results_count > 0).then_some(results_count),
            search_performed,
            listings,
        })
    }

    fn validate<'a>(&self, message: &'a str) -> Result<&'a str, ChatError> {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let max = self.config.max_message_length;
        if trimmed.chars().count() > max {
            return Err(ChatError::MessageTooLong(max));
        }
        Ok(trimmed)
    }

    /// Prefer the stored copy of a listing over the one the client echoed back.
    fn refresh(&self, listing: &Listing) -> Listing {
        let store = self.search.store();
        let stored = match store.find_by_id(&listing.id) {
            Ok(Some(found)) => Some(found),
            Ok(None) if !listing.title.is_empty() => {
                store.find_by_title(&listing.title).unwrap_or_else(|e| {
                    warn!(error = %e, "Title lookup failed");
                    None
                })
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Listing lookup failed");
                None
            }
        };
        stored.unwrap_or_else(|| listing.clone())
    }
}

impl std::fmt::Debug for ChatOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatOrchestrator")
            .field("gateway", &self.gateway.name())
            .field("config", &self.config)
            .finish()
    }
}

fn fallback_for(err: &GatewayError) -> &'static str {
    match err {
        GatewayError::Exhausted { .. } => EXHAUSTED_MESSAGE,
        _ => FALLBACK_MESSAGE,
    }
}

/// Filters a request would search with, without running the exchange.
pub fn effective_filters(extractor: &FilterExtractor, request: &ChatRequest) -> FilterSet {
    request
        .filters
        .clone()
        .unwrap_or_default()
        .merge(&extractor.extract(&request.message))
}
