//! Application state shared across all route handlers.
//!
//! AppState wires the storage, search, chat and gateway components together
//! once at startup. It is passed to handlers via axum's State extractor.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use inmo_chat::{ChatMetrics, ChatOrchestrator};
use inmo_core::config::InmoConfig;
use inmo_gateway::CompletionGateway;
use inmo_storage::{ConversationLog, Database, ListingSearch, ListingStore, QueryCache};

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, fixed at startup.
    pub config: Arc<InmoConfig>,
    /// Cached listing search.
    pub search: Arc<ListingSearch>,
    /// Conversation log.
    pub log: Arc<ConversationLog>,
    /// Chat pipeline.
    pub chat: Arc<ChatOrchestrator>,
    /// Request counters.
    pub metrics: Arc<ChatMetrics>,
    /// Completion gateway, shared with the chat pipeline.
    pub gateway: Arc<dyn CompletionGateway>,
    /// Listings feed used by `/admin/reload`.
    pub feed_path: Option<PathBuf>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Build every component from the configuration and an open database.
    pub fn new(
        config: InmoConfig,
        database: Arc<Database>,
        gateway: Arc<dyn CompletionGateway>,
    ) -> Self {
        let store = Arc::new(ListingStore::with_result_limit(
            database.clone(),
            config.storage.result_limit,
        ));
        let cache = Arc::new(QueryCache::new(Duration::from_secs(config.cache.ttl_secs)));
        let search = Arc::new(ListingSearch::new(store, cache));
        let log = Arc::new(ConversationLog::new(database));
        let metrics = Arc::new(ChatMetrics::new());

        let chat = Arc::new(ChatOrchestrator::new(
            search.clone(),
            log.clone(),
            gateway.clone(),
            metrics.clone(),
            config.chat.clone(),
            config.vocabulary.clone(),
        ));

        let feed_path = config.storage.feed_path.as_ref().map(PathBuf::from);

        Self {
            config: Arc::new(config),
            search,
            log,
            chat,
            metrics,
            gateway,
            feed_path,
            start_time: Instant::now(),
        }
    }

    /// Replace the feed used by `/admin/reload`.
    pub fn with_feed_path(mut self, feed_path: Option<PathBuf>) -> Self {
        self.feed_path = feed_path;
        self
    }
}
