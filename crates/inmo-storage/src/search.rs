//! Cached listing search: the query cache in front of the listing store.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use inmo_core::error::InmoError;
use inmo_core::types::{FilterSet, Listing, LoadReport};

use crate::cache::QueryCache;
use crate::listings::ListingStore;

/// Read-through search over [`ListingStore`] with a [`QueryCache`].
#[derive(Debug, Clone)]
pub struct ListingSearch {
    store: Arc<ListingStore>,
    cache: Arc<QueryCache>,
}

impl ListingSearch {
    pub fn new(store: Arc<ListingStore>, cache: Arc<QueryCache>) -> Self {
        Self { store, cache }
    }

    pub fn store(&self) -> &Arc<ListingStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Cached results when fresh; otherwise read the store and cache any
    /// non-empty result.
    pub fn search(&self, filters: &FilterSet) -> Vec<Listing> {
        if let Some(hit) = self.cache.get(filters) {
            debug!(results = hit.len(), "Query cache hit");
            return hit;
        }

        let generation = self.cache.generation();
        let results = self.store.query(filters);
        self.cache.put_at(generation, filters, &results);
        debug!(results = results.len(), "Query cache miss");
        results
    }

    /// Like [`search`](Self::search), truncated to `limit` results.
    pub fn search_limited(&self, filters: &FilterSet, limit: usize) -> Vec<Listing> {
        let mut results = self.search(filters);
        results.truncate(limit);
        results
    }

    /// Replace the catalog from a feed file and drop every cached result.
    ///
    /// A search that read the old catalog while the load ran cannot
    /// repopulate the cache afterwards; see [`QueryCache::put_at`].
    pub fn reload(&self, feed_path: &Path) -> Result<LoadReport, InmoError> {
        let report = self.store.load_feed(feed_path)?;
        let dropped = self.cache.clear();
        info!(dropped, "Query cache cleared after reload");
        Ok(report)
    }
}
