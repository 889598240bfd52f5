//! Time-boxed query result cache.
//!
//! Keys are the canonical JSON form of a normalized filter set. Entries are
//! valid while younger than the TTL. An expired entry is a miss; it is
//! dropped on the lookup that finds it or on the next `put`, whichever
//! comes first.
//!
//! Every `clear` starts a new generation. A result read from the store
//! before a clear can only be stored under the generation it was read in,
//! so a reload never gets overwritten by results from the old catalog.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use inmo_core::types::{FilterSet, Listing};

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CacheEntry {
    listings: Vec<Listing>,
    created_at: Instant,
}

/// Mutex-guarded map from filter-set key to result sequence.
#[derive(Debug)]
pub struct QueryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    generation: AtomicU64,
    ttl: Duration,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current generation. Read it before querying the store and hand it
    /// to [`put_at`](Self::put_at).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Option<MutexGuard<'_, HashMap<String, CacheEntry>>> {
        match self.entries.lock() {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!("Query cache lock poisoned: {}", e);
                None
            }
        }
    }

    /// Cached results for `filters`, if present and not expired.
    pub fn get(&self, filters: &FilterSet) -> Option<Vec<Listing>> {
        let key = filters.cache_key();
        let mut entries = self.lock()?;

        let expired = match entries.get(&key) {
            None => return None,
            Some(entry) => entry.created_at.elapsed() >= self.ttl,
        };

        if expired {
            entries.remove(&key);
            debug!(%key, "Cache entry expired");
            return None;
        }

        entries.get(&key).map(|entry| entry.listings.clone())
    }

    /// Store results for `filters`. Empty result sets are never cached.
    pub fn put(&self, filters: &FilterSet, listings: &[Listing]) {
        self.put_at(self.generation(), filters, listings);
    }

    /// Store results read during `generation`. Returns false, storing
    /// nothing, when the results are empty or the cache was cleared since.
    ///
    /// Expired entries are evicted on every store.
    pub fn put_at(&self, generation: u64, filters: &FilterSet, listings: &[Listing]) -> bool {
        if listings.is_empty() {
            return false;
        }
        let key = filters.cache_key();
        let Some(mut entries) = self.lock() else {
            return false;
        };

        // Checked under the lock: `clear` bumps the generation while holding it.
        if generation != self.generation() {
            debug!(%key, "Discarding results read before the last clear");
            return false;
        }

        let before = entries.len();
        entries.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, "Evicted expired cache entries");
        }

        entries.insert(
            key,
            CacheEntry {
                listings: listings.to_vec(),
                created_at: Instant::now(),
            },
        );
        true
    }

    /// Whether a live entry exists for `filters`.
    pub fn contains(&self, filters: &FilterSet) -> bool {
        let key = filters.cache_key();
        self.lock()
            .and_then(|entries| {
                entries
                    .get(&key)
                    .map(|entry| entry.created_at.elapsed() < self.ttl)
            })
            .unwrap_or(false)
    }

    /// Drop every entry and start a new generation. Returns how many
    /// entries were removed.
    pub fn clear(&self) -> usize {
        match self.lock() {
            Some(mut entries) => {
                self.generation.fetch_add(1, Ordering::SeqCst);
                let removed = entries.len();
                entries.clear();
                removed
            }
            None => 0,
        }
    }

    /// Number of stored entries, expired ones included until evicted.
    pub fn len(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
