//! Cache storage for rendered feed pages.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;

use super::config::CacheConfig;
use super::keys::FeedKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// Cached HTTP response with the instant it was stored.
#[derive(Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub stored_at: Instant,
}

impl CachedResponse {
    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }
}

/// Outcome of a cache lookup.
pub enum Lookup {
    Hit(CachedResponse),
    /// An entry existed but its TTL had lapsed; it has been evicted.
    Expired,
    Miss,
}

/// TTL-bounded response store. Entries past their TTL are evicted on read,
/// so a page is rendered at most once per window per key. Concurrent misses
/// may both render; the later store wins, which is harmless for identical
/// content.
pub struct PageStore {
    responses: RwLock<LruCache<FeedKey, CachedResponse>>,
    ttl: Duration,
}

impl PageStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            responses: RwLock::new(LruCache::new(config.response_limit_non_zero())),
            ttl: config.index_ttl(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &FeedKey) -> Lookup {
        let mut responses = rw_write(&self.responses, SOURCE, "get");
        match responses.get(key) {
            Some(cached) if cached.age() < self.ttl => Lookup::Hit(cached.clone()),
            Some(_) => {
                responses.pop(key);
                Lookup::Expired
            }
            None => Lookup::Miss,
        }
    }

    pub fn set(&self, key: FeedKey, response: CachedResponse) -> Option<FeedKey> {
        rw_write(&self.responses, SOURCE, "set")
            .push(key, response)
            .map(|(evicted_key, _)| evicted_key)
    }

    /// Number of cached responses, expired entries included.
    pub fn len(&self) -> usize {
        rw_read(&self.responses, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
