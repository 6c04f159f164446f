//! Whole-page cache for the global feed.
//!
//! Rendered responses for the front page are kept for a short TTL and served
//! verbatim, so a freshly published post may stay invisible there until the
//! window lapses. Every other route always renders live.
//!
//! ```toml
//! [cache]
//! enabled = true
//! index_ttl_seconds = 20
//! response_limit = 64
//! ```

mod config;
mod keys;
mod lock;
mod middleware;
mod store;

pub use config::CacheConfig;
pub use keys::{FeedKey, hash_query, hash_value};
pub use middleware::{CacheState, page_cache_layer};
pub use store::{CachedResponse, Lookup, PageStore};
