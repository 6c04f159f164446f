//! Response cache middleware for the global feed route.
//!
//! Serves cached renderings of GET requests while they are inside the TTL
//! window and stores fresh 200 responses on the way out. The router attaches
//! this layer to the front page only.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;
use tracing::{debug, instrument};

use super::{
    CacheConfig, PageStore,
    keys::FeedKey,
    store::{CachedResponse, Lookup},
};

/// Shared cache state for middleware.
#[derive(Clone)]
pub struct CacheState {
    pub config: CacheConfig,
    pub store: Arc<PageStore>,
}

impl CacheState {
    pub fn new(config: CacheConfig) -> Self {
        let store = Arc::new(PageStore::new(&config));
        Self { config, store }
    }
}

/// Middleware caching whole rendered pages.
///
/// Only GET requests are considered and only 200 responses are stored. The
/// key includes the raw query string, so each page parameter caches its own
/// rendering.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn page_cache_layer(
    State(cache): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.config.enabled {
        return next.run(request).await;
    }

    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or("");
    let key = FeedKey::new(path, query);

    match cache.store.get(&key) {
        Lookup::Hit(cached) => {
            counter!("brusio_page_cache_hit_total").increment(1);
            debug!(outcome = "hit", "serving cached page");
            return build_response(cached);
        }
        Lookup::Expired => {
            counter!("brusio_page_cache_expired_total").increment(1);
            debug!(outcome = "expired", "cached page lapsed, re-rendering");
        }
        Lookup::Miss => {
            counter!("brusio_page_cache_miss_total").increment(1);
            debug!(outcome = "miss", "no cached page, rendering");
        }
    }

    let response = next.run(request).await;

    // Only cache successful renderings
    if response.status() == StatusCode::OK {
        let (parts, body) = response.into_parts();
        let bytes = match axum::body::to_bytes(body, 1024 * 1024).await {
            Ok(b) => b,
            Err(_) => {
                // If body collection fails, return without caching
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let cached = CachedResponse {
            status: parts.status.as_u16(),
            headers: parts
                .headers
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
                .collect(),
            body: bytes.clone(),
            stored_at: std::time::Instant::now(),
        };

        cache.store.set(key, cached);
        counter!("brusio_page_cache_store_total").increment(1);

        Response::from_parts(parts, Body::from(bytes))
    } else {
        response
    }
}

/// Build a response from cached data.
fn build_response(cached: CachedResponse) -> Response {
    use axum::http::HeaderValue;

    let mut builder = Response::builder().status(cached.status);

    for (name, value) in cached.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }

    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
