//! Health aggregation: assembles `/health`'s response from the
//! browser pool, cache, and process start time.
//!
//! Port of `routes/health.py::health`. `sentinel_connected` is always
//! `false`, since the outbound gateway/satellite client it originally
//! reported on is out of scope, but the field is kept so the wire shape
//! matches.

use crate::cache::ResponseCache;
use crate::browser_pool::BrowserPool;
use crate::types::HealthResponse;
use std::sync::Arc;
use std::time::Instant;

pub const SERVICE_NAME: &str = "iris";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn health(pool: &Arc<BrowserPool>, cache: &ResponseCache, started_at: Instant) -> HealthResponse {
    HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
        version: SERVICE_VERSION.to_string(),
        browser_connected: pool.is_connected(),
        cache_connected: cache.is_connected(),
        sentinel_connected: false,
        active_pages: pool.active_pages(),
        uptime_seconds: started_at.elapsed().as_secs_f64(),
    }
}
