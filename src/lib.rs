#![feature(integer_atomics)]

//! Iris: a headless-browser fetch service. Renders a URL in a shared,
//! pooled Chromium instance behind per-origin rate limiting and robots.txt
//! consultation, retries transient failures with backoff, and returns
//! normalized text/metadata/links/structured-data alongside the response
//! cache.

pub mod browser_pool;
pub mod browser_profile;
pub mod browser_setup;
pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod extractors;
pub mod health;
pub mod http;
pub mod logging;
pub mod pipeline;
pub mod rate_limiter;
pub mod retry;
pub mod robots;
pub mod types;
pub mod utils;
pub mod wait_engine;

pub use browser_pool::{BrowserPool, BrowserPoolConfig, PooledBrowserGuard};
pub use browser_setup::{apply_stealth_measures, find_browser_executable, launch_browser};
pub use cache::{make_cache_key, ResponseCache};
pub use config::IrisConfig;
pub use error::{classify_error, classify_http_error, FetchError, FetchErrorType};
pub use pipeline::Pipeline;
pub use rate_limiter::RateLimiter;
pub use robots::RobotsOracle;
pub use types::*;

use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Build the shared browser pool, start it, and assemble the request
/// pipeline the HTTP layer will drive. Split out from `start_server` so
/// tests can construct a pipeline without binding a socket.
pub async fn build_pipeline(config: IrisConfig) -> anyhow::Result<Arc<Pipeline>> {
    let pool = BrowserPool::new(BrowserPoolConfig {
        headless: config.headless,
        max_concurrent_pages: config.max_concurrent_pages,
        testing_mode: config.testing_mode,
    });
    pool.start().await?;

    Ok(Arc::new(Pipeline::new(config, pool).await))
}

/// Run the HTTP server until the process is signaled to stop. Binds
/// `config.host:config.port`.
pub async fn start_server(config: IrisConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let pipeline = build_pipeline(config).await?;

    let state = http::AppState {
        pipeline,
        started_at: Instant::now(),
    };
    let app = http::router(state);

    info!("Iris listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
