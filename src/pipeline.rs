//! Request pipeline: composes the cache, rate limiter, robots oracle,
//! and retry orchestrator into the single-request and batch entry points the
//! HTTP layer calls.
//!
//! Control flow per request: cache lookup -> rate-limit acquire -> robots
//! check -> pool-slot acquire (inside the retry orchestrator) -> retry-driven
//! fetch -> extraction -> cache-store. Port of `routes/fetch.py`'s
//! `_do_fetch`/`fetch_page`/`batch_fetch`, with the rate-limit and robots
//! steps spliced in ahead of the fetch per the pipeline's documented
//! ordering.

use crate::browser_pool::BrowserPool;
use crate::cache::{make_cache_key, ResponseCache};
use crate::config::IrisConfig;
use crate::error::FetchError;
use crate::rate_limiter::RateLimiter;
use crate::robots::RobotsOracle;
use crate::types::{BatchFetchResponse, FetchRequest, FetchResponse, PageMetadata};
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

/// Maximum number of requests accepted in one `/batch` call.
pub const MAX_BATCH_SIZE: usize = 10;

pub struct Pipeline {
    pub pool: Arc<BrowserPool>,
    pub rate_limiter: RateLimiter,
    pub robots: RobotsOracle,
    pub cache: ResponseCache,
    pub config: IrisConfig,
}

impl Pipeline {
    pub async fn new(config: IrisConfig, pool: Arc<BrowserPool>) -> Self {
        let rate_limiter = RateLimiter::new(&config).await;
        let robots = RobotsOracle::new(&config).await;
        let cache = ResponseCache::new(&config).await;
        Self {
            pool,
            rate_limiter,
            robots,
            cache,
            config,
        }
    }

    /// Run one fetch request end to end.
    pub async fn fetch(&self, request: &FetchRequest) -> FetchResponse {
        if !crate::utils::is_valid_url(&request.url) {
            return FetchResponse::error_for(&request.url, FetchError::invalid_url(&request.url));
        }

        let cache_key = request_cache_key(request);

        if request.cache {
            if let Some(mut cached) = self.cache.get(&cache_key).await {
                cached.cached = true;
                return cached;
            }
        }

        if let Some(origin) = origin_of(&request.url) {
            self.rate_limiter.acquire(&origin).await;
        }

        if !self.robots.can_fetch(&request.url).await {
            return FetchResponse::error_for(&request.url, FetchError::blocked_by_robots_txt(&request.url));
        }

        let attempt = crate::retry::fetch_with_retry(&self.pool, &self.config, request).await;

        if let Some(error) = attempt.error {
            return FetchResponse {
                url: request.url.clone(),
                status_code: attempt.status_code,
                fetch_time_ms: attempt.fetch_time_ms,
                error: Some(error),
                ..Default::default()
            };
        }

        let body_len = attempt.raw_bytes.as_ref().map(Vec::len).unwrap_or(attempt.html.len());
        if body_len > self.config.max_content_length {
            return FetchResponse {
                url: request.url.clone(),
                status_code: attempt.status_code,
                fetch_time_ms: attempt.fetch_time_ms,
                error: Some(FetchError::content_too_large(body_len, self.config.max_content_length)),
                ..Default::default()
            };
        }

        let response = self.build_response(request, attempt);

        if request.cache {
            let mut for_cache = response.clone();
            for_cache.screenshot_base64 = None;
            self.cache.set(&cache_key, &for_cache, Some(self.config.cache_ttl_seconds)).await;
        }

        response
    }

    fn build_response(&self, request: &FetchRequest, attempt: crate::types::FetchAttemptResult) -> FetchResponse {
        let max_len = self.config.max_content_length;

        let is_pdf = attempt.content_type == "application/pdf";
        let is_html = attempt.content_type == "text/html" || attempt.content_type == "application/xhtml+xml";

        let (content_text, content_html, mut metadata) = if is_pdf {
            let pdf = crate::extractors::extract_pdf(attempt.raw_bytes.as_deref().unwrap_or_default());
            let text = if request.extract_text {
                Some(crate::utils::safe_truncate_chars(&pdf.text, max_len).to_string())
            } else {
                None
            };
            let metadata = if request.extract_metadata {
                Some(PageMetadata {
                    pdf_pages: Some(pdf.pages),
                    pdf_author: pdf.author,
                    pdf_created_date: pdf.created_date,
                    title: pdf.title,
                    ..PageMetadata::default()
                })
            } else {
                None
            };
            (text, None, metadata)
        } else if is_html {
            let text = if request.extract_text {
                Some(crate::extractors::extract_text(&attempt.html, max_len))
            } else {
                None
            };
            let metadata = if request.extract_metadata {
                Some(crate::extractors::extract_metadata(&attempt.html, &request.url))
            } else {
                None
            };
            (text, Some(attempt.html.clone()), metadata)
        } else {
            // JSON / plain text / image / anything else the executor already
            // normalized: `attempt.html` is the final text body (empty for images).
            let text = if request.extract_text && !attempt.html.is_empty() {
                Some(crate::utils::safe_truncate_chars(&attempt.html, max_len).to_string())
            } else {
                None
            };
            (text, None, None)
        };

        let links = if request.extract_links && is_html {
            Some(crate::extractors::extract_links(&attempt.html, &request.url))
        } else {
            None
        };

        let structured_data = if is_html {
            crate::extractors::extract_structured_data(&attempt.html)
        } else {
            None
        };
        if structured_data.is_some() && metadata.is_none() {
            metadata = Some(PageMetadata::default());
        }

        let screenshot_base64 = attempt
            .screenshot_png
            .as_ref()
            .map(|bytes| base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes));

        let content_length = content_text.as_ref().map(String::len).unwrap_or(0) as u64;

        FetchResponse {
            url: request.url.clone(),
            status_code: attempt.status_code,
            content_text,
            content_html,
            metadata,
            links,
            structured_data,
            screenshot_base64,
            content_length,
            fetch_time_ms: attempt.fetch_time_ms,
            cached: false,
            error: None,
        }
    }

    /// Run up to `MAX_BATCH_SIZE` requests concurrently, preserving the
    /// caller's request order in the results. A panicking/erroring task
    /// never fails the whole batch, it becomes a `browser_error` response
    /// for that one URL.
    pub async fn fetch_batch(&self, requests: &[FetchRequest]) -> BatchFetchResponse {
        let start = Instant::now();

        let futures = requests.iter().map(|request| async move {
            match tokio::time::timeout(
                std::time::Duration::from_millis(self.config.page_timeout_ms * 2 + 60_000),
                self.fetch(request),
            )
            .await
            {
                Ok(response) => response,
                Err(_) => FetchResponse::error_for(
                    &request.url,
                    FetchError::new(crate::error::FetchErrorType::BrowserError, "Request timed out", false),
                ),
            }
        });

        let results = join_all(futures).await;

        BatchFetchResponse {
            results,
            total_time_ms: start.elapsed().as_millis() as u64,
        }
    }
}

fn origin_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}

fn request_cache_key(request: &FetchRequest) -> String {
    make_cache_key(
        &request.url,
        &[
            ("extract_text", json!(request.extract_text)),
            ("extract_links", json!(request.extract_links)),
            ("extract_metadata", json!(request.extract_metadata)),
            ("screenshot", json!(request.screenshot)),
            ("wait_strategy", json!(request.wait_strategy)),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_of_includes_explicit_port() {
        assert_eq!(
            origin_of("https://example.com:8443/page").as_deref(),
            Some("https://example.com:8443")
        );
        assert_eq!(origin_of("https://example.com/page").as_deref(), Some("https://example.com"));
    }

    #[test]
    fn cache_key_depends_only_on_shape_affecting_fields() {
        let a = FetchRequest {
            url: "https://example.com/".to_string(),
            wait_for_selector: None,
            wait_strategy: Default::default(),
            wait_after_load_ms: None,
            extract_text: true,
            extract_links: false,
            extract_metadata: true,
            screenshot: false,
            timeout_ms: Some(1234),
            cache: true,
            headers: None,
        };
        let b = FetchRequest {
            timeout_ms: Some(9999),
            ..a.clone()
        };
        assert_eq!(request_cache_key(&a), request_cache_key(&b));
    }
}
