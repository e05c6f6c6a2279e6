//! Retry Orchestrator: drives the Fetch Executor across attempts, holding a
//! single browser-pool slot for the whole loop.
//!
//! Port of the retry loop inside `fetcher.py::PageFetcher.fetch`. The pool
//! slot (there, the `asyncio.Semaphore`) is acquired once before the first
//! attempt and released only after the loop exits, so retries never compete
//! with other requests for the slot they already hold.

use crate::browser_pool::BrowserPool;
use crate::config::IrisConfig;
use crate::error::FetchError;
use crate::types::{FetchAttemptResult, FetchRequest, WaitStrategy};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Run `request` to completion: acquire a pool slot, attempt the fetch up to
/// `max_retries + 1` times with exponential backoff between attempts, and
/// return whichever attempt succeeded or the last attempt if none did.
pub async fn fetch_with_retry(pool: &Arc<BrowserPool>, config: &IrisConfig, request: &FetchRequest) -> FetchAttemptResult {
    let guard = match pool.acquire().await {
        Ok(guard) => guard,
        Err(e) => {
            return FetchAttemptResult {
                status_code: 0,
                content_type: "text/html".to_string(),
                html: String::new(),
                raw_bytes: None,
                screenshot_png: None,
                fetch_time_ms: 0,
                error: Some(FetchError::new(
                    crate::error::FetchErrorType::BrowserError,
                    e.to_string(),
                    false,
                )),
            };
        }
    };

    let effective_strategy = effective_wait_strategy(request);
    let timeout_ms = request.timeout_ms.unwrap_or(config.page_timeout_ms);
    let wait_after_load_ms = request.wait_after_load_ms.unwrap_or(config.wait_after_load_ms);
    let max_retries = config.max_retries;

    let mut last = None;
    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff = Duration::from_secs(1u64 << (attempt - 1));
            info!(
                "Retry {}/{} for {} (backoff {:?})",
                attempt, max_retries, request.url, backoff
            );
            tokio::time::sleep(backoff).await;
        }

        let result = crate::executor::fetch_once(
            guard.browser(),
            request,
            effective_strategy,
            timeout_ms,
            wait_after_load_ms,
        )
        .await;

        let should_retry = result
            .error
            .as_ref()
            .map(|e| e.retryable && attempt < max_retries)
            .unwrap_or(false);

        if !should_retry {
            return result;
        }
        last = Some(result);
    }

    last.expect("loop runs at least once since max_retries + 1 >= 1")
}

/// `Load` + an explicit selector upgrades to `Selector`, same as the original
/// `effective_strategy` computation.
fn effective_wait_strategy(request: &FetchRequest) -> WaitStrategy {
    if request.wait_strategy == WaitStrategy::Load && request.wait_for_selector.is_some() {
        WaitStrategy::Selector
    } else {
        request.wait_strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_strategy_upgrades_to_selector_when_selector_given() {
        let request = FetchRequest {
            url: "https://example.com".to_string(),
            wait_for_selector: Some(".content".to_string()),
            wait_strategy: WaitStrategy::Load,
            wait_after_load_ms: None,
            extract_text: true,
            extract_links: false,
            extract_metadata: true,
            screenshot: false,
            timeout_ms: None,
            cache: true,
            headers: None,
        };
        assert_eq!(effective_wait_strategy(&request), WaitStrategy::Selector);
    }

    #[test]
    fn non_load_strategy_is_unaffected_by_selector() {
        let request = FetchRequest {
            url: "https://example.com".to_string(),
            wait_for_selector: Some(".content".to_string()),
            wait_strategy: WaitStrategy::NetworkIdle,
            wait_after_load_ms: None,
            extract_text: true,
            extract_links: false,
            extract_metadata: true,
            screenshot: false,
            timeout_ms: None,
            cache: true,
            headers: None,
        };
        assert_eq!(effective_wait_strategy(&request), WaitStrategy::NetworkIdle);
    }
}
