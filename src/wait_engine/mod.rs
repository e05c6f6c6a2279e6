//! Dynamic-content wait strategies.
//!
//! `chromiumoxide` has no Playwright-style `wait_for_load_state`/
//! `wait_for_selector`, so each strategy is implemented as a short poll loop
//! over `Page::evaluate`. Every strategy is best-effort: a timeout is logged
//! and swallowed rather than propagated, matching `SmartWaiter.wait()` in the
//! original implementation, because a slow page is not a fetch failure.

use crate::types::WaitStrategy;
use chromiumoxide::Page;
use std::time::{Duration, Instant};
use tracing::warn;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Apply a wait strategy after navigation has already reached `load`.
///
/// If `selector` is given, the caller has already upgraded `WaitStrategy::Load`
/// to `WaitStrategy::Selector` (see the fetch executor). This function takes
/// the strategy as handed to it and does not perform that upgrade itself.
pub async fn wait(
    page: &Page,
    strategy: WaitStrategy,
    selector: Option<&str>,
    timeout_ms: u64,
    wait_after_load_ms: u64,
) {
    match strategy {
        WaitStrategy::Load => {}
        WaitStrategy::DomContentLoaded => {
            if poll_until(page, timeout_ms, "document.readyState !== 'loading'").await.is_err() {
                warn!("domcontentloaded wait timed out");
            }
        }
        WaitStrategy::NetworkIdle => {
            if wait_network_idle(page, timeout_ms).await.is_err() {
                warn!("networkidle wait timed out");
            }
        }
        WaitStrategy::Selector => match selector {
            Some(selector) => {
                let expr = format!("document.querySelector({:?}) !== null", selector);
                if poll_until(page, timeout_ms, &expr).await.is_err() {
                    warn!(selector, "selector wait timed out");
                }
            }
            None => warn!("selector strategy used without a selector"),
        },
        WaitStrategy::Timeout => {
            if wait_after_load_ms > 0 {
                tokio::time::sleep(Duration::from_millis(wait_after_load_ms)).await;
            }
        }
    }
}

/// Poll a boolean JS expression until it evaluates truthy or `timeout_ms`
/// elapses.
async fn poll_until(page: &Page, timeout_ms: u64, expr: &str) -> Result<(), ()> {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);

    loop {
        match page.evaluate(expr).await {
            Ok(value) if value.value() == Some(&serde_json::Value::Bool(true)) => return Ok(()),
            _ => {}
        }

        if Instant::now() >= deadline {
            return Err(());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Approximate "networkidle": no growth in the Resource Timing entry count
/// across two consecutive polls. `chromiumoxide` does not expose network
/// event counts directly, so this proxies via `performance.getEntriesByType`.
async fn wait_network_idle(page: &Page, timeout_ms: u64) -> Result<(), ()> {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    let mut last_count = resource_entry_count(page).await;

    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        let count = resource_entry_count(page).await;
        if count == last_count {
            return Ok(());
        }
        last_count = count;

        if Instant::now() >= deadline {
            return Err(());
        }
    }
}

async fn resource_entry_count(page: &Page) -> i64 {
    page.evaluate("performance.getEntriesByType('resource').length")
        .await
        .ok()
        .and_then(|v| v.value().and_then(|v| v.as_i64()))
        .unwrap_or(0)
}
