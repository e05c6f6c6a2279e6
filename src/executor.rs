//! Fetch Executor: a single navigation attempt against one already-acquired
//! browser page.
//!
//! Port of `fetcher.py::PageFetcher._fetch_once`. Unlike Playwright,
//! `chromiumoxide`'s `Page::goto` does not hand back the navigation
//! `Response`, so the status code and content-type come from listening for
//! the CDP `EventResponseReceived` network event for the top-level document
//! instead (same technique the teacher uses in `content_saver::cache_check`
//! to read response headers off the wire).

use crate::error::{classify_error, classify_http_error, FetchError};
use crate::types::{FetchAttemptResult, FetchRequest, WaitStrategy};
use chromiumoxide::cdp::browser_protocol::network::{
    EventResponseReceived, GetResponseBodyParams, ResourceType,
};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams};
use chromiumoxide::Page;
use chromiumoxide::Browser;
use futures::StreamExt;
use std::time::{Duration, Instant};
use tracing::warn;

const HTML_TYPES: [&str; 2] = ["text/html", "application/xhtml+xml"];

/// Execute one fetch attempt. Always destroys the page it opens before
/// returning, success or failure.
pub async fn fetch_once(
    browser: &Browser,
    request: &FetchRequest,
    effective_strategy: WaitStrategy,
    timeout_ms: u64,
    wait_after_load_ms: u64,
) -> FetchAttemptResult {
    let start = Instant::now();

    if !is_navigable_url(&request.url) {
        return error_result(FetchError::invalid_url(&request.url), start);
    }

    let page = match browser.new_page("about:blank").await {
        Ok(page) => page,
        Err(e) => return error_result(classify_error(&e.to_string()), start),
    };

    if let Err(e) = crate::browser_setup::apply_stealth_measures(&page).await {
        warn!("Failed to apply stealth measures for {}: {}", request.url, e);
    }

    let result = run_attempt(&page, request, effective_strategy, timeout_ms, wait_after_load_ms, start).await;

    if let Err(e) = page.close().await {
        warn!("Failed to close page for {}: {}", request.url, e);
    }

    result
}

async fn run_attempt(
    page: &Page,
    request: &FetchRequest,
    effective_strategy: WaitStrategy,
    timeout_ms: u64,
    wait_after_load_ms: u64,
    start: Instant,
) -> FetchAttemptResult {
    if let Some(headers) = &request.headers {
        if let Err(e) = set_headers(page, headers).await {
            warn!("Failed to set request headers for {}: {}", request.url, e);
        }
    }

    let mut events = match page.event_listener::<EventResponseReceived>().await {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!("Failed to attach network listener for {}: {}", request.url, e);
            None
        }
    };

    if let Err(e) = page.goto(&request.url).await {
        return error_result(classify_error(&e.to_string()), start);
    }
    if let Err(e) = page.wait_for_navigation().await {
        return error_result(classify_error(&e.to_string()), start);
    }

    let (status_code, content_type, request_id) = match &mut events {
        Some(stream) => document_response(stream, &request.url, timeout_ms).await,
        None => (0, "text/html".to_string(), None),
    };

    if status_code >= 400 {
        return FetchAttemptResult {
            status_code,
            content_type,
            html: String::new(),
            raw_bytes: None,
            screenshot_png: None,
            fetch_time_ms: elapsed_ms(start),
            error: Some(classify_http_error(status_code)),
        };
    }

    if is_pdf_response(&request.url, &content_type) {
        let raw_bytes = fetch_response_body(page, request_id.as_deref()).await;
        return FetchAttemptResult {
            status_code,
            content_type: "application/pdf".to_string(),
            html: String::new(),
            raw_bytes: Some(raw_bytes),
            screenshot_png: None,
            fetch_time_ms: elapsed_ms(start),
            error: None,
        };
    }

    if content_type == "application/json" {
        let raw_bytes = fetch_response_body(page, request_id.as_deref()).await;
        let pretty = pretty_print_json(&raw_bytes);
        return FetchAttemptResult {
            status_code,
            content_type: "application/json".to_string(),
            html: pretty,
            raw_bytes: None,
            screenshot_png: None,
            fetch_time_ms: elapsed_ms(start),
            error: None,
        };
    }

    if content_type == "text/plain" {
        let rendered = page.content().await.unwrap_or_default();
        let text = body_text_only(&rendered);
        return FetchAttemptResult {
            status_code,
            content_type: "text/plain".to_string(),
            html: text,
            raw_bytes: None,
            screenshot_png: None,
            fetch_time_ms: elapsed_ms(start),
            error: None,
        };
    }

    if content_type.starts_with("image/") {
        return FetchAttemptResult {
            status_code,
            content_type,
            html: String::new(),
            raw_bytes: None,
            screenshot_png: None,
            fetch_time_ms: elapsed_ms(start),
            error: None,
        };
    }

    if !HTML_TYPES.contains(&content_type.as_str()) {
        return FetchAttemptResult {
            status_code,
            content_type: content_type.clone(),
            html: String::new(),
            raw_bytes: None,
            screenshot_png: None,
            fetch_time_ms: elapsed_ms(start),
            error: Some(FetchError::unsupported_content_type(&content_type)),
        };
    }

    crate::wait_engine::wait(
        page,
        effective_strategy,
        request.wait_for_selector.as_deref(),
        timeout_ms,
        wait_after_load_ms,
    )
    .await;
    if wait_after_load_ms > 0 && effective_strategy != WaitStrategy::Timeout {
        tokio::time::sleep(Duration::from_millis(wait_after_load_ms)).await;
    }

    let html = page.content().await.unwrap_or_default();

    let screenshot_png = if request.screenshot {
        capture_screenshot(page).await
    } else {
        None
    };

    FetchAttemptResult {
        status_code,
        content_type,
        html,
        raw_bytes: None,
        screenshot_png,
        fetch_time_ms: elapsed_ms(start),
        error: None,
    }
}

async fn set_headers(
    page: &Page,
    headers: &std::collections::HashMap<String, String>,
) -> Result<(), chromiumoxide::error::CdpError> {
    use chromiumoxide::cdp::browser_protocol::network::{EnableParams, SetExtraHttpHeadersParams};
    page.execute(EnableParams::default()).await?;
    let map: serde_json::Map<String, serde_json::Value> = headers
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    page.execute(SetExtraHttpHeadersParams::new(
        chromiumoxide::cdp::browser_protocol::network::Headers::new(serde_json::Value::Object(map)),
    ))
    .await?;
    Ok(())
}

/// Wait for the `EventResponseReceived` for the navigated document (or time
/// out and report status 0 / default content type, same as the original
/// treating a missing `Response` as `status=0`).
async fn document_response(
    events: &mut chromiumoxide::listeners::EventStream<EventResponseReceived>,
    url: &str,
    timeout_ms: u64,
) -> (u16, String, Option<String>) {
    let deadline = Duration::from_millis(timeout_ms.max(1));
    let search = async {
        while let Some(event) = events.next().await {
            if event.r#type != ResourceType::Document {
                continue;
            }
            if event.response.url != url {
                continue;
            }
            let status = u16::try_from(event.response.status).unwrap_or(0);
            let content_type = base_content_type(content_type_header(&event.response.headers).as_deref())
                .unwrap_or_else(|| event.response.mime_type.clone());
            return Some((status, content_type, Some(event.request_id.inner().to_string())));
        }
        None
    };

    match tokio::time::timeout(deadline, search).await {
        Ok(Some(found)) => found,
        _ => (0, "text/html".to_string(), None),
    }
}

fn content_type_header(headers: &chromiumoxide::cdp::browser_protocol::network::Headers) -> Option<String> {
    let object = headers.inner().as_object()?;
    object
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("content-type"))
        .and_then(|(_, value)| value.as_str())
        .map(str::to_string)
}

fn base_content_type(header: Option<&str>) -> Option<String> {
    header.map(|h| h.split(';').next().unwrap_or(h).trim().to_lowercase())
}

fn is_navigable_url(url: &str) -> bool {
    url::Url::parse(url)
        .map(|parsed| !parsed.scheme().is_empty() && parsed.host_str().is_some())
        .unwrap_or(false)
}

fn is_pdf_url(url: &str) -> bool {
    url::Url::parse(url)
        .map(|parsed| parsed.path().to_lowercase().ends_with(".pdf"))
        .unwrap_or(false)
}

fn is_pdf_response(url: &str, content_type: &str) -> bool {
    content_type == "application/pdf" || (is_pdf_url(url) && content_type == "application/octet-stream")
}

async fn fetch_response_body(page: &Page, request_id: Option<&str>) -> Vec<u8> {
    let Some(request_id) = request_id else {
        return Vec::new();
    };
    let params = GetResponseBodyParams::new(
        chromiumoxide::cdp::browser_protocol::network::RequestId::from(request_id.to_string()),
    );
    match page.execute(params).await {
        Ok(resp) => {
            if resp.base64_encoded {
                base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &resp.body)
                    .unwrap_or_default()
            } else {
                resp.body.clone().into_bytes()
            }
        }
        Err(e) => {
            warn!("Failed to fetch response body: {}", e);
            Vec::new()
        }
    }
}

/// Pretty-print response bytes as JSON (indent 2, non-ASCII preserved). Falls
/// back to a lossy UTF-8 decode of the raw bytes if they do not parse.
fn pretty_print_json(raw_bytes: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(raw_bytes) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_default(),
        Err(_) => String::from_utf8_lossy(raw_bytes).into_owned(),
    }
}

/// Strip the `<html>`/`<head>` wrapper a browser adds around a `text/plain`
/// response, keeping only the `<body>` text content.
fn body_text_only(rendered_html: &str) -> String {
    use scraper::{Html, Selector};
    let document = Html::parse_document(rendered_html);
    let Ok(body_selector) = Selector::parse("body") else {
        return rendered_html.to_string();
    };
    document
        .select(&body_selector)
        .next()
        .map(|body| body.text().collect::<String>())
        .unwrap_or_else(|| rendered_html.to_string())
}

async fn capture_screenshot(page: &Page) -> Option<Vec<u8>> {
    let params = CaptureScreenshotParams {
        format: Some(CaptureScreenshotFormat::Png),
        capture_beyond_viewport: Some(true),
        ..Default::default()
    };
    match page.screenshot(params).await {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!("Screenshot capture failed: {}", e);
            None
        }
    }
}

fn error_result(error: FetchError, start: Instant) -> FetchAttemptResult {
    FetchAttemptResult {
        status_code: 0,
        content_type: "text/html".to_string(),
        html: String::new(),
        raw_bytes: None,
        screenshot_png: None,
        fetch_time_ms: elapsed_ms(start),
        error: Some(error),
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_content_type_strips_parameters() {
        assert_eq!(
            base_content_type(Some("text/html; charset=utf-8")),
            Some("text/html".to_string())
        );
        assert_eq!(base_content_type(None), None);
    }

    #[test]
    fn pdf_detection_matches_mime_or_pdf_url_with_octet_stream() {
        assert!(is_pdf_response("https://example.com/doc.pdf", "application/octet-stream"));
        assert!(is_pdf_response("https://example.com/doc", "application/pdf"));
        assert!(!is_pdf_response("https://example.com/doc", "application/octet-stream"));
    }

    #[test]
    fn pretty_prints_valid_json_and_falls_back_on_invalid() {
        let valid = pretty_print_json(br#"{"a":1}"#);
        assert!(valid.contains("\n"));
        let invalid = pretty_print_json(b"not json");
        assert_eq!(invalid, "not json");
    }

    #[test]
    fn body_text_only_strips_html_wrapper() {
        let html = "<html><head><title>T</title></head><body>hello</body></html>";
        assert_eq!(body_text_only(html), "hello");
    }

    #[test]
    fn rejects_urls_without_scheme_or_host() {
        assert!(!is_navigable_url("not a url"));
        assert!(is_navigable_url("https://example.com/"));
    }
}
