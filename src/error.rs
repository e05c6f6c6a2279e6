//! Fetch error taxonomy and classification.
//!
//! `classify_error`/`classify_http_error` are pure functions so the
//! taxonomy is unit-testable without a browser, mirroring the original
//! `classify_error`/`classify_http_error` in `fetcher.py`.

use serde::{Deserialize, Serialize};

/// HTTP statuses the retry orchestrator will retry on.
const RETRYABLE_STATUS_CODES: [u16; 4] = [429, 502, 503, 504];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchErrorType {
    Timeout,
    DnsError,
    SslError,
    ConnectionError,
    RateLimited,
    HttpError,
    InvalidUrl,
    BlockedByRobotsTxt,
    UnsupportedContentType,
    ContentTooLarge,
    BrowserError,
}

#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct FetchError {
    #[serde(rename = "type")]
    pub error_type: FetchErrorType,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

impl FetchError {
    pub fn new(error_type: FetchErrorType, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            error_type,
            message: message.into(),
            retryable,
            http_status: None,
        }
    }

    pub fn invalid_url(url: &str) -> Self {
        Self::new(FetchErrorType::InvalidUrl, format!("Invalid URL: {url}"), false)
    }

    pub fn browser_not_connected() -> Self {
        Self::new(FetchErrorType::BrowserError, "Browser not started", false)
    }

    pub fn blocked_by_robots_txt(url: &str) -> Self {
        Self::new(
            FetchErrorType::BlockedByRobotsTxt,
            format!("Blocked by robots.txt: {url}"),
            false,
        )
    }

    pub fn unsupported_content_type(content_type: &str) -> Self {
        Self::new(
            FetchErrorType::UnsupportedContentType,
            format!("Unsupported content type: {content_type}"),
            false,
        )
    }

    pub fn content_too_large(actual_bytes: usize, limit_bytes: usize) -> Self {
        Self::new(
            FetchErrorType::ContentTooLarge,
            format!("Content size {actual_bytes} bytes exceeds limit of {limit_bytes} bytes"),
            false,
        )
    }
}

/// Classify a browser/network-level failure message into a `FetchError`.
///
/// String-matches on the lower-cased message, same ordering as the original:
/// timeout, then DNS, then TLS, then connection-reset family, falling back to
/// a generic non-retryable browser error.
pub fn classify_error(message: &str) -> FetchError {
    let lower = message.to_lowercase();

    if lower.contains("timeout") {
        return FetchError::new(FetchErrorType::Timeout, message, true);
    }

    if lower.contains("dns") || lower.contains("name resolution") || lower.contains("getaddrinfo") {
        return FetchError::new(FetchErrorType::DnsError, message, true);
    }

    if lower.contains("ssl") || lower.contains("certificate") {
        return FetchError::new(FetchErrorType::SslError, message, false);
    }

    if lower.contains("connection") || lower.contains("reset") || lower.contains("refused") || lower.contains("broken pipe") {
        return FetchError::new(FetchErrorType::ConnectionError, message, true);
    }

    FetchError::new(FetchErrorType::BrowserError, message, false)
}

/// Classify an HTTP response status code.
pub fn classify_http_error(status: u16) -> FetchError {
    let retryable = RETRYABLE_STATUS_CODES.contains(&status);

    if status == 429 {
        let mut err = FetchError::new(
            FetchErrorType::RateLimited,
            "HTTP 429: Too Many Requests",
            true,
        );
        err.http_status = Some(status);
        return err;
    }

    let mut err = FetchError::new(FetchErrorType::HttpError, format!("HTTP {status}"), retryable);
    err.http_status = Some(status);
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_retryable() {
        let err = classify_error("Timeout 30000ms exceeded");
        assert_eq!(err.error_type, FetchErrorType::Timeout);
        assert!(err.retryable);
    }

    #[test]
    fn dns_failure_is_retryable() {
        let err = classify_error("getaddrinfo ENOTFOUND example.invalid");
        assert_eq!(err.error_type, FetchErrorType::DnsError);
        assert!(err.retryable);
    }

    #[test]
    fn ssl_failure_is_not_retryable() {
        let err = classify_error("SSL certificate problem: self signed certificate");
        assert_eq!(err.error_type, FetchErrorType::SslError);
        assert!(!err.retryable);
    }

    #[test]
    fn connection_reset_is_retryable() {
        let err = classify_error("connection reset by peer");
        assert_eq!(err.error_type, FetchErrorType::ConnectionError);
        assert!(err.retryable);
    }

    #[test]
    fn unknown_error_falls_back_to_browser_error() {
        let err = classify_error("some unexpected chromiumoxide internal failure");
        assert_eq!(err.error_type, FetchErrorType::BrowserError);
        assert!(!err.retryable);
    }

    #[test]
    fn http_429_is_rate_limited() {
        let err = classify_http_error(429);
        assert_eq!(err.error_type, FetchErrorType::RateLimited);
        assert!(err.retryable);
        assert_eq!(err.http_status, Some(429));
    }

    #[test]
    fn http_5xx_retryable_set() {
        for status in [502, 503, 504] {
            let err = classify_http_error(status);
            assert_eq!(err.error_type, FetchErrorType::HttpError);
            assert!(err.retryable, "status {status} should be retryable");
        }
    }

    #[test]
    fn http_404_is_not_retryable() {
        let err = classify_http_error(404);
        assert_eq!(err.error_type, FetchErrorType::HttpError);
        assert!(!err.retryable);
    }
}
