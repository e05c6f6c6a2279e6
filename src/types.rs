//! Wire and domain data model: requests, responses, and the structures the
//! extractors populate. Field names track the original Pydantic schemas
//! (`schemas.py`) and the data model spec'd for each component.

use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How the executor should wait for dynamic content before extracting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    #[default]
    Load,
    NetworkIdle,
    DomContentLoaded,
    Selector,
    Timeout,
}

fn default_true() -> bool {
    true
}

/// A single fetch request, as received over the wire (or as one element of
/// a batch).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    #[serde(default)]
    pub wait_for_selector: Option<String>,
    #[serde(default)]
    pub wait_strategy: WaitStrategy,
    #[serde(default)]
    pub wait_after_load_ms: Option<u64>,
    #[serde(default = "default_true")]
    pub extract_text: bool,
    #[serde(default)]
    pub extract_links: bool,
    #[serde(default = "default_true")]
    pub extract_metadata: bool,
    #[serde(default)]
    pub screenshot: bool,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_true")]
    pub cache: bool,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

/// A batch of 1-10 fetch requests, enforced by the HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFetchRequest {
    pub requests: Vec<FetchRequest>,
}

/// Page-level metadata lifted from `<head>` tags, plus the PDF-specific
/// fields populated when the fetched resource was a PDF document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_pages: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_created_date: Option<String>,
}

/// A link extracted from the page body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedLink {
    pub url: String,
    pub text: String,
    pub is_external: bool,
}

/// Structured data lifted from the page: JSON-LD blocks plus the
/// sorted-unique set of schema.org types seen across JSON-LD and microdata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_ld: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_org_types: Option<Vec<String>>,
}

/// The raw outcome of one executor attempt, before extraction and caching.
#[derive(Debug, Clone)]
pub struct FetchAttemptResult {
    pub status_code: u16,
    pub content_type: String,
    pub html: String,
    pub raw_bytes: Option<Vec<u8>>,
    pub screenshot_png: Option<Vec<u8>>,
    pub fetch_time_ms: u64,
    pub error: Option<FetchError>,
}

/// Final response returned to the caller for one URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchResponse {
    pub url: String,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PageMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<ExtractedLink>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<StructuredData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_base64: Option<String>,
    pub content_length: u64,
    pub fetch_time_ms: u64,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FetchError>,
}

impl FetchResponse {
    pub fn error_for(url: &str, error: FetchError) -> Self {
        Self {
            url: url.to_string(),
            error: Some(error),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchFetchResponse {
    pub results: Vec<FetchResponse>,
    pub total_time_ms: u64,
}

/// Persisted token-bucket state for one origin (Redis hash fields, mirrored
/// here for the in-memory fallback's benefit when reasoning about shape).
#[derive(Debug, Clone, Copy)]
pub struct RateBucket {
    pub tokens: f64,
    pub last_refill_unix_secs: f64,
}

/// Cached robots.txt verdict set for one origin.
#[derive(Debug, Clone)]
pub struct RobotsRecord {
    pub origin: String,
    pub body: String,
    pub fetched_at_unix_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub browser_connected: bool,
    pub cache_connected: bool,
    /// Always `false`: the outbound gateway/satellite client is out of
    /// scope, but the field is kept so the wire shape matches the original.
    pub sentinel_connected: bool,
    pub active_pages: usize,
    pub uptime_seconds: f64,
}
