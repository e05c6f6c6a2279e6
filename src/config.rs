//! Environment-loaded service configuration.
//!
//! Mirrors the original `Settings` (`config.py`, a Pydantic `BaseSettings`
//! with `env_prefix="IRIS_"`): every field below has the same name (lower
//! snake-cased) and default as its Python counterpart. The sentinel/gateway
//! fields from the original are not carried here, since the outbound gateway
//! client is out of scope.

use serde::Deserialize;
use std::env;

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8060
}
fn default_log_level() -> String {
    "INFO".to_string()
}
fn default_browser_type() -> String {
    "chromium".to_string()
}
fn default_page_timeout_ms() -> u64 {
    30_000
}
fn default_wait_after_load_ms() -> u64 {
    2_000
}
fn default_max_concurrent_pages() -> usize {
    3
}
fn default_user_agent() -> String {
    "Cortex-Iris/1.0 (Research Bot)".to_string()
}
fn default_max_content_length() -> usize {
    500_000
}
fn default_cache_ttl_seconds() -> u64 {
    3_600
}
fn default_min_delay_between_requests_ms() -> u64 {
    1_000
}
fn default_max_retries() -> u32 {
    2
}

/// Application settings, loaded from `IRIS_*` environment variables with
/// defaults matching the original service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IrisConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_browser_type")]
    pub browser_type: String,
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default = "default_page_timeout_ms")]
    pub page_timeout_ms: u64,
    #[serde(default = "default_wait_after_load_ms")]
    pub wait_after_load_ms: u64,
    #[serde(default = "default_max_concurrent_pages")]
    pub max_concurrent_pages: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,
    #[serde(default = "default_true")]
    pub extract_metadata: bool,
    #[serde(default = "default_true")]
    pub extract_links: bool,

    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    #[serde(default = "default_min_delay_between_requests_ms")]
    pub min_delay_between_requests_ms: u64,
    #[serde(default = "default_true")]
    pub respect_robots_txt: bool,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub testing_mode: bool,
}

fn default_true() -> bool {
    true
}

impl Default for IrisConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            browser_type: default_browser_type(),
            headless: true,
            page_timeout_ms: default_page_timeout_ms(),
            wait_after_load_ms: default_wait_after_load_ms(),
            max_concurrent_pages: default_max_concurrent_pages(),
            user_agent: default_user_agent(),
            max_content_length: default_max_content_length(),
            extract_metadata: true,
            extract_links: true,
            redis_url: None,
            cache_ttl_seconds: default_cache_ttl_seconds(),
            cache_enabled: true,
            min_delay_between_requests_ms: default_min_delay_between_requests_ms(),
            respect_robots_txt: true,
            max_retries: default_max_retries(),
            testing_mode: false,
        }
    }
}

impl IrisConfig {
    /// Load from `IRIS_*` environment variables, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_or(&defaults.host, "IRIS_HOST"),
            port: env_parsed(defaults.port, "IRIS_PORT"),
            log_level: env_or(&defaults.log_level, "IRIS_LOG_LEVEL"),
            browser_type: env_or(&defaults.browser_type, "IRIS_BROWSER_TYPE"),
            headless: env_parsed(defaults.headless, "IRIS_HEADLESS"),
            page_timeout_ms: env_parsed(defaults.page_timeout_ms, "IRIS_PAGE_TIMEOUT_MS"),
            wait_after_load_ms: env_parsed(defaults.wait_after_load_ms, "IRIS_WAIT_AFTER_LOAD_MS"),
            max_concurrent_pages: env_parsed(defaults.max_concurrent_pages, "IRIS_MAX_CONCURRENT_PAGES"),
            user_agent: env_or(&defaults.user_agent, "IRIS_USER_AGENT"),
            max_content_length: env_parsed(defaults.max_content_length, "IRIS_MAX_CONTENT_LENGTH"),
            extract_metadata: env_parsed(defaults.extract_metadata, "IRIS_EXTRACT_METADATA"),
            extract_links: env_parsed(defaults.extract_links, "IRIS_EXTRACT_LINKS"),
            redis_url: env::var("IRIS_REDIS_URL").ok().filter(|s| !s.is_empty()),
            cache_ttl_seconds: env_parsed(defaults.cache_ttl_seconds, "IRIS_CACHE_TTL_SECONDS"),
            cache_enabled: env_parsed(defaults.cache_enabled, "IRIS_CACHE_ENABLED"),
            min_delay_between_requests_ms: env_parsed(
                defaults.min_delay_between_requests_ms,
                "IRIS_MIN_DELAY_BETWEEN_REQUESTS_MS",
            ),
            respect_robots_txt: env_parsed(defaults.respect_robots_txt, "IRIS_RESPECT_ROBOTS_TXT"),
            max_retries: env_parsed(defaults.max_retries, "IRIS_MAX_RETRIES"),
            testing_mode: env_parsed(defaults.testing_mode, "IRIS_TESTING_MODE"),
        }
    }

    /// Configuration for tests: testing mode on, robots respected, no Redis,
    /// short delays so test suites run fast.
    pub fn for_tests() -> Self {
        Self {
            testing_mode: true,
            redis_url: None,
            min_delay_between_requests_ms: 10,
            cache_ttl_seconds: 60,
            ..Self::default()
        }
    }
}

fn env_or(default: &str, key: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(default: T, key: &str) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_service() {
        let config = IrisConfig::default();
        assert_eq!(config.port, 8060);
        assert_eq!(config.max_concurrent_pages, 3);
        assert_eq!(config.min_delay_between_requests_ms, 1000);
        assert_eq!(config.max_retries, 2);
        assert!(config.respect_robots_txt);
        assert!(config.cache_enabled);
    }

    #[test]
    fn for_tests_disables_redis_and_shortens_delays() {
        let config = IrisConfig::for_tests();
        assert!(config.testing_mode);
        assert!(config.redis_url.is_none());
        assert_eq!(config.min_delay_between_requests_ms, 10);
    }
}
