//! Content-addressed response cache, backed by Redis with graceful
//! degradation to a no-op cache when Redis is absent or unreachable.
//!
//! Port of `cache.py::CacheLayer`/`make_cache_key`: keys are the SHA-256 hex
//! digest of the canonical (sorted, null-elided) JSON of the URL plus the
//! request parameters that affect the response, so the same logical request
//! hits the same key regardless of field order.

use crate::config::IrisConfig;
use crate::types::FetchResponse;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Build the cache key for `url` plus the shape-affecting request params.
/// `params` entries with a `Value::Null` are elided before hashing, so
/// omitted and explicitly-null fields hash identically.
pub fn make_cache_key(url: &str, params: &[(&str, Value)]) -> String {
    let mut object = Map::new();
    object.insert("url".to_string(), Value::String(url.to_string()));
    for (key, value) in params {
        if !value.is_null() {
            object.insert((*key).to_string(), value.clone());
        }
    }

    let canonical = sort_keys(Value::Object(object));
    let raw = serde_json::to_string(&canonical).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Recursively sort object keys so two logically-equal JSON values serialize
/// identically regardless of insertion order.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(String, Value)> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

pub struct ResponseCache {
    enabled: bool,
    default_ttl_secs: u64,
    redis: Option<redis::aio::ConnectionManager>,
}

impl ResponseCache {
    pub async fn new(config: &IrisConfig) -> Self {
        let redis = if !config.cache_enabled {
            None
        } else {
            match &config.redis_url {
                Some(url) => match redis::Client::open(url.as_str()) {
                    Ok(client) => match client.get_connection_manager().await {
                        Ok(manager) => {
                            debug!("Response cache connected: {}", url);
                            Some(manager)
                        }
                        Err(e) => {
                            warn!("Response cache connection failed: {}", e);
                            None
                        }
                    },
                    Err(e) => {
                        warn!("Response cache: invalid REDIS_URL: {}", e);
                        None
                    }
                },
                None => None,
            }
        };

        Self {
            enabled: config.cache_enabled,
            default_ttl_secs: config.cache_ttl_seconds,
            redis,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.redis.is_some()
    }

    /// Look up a cached response by key. Any Redis error degrades to a
    /// cache miss rather than surfacing to the caller.
    pub async fn get(&self, key: &str) -> Option<FetchResponse> {
        let mut conn = self.redis.clone()?;
        if !self.enabled {
            return None;
        }

        use redis::AsyncCommands;
        let raw: Option<String> = conn
            .get(redis_key(key))
            .await
            .inspect_err(|e| warn!("Cache get failed: key={} error={}", key, e))
            .ok()
            .flatten();

        raw.and_then(|data| match serde_json::from_str(&data) {
            Ok(response) => Some(response),
            Err(e) => {
                warn!("Cache get failed to deserialize: key={} error={}", key, e);
                None
            }
        })
    }

    /// Store `response` under `key`. Screenshots are never persisted: the
    /// caller strips `screenshot_base64` before calling this, same as the
    /// original stripping it from the response it serializes.
    pub async fn set(&self, key: &str, response: &FetchResponse, ttl: Option<u64>) {
        let Some(mut conn) = self.redis.clone() else {
            return;
        };
        if !self.enabled {
            return;
        }

        let Ok(data) = serde_json::to_string(response) else {
            return;
        };
        let ttl = ttl.unwrap_or(self.default_ttl_secs).max(1);

        use redis::AsyncCommands;
        if let Err(e) = conn
            .set_ex::<_, _, ()>(redis_key(key), data, ttl)
            .await
        {
            warn!("Cache set failed: key={} error={}", key, e);
        } else {
            debug!("Cache set: key={} ttl={}s", key, ttl);
        }
    }

    /// Invalidate a cached entry. Returns `true` only if a key was actually
    /// deleted; any Redis error or disabled cache reports `false`.
    pub async fn invalidate(&self, key: &str) -> bool {
        let Some(mut conn) = self.redis.clone() else {
            return false;
        };
        if !self.enabled {
            return false;
        }

        use redis::AsyncCommands;
        match conn.del::<_, i64>(redis_key(key)).await {
            Ok(deleted) => deleted > 0,
            Err(e) => {
                warn!("Cache invalidate failed: key={} error={}", key, e);
                false
            }
        }
    }
}

fn redis_key(key: &str) -> String {
    format!("iris:fetch:{key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_stable_under_field_permutation() {
        let a = make_cache_key(
            "https://example.com/",
            &[("wait_strategy", Value::String("load".into())), ("screenshot", Value::Bool(false))],
        );
        let b = make_cache_key(
            "https://example.com/",
            &[("screenshot", Value::Bool(false)), ("wait_strategy", Value::String("load".into()))],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn null_params_elided_match_omitted_params() {
        let with_null = make_cache_key(
            "https://example.com/",
            &[("wait_for_selector", Value::Null)],
        );
        let omitted = make_cache_key("https://example.com/", &[]);
        assert_eq!(with_null, omitted);
    }

    #[test]
    fn different_urls_hash_differently() {
        let a = make_cache_key("https://example.com/a", &[]);
        let b = make_cache_key("https://example.com/b", &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn key_is_a_64_char_hex_sha256() {
        let key = make_cache_key("https://example.com/", &[]);
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
