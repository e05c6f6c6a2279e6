//! Per-origin token bucket rate limiting.
//!
//! The primary backend is a shared Redis instance, consulted via an atomic
//! check-and-refill Lua script so concurrent workers never race on the same
//! bucket. On any Redis error the limiter transparently falls back to an
//! in-process, lock-free token bucket keyed by origin, the same algorithm,
//! just without cross-process sharing.

mod memory;

use crate::config::IrisConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub use memory::{InMemoryRateLimiter, RateLimitDecision};

/// Lua script mirroring the original token-bucket implementation: refill
/// tokens by elapsed time, consume one if available, otherwise return the
/// (negative) number of milliseconds until a token frees up.
const TOKEN_BUCKET_SCRIPT: &str = r"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local rate = tonumber(ARGV[2])
local burst = tonumber(ARGV[3])

local data = redis.call('HMGET', key, 'tokens', 'last_refill')
local tokens = tonumber(data[1])
local last_refill = tonumber(data[2])

if tokens == nil then
    tokens = burst
    last_refill = now
end

local elapsed = now - last_refill
local new_tokens = elapsed * rate
tokens = math.min(burst, tokens + new_tokens)

if tokens >= 1 then
    tokens = tokens - 1
    redis.call('HMSET', key, 'tokens', tokens, 'last_refill', now)
    redis.call('EXPIRE', key, 3600)
    return 1
else
    local wait = (1 - tokens) / rate
    redis.call('HMSET', key, 'tokens', tokens, 'last_refill', now)
    redis.call('EXPIRE', key, 3600)
    return -wait * 1000
end
";

/// Per-origin rate limiter. Acquiring blocks the caller until a token is
/// available. Callers that want a non-blocking decision should race this
/// against their own timeout.
pub struct RateLimiter {
    redis: Option<redis::aio::ConnectionManager>,
    script: redis::Script,
    rate_per_sec: f64,
    burst: u32,
    memory_fallback: Arc<InMemoryRateLimiter>,
}

impl RateLimiter {
    pub async fn new(config: &IrisConfig) -> Self {
        let rate_per_sec = if config.min_delay_between_requests_ms > 0 {
            1000.0 / config.min_delay_between_requests_ms as f64
        } else {
            100.0
        };

        let redis = match &config.redis_url {
            Some(url) => match redis::Client::open(url.as_str()) {
                Ok(client) => match client.get_connection_manager().await {
                    Ok(manager) => Some(manager),
                    Err(e) => {
                        warn!("Rate limiter: failed to connect to Redis, using in-memory fallback: {}", e);
                        None
                    }
                },
                Err(e) => {
                    warn!("Rate limiter: invalid REDIS_URL, using in-memory fallback: {}", e);
                    None
                }
            },
            None => None,
        };

        Self {
            redis,
            script: redis::Script::new(TOKEN_BUCKET_SCRIPT),
            rate_per_sec,
            burst: 3,
            memory_fallback: Arc::new(InMemoryRateLimiter::new()),
        }
    }

    /// Block until a token is available for `origin`, retrying against
    /// Redis as needed. Falls back to the in-process bucket on any Redis
    /// error, for that call only (no sticky degradation).
    pub async fn acquire(&self, origin: &str) {
        if let Some(manager) = &self.redis {
            if self.acquire_redis(manager.clone(), origin).await {
                return;
            }
            debug!("Redis rate limit failed for {}, falling back to memory", origin);
        }
        self.memory_fallback.acquire(origin, self.rate_per_sec, self.burst).await;
    }

    async fn acquire_redis(&self, mut conn: redis::aio::ConnectionManager, origin: &str) -> bool {
        let key = format!("iris:ratelimit:{origin}");

        loop {
            let now = monotonic_seconds();
            let result: redis::RedisResult<f64> = self
                .script
                .key(&key)
                .arg(now)
                .arg(self.rate_per_sec)
                .arg(self.burst)
                .invoke_async(&mut conn)
                .await;

            match result {
                Ok(value) if value >= 1.0 => return true,
                Ok(value) => {
                    let wait_ms = value.abs();
                    tokio::time::sleep(Duration::from_secs_f64(wait_ms / 1000.0)).await;
                    continue;
                }
                Err(e) => {
                    debug!("Rate limit script error for {}: {}", origin, e);
                    return false;
                }
            }
        }
    }
}

fn monotonic_seconds() -> f64 {
    use std::sync::OnceLock;
    use std::time::Instant;
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falls_back_to_memory_without_redis_url() {
        let config = IrisConfig {
            redis_url: None,
            min_delay_between_requests_ms: 50,
            ..IrisConfig::for_tests()
        };
        let limiter = RateLimiter::new(&config).await;
        assert!(limiter.redis.is_none());
        limiter.acquire("example.com").await;
    }
}
