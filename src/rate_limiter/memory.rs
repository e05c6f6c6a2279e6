//! Lock-free in-process token bucket, keyed by origin.
//!
//! Same fixed-point token-bucket algorithm as the Redis Lua script, adapted
//! to a single process: `AtomicU128` packs the current token count and the
//! last-refill timestamp so a bucket can be refilled and consumed from in a
//! single compare-and-swap, with no mutex on the hot path.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU128, Ordering};
use std::sync::{Arc, Instant};
use std::time::Duration;

const TOKEN_SCALE: u64 = 1000;
const RATE_SCALE: u64 = 1_000_000;

#[inline(always)]
fn pack_state(tokens: u64, last_refill_nanos: u64) -> u128 {
    ((tokens as u128) << 64) | (last_refill_nanos as u128)
}

#[inline(always)]
fn unpack_state(packed: u128) -> (u64, u64) {
    let tokens = (packed >> 64) as u64;
    let last_refill_nanos = (packed & 0xFFFF_FFFF_FFFF_FFFF) as u64;
    (tokens, last_refill_nanos)
}

/// Outcome of a non-blocking bucket check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allow,
    Deny { retry_after: Duration },
}

#[repr(C, align(64))]
struct OriginBucket {
    state: AtomicU128,
    rate_per_nano: u64,
    max_tokens: u64,
    _padding: [u8; 32],
}

impl OriginBucket {
    fn new(rate_rps: f64, burst: u32, base_time: &Instant) -> Self {
        let max_tokens = (burst.max(1) as u64) * TOKEN_SCALE;
        let rate_per_nano =
            ((rate_rps * TOKEN_SCALE as f64 * RATE_SCALE as f64) / 1_000_000_000.0) as u64;
        let now_nanos = base_time.elapsed().as_nanos() as u64;

        Self {
            state: AtomicU128::new(pack_state(max_tokens, now_nanos)),
            rate_per_nano,
            max_tokens,
            _padding: [0u8; 32],
        }
    }

    fn try_consume(&self, base_time: &Instant) -> RateLimitDecision {
        let now_nanos = base_time.elapsed().as_nanos() as u64;
        self.refill(now_nanos);

        let mut current_state = self.state.load(Ordering::Relaxed);
        loop {
            let (current_tokens, last_refill) = unpack_state(current_state);

            if current_tokens < TOKEN_SCALE {
                let tokens_needed = TOKEN_SCALE.saturating_sub(current_tokens);
                let nanos_needed = if self.rate_per_nano > 0 {
                    (tokens_needed.saturating_mul(RATE_SCALE)) / self.rate_per_nano
                } else {
                    1_000_000
                };
                return RateLimitDecision::Deny {
                    retry_after: Duration::from_nanos(nanos_needed),
                };
            }

            let new_tokens = current_tokens - TOKEN_SCALE;
            let new_state = pack_state(new_tokens, last_refill);

            match self.state.compare_exchange_weak(
                current_state,
                new_state,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return RateLimitDecision::Allow,
                Err(actual) => {
                    current_state = actual;
                    std::hint::spin_loop();
                }
            }
        }
    }

    fn refill(&self, now_nanos: u64) {
        let mut current_state = self.state.load(Ordering::Relaxed);
        loop {
            let (current_tokens, last_refill) = unpack_state(current_state);
            if now_nanos <= last_refill {
                return;
            }

            let elapsed_nanos = now_nanos.saturating_sub(last_refill);
            let tokens_to_add = (elapsed_nanos.saturating_mul(self.rate_per_nano)) / RATE_SCALE;
            let time_credited_nanos = if self.rate_per_nano > 0 {
                (tokens_to_add.saturating_mul(RATE_SCALE)) / self.rate_per_nano
            } else {
                0
            };
            let new_last_refill = last_refill.saturating_add(time_credited_nanos);
            let new_tokens = if tokens_to_add > 0 {
                current_tokens.saturating_add(tokens_to_add).min(self.max_tokens)
            } else {
                current_tokens
            };

            match self.state.compare_exchange_weak(
                current_state,
                pack_state(new_tokens, new_last_refill),
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => {
                    current_state = actual;
                    std::hint::spin_loop();
                }
            }
        }
    }
}

/// Per-origin token buckets, entirely in-process.
pub struct InMemoryRateLimiter {
    buckets: DashMap<String, Arc<OriginBucket>>,
    base_time: Instant,
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
            base_time: Instant::now(),
        }
    }

    /// Non-blocking check against the bucket for `origin`.
    pub fn check(&self, origin: &str, rate_rps: f64, burst: u32) -> RateLimitDecision {
        if rate_rps <= 0.0 {
            return RateLimitDecision::Allow;
        }

        let bucket = Arc::clone(
            self.buckets
                .entry(origin.to_string())
                .or_insert_with(|| Arc::new(OriginBucket::new(rate_rps, burst, &self.base_time)))
                .value(),
        );

        bucket.try_consume(&self.base_time)
    }

    /// Blocking acquire: retries `check` until a token is granted.
    pub async fn acquire(&self, origin: &str, rate_rps: f64, burst: u32) {
        loop {
            match self.check(origin, rate_rps, burst) {
                RateLimitDecision::Allow => return,
                RateLimitDecision::Deny { retry_after } => {
                    tokio::time::sleep(retry_after).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_allowed() {
        let limiter = InMemoryRateLimiter::new();
        assert_eq!(limiter.check("example.com", 1.0, 3), RateLimitDecision::Allow);
    }

    #[test]
    fn burst_capacity_is_independent_of_refill_rate() {
        let limiter = InMemoryRateLimiter::new();
        for _ in 0..3 {
            assert_eq!(limiter.check("example.com", 1.0, 3), RateLimitDecision::Allow);
        }
        assert!(matches!(
            limiter.check("example.com", 1.0, 3),
            RateLimitDecision::Deny { .. }
        ));
    }

    #[test]
    fn immediate_second_request_denied_with_burst_one() {
        let limiter = InMemoryRateLimiter::new();
        assert_eq!(limiter.check("example.com", 1.0, 1), RateLimitDecision::Allow);
        assert!(matches!(
            limiter.check("example.com", 1.0, 1),
            RateLimitDecision::Deny { .. }
        ));
    }

    #[test]
    fn independent_origins_do_not_share_buckets() {
        let limiter = InMemoryRateLimiter::new();
        assert_eq!(limiter.check("a.com", 1.0, 3), RateLimitDecision::Allow);
        assert_eq!(limiter.check("b.com", 1.0, 3), RateLimitDecision::Allow);
    }

    #[test]
    fn non_positive_rate_always_allows() {
        let limiter = InMemoryRateLimiter::new();
        assert_eq!(limiter.check("example.com", 0.0, 3), RateLimitDecision::Allow);
        assert_eq!(limiter.check("example.com", 0.0, 3), RateLimitDecision::Allow);
    }
}
