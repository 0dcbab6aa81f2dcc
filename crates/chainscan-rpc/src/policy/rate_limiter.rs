//! Token bucket rate limiter, pooled across endpoints.
//!
//! Models a token bucket: tokens accrue at `refill_rate` tokens/second up to
//! `capacity`. Each request consumes `cost` tokens. `try_acquire` never
//! blocks; `acquire` sleeps until a token is granted, so the bucket can sit
//! in front of the dispatch path. One bucket is shared by every endpoint of
//! a chain via [`PooledRateLimiter`], keeping the per-provider budget intact
//! across failover rotations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum tokens in the bucket (burst).
    pub capacity: f64,
    /// Token refill rate (tokens per second).
    pub refill_rate: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            capacity: 25.0,
            refill_rate: 10.0,
        }
    }
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Thread-safe token bucket.
pub struct TokenBucket {
    config: RateLimiterConfig,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: config.capacity,
                last_refill: Instant::now(),
            }),
            config,
        }
    }

    /// Try to acquire `cost` tokens.
    ///
    /// Returns `true` if tokens were available and consumed.
    pub fn try_acquire(&self, cost: f64) -> bool {
        let mut state = self.state.lock().unwrap();
        self.refill(&mut state);

        if state.tokens >= cost {
            state.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// Returns the estimated wait time before `cost` tokens are available.
    pub fn wait_time(&self, cost: f64) -> Duration {
        let state = self.state.lock().unwrap();
        let deficit = cost - state.tokens;
        if deficit <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(deficit / self.config.refill_rate)
        }
    }

    /// Returns currently available tokens.
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock().unwrap();
        self.refill(&mut state);
        state.tokens
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        let new_tokens = elapsed * self.config.refill_rate;
        state.tokens = (state.tokens + new_tokens).min(self.config.capacity);
        state.last_refill = now;
    }
}

/// A rate limiter wrapping the token bucket.
pub struct RateLimiter {
    bucket: TokenBucket,
    /// Cost per standard request.
    pub default_cost: f64,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            bucket: TokenBucket::new(config),
            default_cost: 1.0,
        }
    }

    /// Try to acquire the default cost without blocking.
    pub fn try_acquire(&self) -> bool {
        self.bucket.try_acquire(self.default_cost)
    }

    /// Acquire the default cost, sleeping until the bucket grants a token.
    pub async fn acquire(&self) {
        loop {
            if self.try_acquire() {
                return;
            }
            let wait = self
                .bucket
                .wait_time(self.default_cost)
                .max(Duration::from_millis(1));
            tokio::time::sleep(wait).await;
        }
    }

    /// Wait time before the default cost is available.
    pub fn wait_time(&self) -> Duration {
        self.bucket.wait_time(self.default_cost)
    }
}

/// Hands out one shared [`RateLimiter`] per pool key, so all endpoints of a
/// chain draw from the same budget.
#[derive(Default)]
pub struct PooledRateLimiter {
    limiters: Mutex<HashMap<String, Arc<RateLimiter>>>,
}

impl PooledRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the limiter registered under `key`, creating it from `config`
    /// on first use. Subsequent calls ignore `config` and return the
    /// existing bucket.
    pub fn get_or_create(&self, key: &str, config: RateLimiterConfig) -> Arc<RateLimiter> {
        let mut limiters = self.limiters.lock().unwrap();
        limiters
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::new(config)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_within_capacity() {
        let rl = RateLimiter::new(RateLimiterConfig {
            capacity: 10.0,
            refill_rate: 1.0,
        });
        for _ in 0..10 {
            assert!(rl.try_acquire(), "should succeed within capacity");
        }
    }

    #[test]
    fn reject_when_empty() {
        let rl = RateLimiter::new(RateLimiterConfig {
            capacity: 3.0,
            refill_rate: 0.0001, // almost no refill
        });
        rl.try_acquire();
        rl.try_acquire();
        rl.try_acquire();
        // Now empty
        assert!(!rl.try_acquire(), "should be rate limited");
    }

    #[test]
    fn wait_time_when_empty() {
        let rl = RateLimiter::new(RateLimiterConfig {
            capacity: 1.0,
            refill_rate: 10.0, // 10 tokens/sec
        });
        rl.try_acquire(); // drain
        let wait = rl.wait_time();
        // Should be ~100ms (1 token / 10 tokens per sec)
        assert!(
            wait.as_millis() >= 50 && wait.as_millis() <= 200,
            "unexpected wait time: {wait:?}"
        );
    }

    #[tokio::test]
    async fn blocking_acquire_waits_for_refill() {
        let rl = RateLimiter::new(RateLimiterConfig {
            capacity: 1.0,
            refill_rate: 50.0,
        });
        rl.try_acquire(); // drain
        let start = Instant::now();
        rl.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn pool_shares_bucket_per_key() {
        let pool = PooledRateLimiter::new();
        let a = pool.get_or_create(
            "bitcoin",
            RateLimiterConfig {
                capacity: 2.0,
                refill_rate: 0.0001,
            },
        );
        let b = pool.get_or_create("bitcoin", RateLimiterConfig::default());
        assert!(Arc::ptr_eq(&a, &b));

        a.try_acquire();
        b.try_acquire();
        // Both handles drained the same bucket
        assert!(!a.try_acquire());
    }

    #[test]
    fn pool_separates_keys() {
        let pool = PooledRateLimiter::new();
        let a = pool.get_or_create("bitcoin", RateLimiterConfig::default());
        let b = pool.get_or_create("tron", RateLimiterConfig::default());
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
