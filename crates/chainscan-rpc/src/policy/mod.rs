//! Reliability policies applied around RPC dispatch.
//!
//! ```text
//! Request → [RateLimiter] → [Failover + RetryPolicy] → [BaseClient]
//! ```

pub mod rate_limiter;
pub mod retry;

pub use rate_limiter::{PooledRateLimiter, RateLimiter, RateLimiterConfig, TokenBucket};
pub use retry::{RetryConfig, RetryPolicy};
