//! chainscan-rpc — the JSON-RPC substrate shared by every chain indexer.
//!
//! # Overview
//!
//! - [`RpcRequest`] / [`RpcResponse`] — JSON-RPC 2.0 wire types; `result`
//!   stays raw until a typed façade decodes it
//! - [`BaseClient`] — one endpoint, one auth descriptor, one timeout, one
//!   shared rate limiter
//! - [`Failover`] — multi-endpoint coordinator with per-provider health
//! - [`policy`] module — token-bucket rate limiting, deterministic backoff

pub mod client;
pub mod error;
pub mod failover;
pub mod policy;
pub mod request;

pub use client::{Auth, BaseClient, ClientType, Network, NetworkClient};
pub use error::ClientError;
pub use failover::{Failover, FailoverConfig, FailoverError, OpFuture, ProviderState};
pub use policy::{PooledRateLimiter, RateLimiter, RateLimiterConfig, RetryConfig, RetryPolicy};
pub use request::{RpcError, RpcId, RpcParam, RpcRequest, RpcResponse};
