//! Per-chain configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use chainscan_rpc::{Auth, FailoverConfig};

use crate::types::NetworkKind;

/// Configuration for one chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Downstream network identifier (e.g. `"btc-mainnet"`).
    #[serde(default)]
    pub network_id: String,
    /// Internal bookkeeping code.
    #[serde(default)]
    pub internal_code: String,
    /// Network family.
    #[serde(rename = "type")]
    pub kind: NetworkKind,
    /// First block to scan when no progress is recorded.
    #[serde(default)]
    pub start_block: u64,
    /// Poll interval for the scheduler that drives this chain.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Reorg rollback window, consumed by the scheduler.
    #[serde(default = "default_reorg_rollback_window")]
    pub reorg_rollback_window: u32,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub throttle: Throttle,
    #[serde(default)]
    pub failover: FailoverSettings,
    /// RPC endpoints, in preference order.
    pub nodes: Vec<NodeConfig>,
}

impl ChainConfig {
    /// Runtime failover config, merging the retry knobs from `client` with
    /// the failover section.
    pub fn failover_config(&self) -> FailoverConfig {
        FailoverConfig {
            max_retries: self.client.max_retries,
            retry_delay: Duration::from_millis(self.client.retry_delay_ms),
            max_retry_delay: Duration::from_millis(self.failover.max_retry_delay_ms),
            blacklist_cooldown: Duration::from_millis(self.failover.blacklist_cooldown_ms),
        }
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_millis(self.client.timeout_ms)
    }
}

/// HTTP client knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Request throttling and batch sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Throttle {
    /// Sustained requests per second across all of the chain's endpoints.
    #[serde(default = "default_rps")]
    pub rps: u32,
    /// Burst capacity of the shared token bucket.
    #[serde(default = "default_burst")]
    pub burst: u32,
    /// Heights fetched per scheduler tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Worker-pool size for batch block fetches.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
}

impl Default for Throttle {
    fn default() -> Self {
        Self {
            rps: default_rps(),
            burst: default_burst(),
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
        }
    }
}

/// Failover knobs not covered by [`ClientConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverSettings {
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    #[serde(default = "default_blacklist_cooldown_ms")]
    pub blacklist_cooldown_ms: u64,
}

impl Default for FailoverSettings {
    fn default() -> Self {
        Self {
            max_retry_delay_ms: default_max_retry_delay_ms(),
            blacklist_cooldown_ms: default_blacklist_cooldown_ms(),
        }
    }
}

/// One RPC endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub url: String,
    #[serde(default)]
    pub auth: Auth,
}

fn default_poll_interval_ms() -> u64 {
    10_000
}
fn default_reorg_rollback_window() -> u32 {
    6
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    200
}
fn default_rps() -> u32 {
    10
}
fn default_burst() -> u32 {
    25
}
fn default_batch_size() -> u32 {
    20
}
fn default_concurrency() -> u32 {
    4
}
fn default_max_retry_delay_ms() -> u64 {
    5_000
}
fn default_blacklist_cooldown_ms() -> u64 {
    30_000
}
