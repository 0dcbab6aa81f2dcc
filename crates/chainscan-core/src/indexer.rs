//! The `Indexer` contract every chain implementation satisfies.

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::types::{Block, BlockResult, NetworkKind};

/// The central async trait every chain indexer implements.
///
/// Batch fetches place each result in its input slot regardless of
/// completion order; per-slot failures are recorded in
/// [`BlockResult::error`](crate::types::BlockResult) rather than failing the
/// whole call ([`first_error`](crate::types::first_error) reproduces the
/// aggregate view). Callers impose deadlines by wrapping a call in
/// `tokio::time::timeout` and dropping it — in-flight work is abandoned at
/// the next RPC boundary.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Upper-cased chain name (e.g. `"BITCOIN"`).
    fn name(&self) -> String;

    /// Network family.
    fn network_type(&self) -> NetworkKind;

    /// Downstream network identifier.
    fn network_id(&self) -> String;

    /// Internal bookkeeping code for this chain.
    fn internal_code(&self) -> String;

    /// Current chain height.
    async fn latest_block_number(&self) -> Result<u64, IndexerError>;

    /// Fetch and normalize a single block.
    async fn block(&self, number: u64) -> Result<Block, IndexerError>;

    /// Fetch the inclusive range `[from, to]`.
    async fn blocks(&self, from: u64, to: u64) -> Result<Vec<BlockResult>, IndexerError>;

    /// Fetch an arbitrary set of heights; `result[i].number == nums[i]`.
    async fn blocks_by_numbers(&self, nums: &[u64]) -> Result<Vec<BlockResult>, IndexerError>;

    /// Bounded liveness probe.
    async fn is_healthy(&self) -> bool;
}
