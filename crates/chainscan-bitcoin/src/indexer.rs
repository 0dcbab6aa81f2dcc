//! The Bitcoin indexer orchestrator.
//!
//! Binds the failover pool, the RPC façade, prevout enrichment and the
//! transfer extractor into the [`Indexer`] contract: latest-height query,
//! single-block fetch with the verbosity fallback ladder, bounded-parallel
//! multi-block fetch, and a bounded health probe.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use chainscan_core::{
    Block as NormalizedBlock, BlockError, BlockErrorType, BlockResult, ChainConfig, Indexer,
    IndexerError, NetworkKind,
};
use chainscan_rpc::{Failover, OpFuture};

use crate::api::BitcoinApi;
use crate::types::Block as RawBlock;

const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bitcoin chain indexer.
pub struct BitcoinIndexer<C: BitcoinApi> {
    chain_name: String,
    config: ChainConfig,
    failover: Arc<Failover<C>>,
    /// Enrich verbosity=2 blocks with prevout data so fees can be computed.
    enrich_prev_outs: bool,
}

impl<C: BitcoinApi> Clone for BitcoinIndexer<C> {
    fn clone(&self) -> Self {
        Self {
            chain_name: self.chain_name.clone(),
            config: self.config.clone(),
            failover: Arc::clone(&self.failover),
            enrich_prev_outs: self.enrich_prev_outs,
        }
    }
}

impl<C: BitcoinApi> BitcoinIndexer<C> {
    pub fn new(chain_name: impl Into<String>, config: ChainConfig, failover: Arc<Failover<C>>) -> Self {
        Self {
            chain_name: chain_name.into(),
            config,
            failover,
            enrich_prev_outs: true,
        }
    }

    /// Disable or re-enable prevout enrichment (on by default).
    pub fn with_enrich_prev_outs(mut self, enabled: bool) -> Self {
        self.enrich_prev_outs = enabled;
        self
    }

    /// Snapshot of per-provider health, for diagnostics.
    pub fn provider_health(&self) -> Vec<(String, chainscan_rpc::ProviderState)> {
        self.failover.health_summary()
    }

    async fn latest_height(&self) -> Result<u64, IndexerError> {
        let height = self
            .failover
            .execute_with_retry(|client| -> OpFuture<u64> {
                Box::pin(async move { client.get_block_count().await })
            })
            .await?;
        Ok(height)
    }

    /// Fetch one raw block: hash lookup, then verbosity 3 with a fallback to
    /// verbosity 2 inside the same failover attempt.
    async fn fetch_raw_block(&self, number: u64) -> Result<RawBlock, IndexerError> {
        let blk = self
            .failover
            .execute_with_retry(move |client| -> OpFuture<RawBlock> {
                Box::pin(async move {
                    let hash = client.get_block_hash(number).await?;
                    match client.get_block_with_prev_out(&hash).await {
                        Ok(block) => Ok(block),
                        Err(e) => {
                            tracing::debug!(
                                block = number,
                                error = %e,
                                "getblock verbosity=3 failed, falling back to verbosity=2"
                            );
                            client.get_block_verbose(&hash).await
                        }
                    }
                })
            })
            .await?;
        Ok(blk)
    }

    async fn fetch_block(&self, number: u64) -> Result<NormalizedBlock, IndexerError> {
        let mut blk = self.fetch_raw_block(number).await?;

        if self.enrich_prev_outs && !blk.has_prev_out_data() {
            tracing::debug!(block = number, "enriching block with prevout data");
            let source = blk.clone();
            let enriched = self
                .failover
                .execute_with_retry(move |client| -> OpFuture<RawBlock> {
                    let mut block = source.clone();
                    Box::pin(async move {
                        client.enrich_block_with_prev_outs(&mut block).await?;
                        Ok(block)
                    })
                })
                .await;
            match enriched {
                Ok(block) => blk = block,
                Err(e) => {
                    tracing::warn!(
                        block = number,
                        error = %e,
                        "failed to enrich block with prevout data, fees may be incomplete"
                    );
                }
            }
        }

        Ok(self.process_block(&blk))
    }

    /// Convert a raw block into the normalized form: per-transaction fee
    /// computation and transfer extraction, preserving block order.
    fn process_block(&self, blk: &RawBlock) -> NormalizedBlock {
        let network_id = self.config.network_id.clone();
        let mut transfers = Vec::new();
        for tx in &blk.tx {
            let fee = tx.fee();
            transfers.extend(tx.extract_transfers(&network_id, blk.height, blk.time, fee));
        }

        tracing::debug!(
            block = blk.height,
            hash = %blk.hash,
            transactions = blk.tx.len(),
            transfers = transfers.len(),
            "processed bitcoin block"
        );

        NormalizedBlock {
            number: blk.height,
            hash: blk.hash.clone(),
            parent_hash: blk.previous_block_hash.clone(),
            timestamp: blk.time,
            transfers,
        }
    }
}

#[async_trait]
impl<C: BitcoinApi> Indexer for BitcoinIndexer<C> {
    fn name(&self) -> String {
        self.chain_name.to_uppercase()
    }

    fn network_type(&self) -> NetworkKind {
        NetworkKind::Btc
    }

    fn network_id(&self) -> String {
        self.config.network_id.clone()
    }

    fn internal_code(&self) -> String {
        self.config.internal_code.clone()
    }

    async fn latest_block_number(&self) -> Result<u64, IndexerError> {
        self.latest_height().await
    }

    async fn block(&self, number: u64) -> Result<NormalizedBlock, IndexerError> {
        self.fetch_block(number).await
    }

    async fn blocks(&self, from: u64, to: u64) -> Result<Vec<BlockResult>, IndexerError> {
        if to < from {
            return Err(IndexerError::InvalidRange { from, to });
        }
        let nums: Vec<u64> = (from..=to).collect();
        self.blocks_by_numbers(&nums).await
    }

    async fn blocks_by_numbers(&self, nums: &[u64]) -> Result<Vec<BlockResult>, IndexerError> {
        if nums.is_empty() {
            return Ok(Vec::new());
        }

        let concurrency = self.config.throttle.concurrency.max(1) as usize;
        let workers = nums.len().min(concurrency);

        // Workers drain a bounded job queue; the producer blocks when the
        // queue is full, throttling dispatch to worker drain rate. Results
        // land in their input slot regardless of completion order. Dropping
        // this future drops the JoinSet, which aborts everything in flight.
        let (job_tx, job_rx) = mpsc::channel::<(usize, u64)>(workers * 2);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (out_tx, mut out_rx) = mpsc::channel::<(usize, BlockResult)>(workers * 2);

        let mut tasks = JoinSet::new();
        for _ in 0..workers {
            let jobs = Arc::clone(&job_rx);
            let out = out_tx.clone();
            let indexer = self.clone();
            tasks.spawn(async move {
                loop {
                    let job = { jobs.lock().await.recv().await };
                    let Some((slot, number)) = job else { break };
                    let result = match indexer.fetch_block(number).await {
                        Ok(block) => BlockResult {
                            number,
                            block: Some(block),
                            error: None,
                        },
                        Err(e) => BlockResult {
                            number,
                            block: None,
                            error: Some(BlockError {
                                error_type: BlockErrorType::Unknown,
                                message: e.to_string(),
                            }),
                        },
                    };
                    if out.send((slot, result)).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(out_tx);

        let heights: Vec<u64> = nums.to_vec();
        tasks.spawn(async move {
            for (slot, number) in heights.into_iter().enumerate() {
                if job_tx.send((slot, number)).await.is_err() {
                    break;
                }
            }
        });

        let mut results: Vec<Option<BlockResult>> = (0..nums.len()).map(|_| None).collect();
        while let Some((slot, result)) = out_rx.recv().await {
            results[slot] = Some(result);
        }
        while tasks.join_next().await.is_some() {}

        Ok(results
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.unwrap_or_else(|| BlockResult {
                    number: nums[i],
                    block: None,
                    error: Some(BlockError {
                        error_type: BlockErrorType::Unknown,
                        message: "worker aborted".into(),
                    }),
                })
            })
            .collect())
    }

    async fn is_healthy(&self) -> bool {
        matches!(
            tokio::time::timeout(HEALTH_PROBE_TIMEOUT, self.latest_height()).await,
            Ok(Ok(_))
        )
    }
}
