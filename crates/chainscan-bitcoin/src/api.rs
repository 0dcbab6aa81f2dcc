//! The Bitcoin Core RPC capability.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use chainscan_rpc::{ClientError, NetworkClient};

use crate::types::{Block, DecodedRawTransaction, PrevOut, Transaction, TxOut};

/// In-flight cap for per-transaction prevout enrichment tasks.
pub const MAX_CONCURRENT_PREVOUT_FETCHES: usize = 10;

/// The subset of Bitcoin Core RPC the indexer needs.
///
/// `get_block_with_prev_out` (verbosity=3, Bitcoin Core ≥ 24.0) surfaces
/// errors untouched — the orchestrator owns the fallback ladder to
/// verbosity=2.
#[async_trait]
pub trait BitcoinApi: NetworkClient {
    /// `getblockcount`
    async fn get_block_count(&self) -> Result<u64, ClientError>;

    /// `getblockhash <height>`
    async fn get_block_hash(&self, height: u64) -> Result<String, ClientError>;

    /// `getblock <hash> 2` — fully decoded transactions.
    async fn get_block_verbose(&self, hash: &str) -> Result<Block, ClientError>;

    /// `getblock <hash> 3` — decoded transactions with prevout data.
    async fn get_block_with_prev_out(&self, hash: &str) -> Result<Block, ClientError>;

    /// `getrawtransaction <txid> <verbosity>`; verbosity 0 (hex-only) is
    /// rejected before dispatch.
    async fn get_raw_transaction(
        &self,
        txid: &str,
        verbosity: u8,
    ) -> Result<Transaction, ClientError>;

    /// `decoderawtransaction <hex>`
    async fn decode_raw_transaction(
        &self,
        hex_tx: &str,
    ) -> Result<DecodedRawTransaction, ClientError>;

    /// `gettxout <txid> <n> <include_mempool>`; `None` when the output is
    /// already spent (the RPC yields `null`).
    async fn get_tx_out(
        &self,
        txid: &str,
        vout: u32,
        include_mempool: bool,
    ) -> Result<Option<TxOut>, ClientError>;

    /// Stitch prevout data onto a block fetched at verbosity=2.
    ///
    /// For every non-coinbase transaction without prevout data, fetches each
    /// referenced prior transaction (once per distinct txid within the
    /// transaction) and assigns `vout[prev_index]` into the spending input.
    /// At most [`MAX_CONCURRENT_PREVOUT_FETCHES`] transactions are enriched
    /// concurrently; per-input failures degrade fee accuracy but never fail
    /// the block. Returns once every scheduled task has finished.
    async fn enrich_block_with_prev_outs(&self, block: &mut Block) -> Result<(), ClientError> {
        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_PREVOUT_FETCHES));

        let tasks = block
            .tx
            .iter_mut()
            .filter(|tx| !tx.is_coinbase() && !tx.has_prev_out_data())
            .map(|tx| {
                let semaphore = Arc::clone(&semaphore);
                async move {
                    let Ok(_permit) = semaphore.acquire().await else {
                        return;
                    };
                    let mut fetched: HashMap<String, Transaction> = HashMap::new();
                    for vin in &mut tx.vin {
                        if vin.txid.is_empty() || vin.is_coinbase() {
                            continue;
                        }
                        if !fetched.contains_key(&vin.txid) {
                            match self.get_raw_transaction(&vin.txid, 1).await {
                                Ok(prev_tx) => {
                                    fetched.insert(vin.txid.clone(), prev_tx);
                                }
                                Err(e) => {
                                    tracing::debug!(
                                        txid = %vin.txid,
                                        error = %e,
                                        "failed to fetch previous transaction"
                                    );
                                    continue;
                                }
                            }
                        }
                        let Some(prev_tx) = fetched.get(&vin.txid) else {
                            continue;
                        };
                        if let Some(prev) = prev_tx.vout.get(vin.vout as usize) {
                            vin.prev_out = Some(PrevOut {
                                value: prev.value,
                                script_pub_key: prev.script_pub_key.clone(),
                            });
                        }
                    }
                }
            });

        futures::future::join_all(tasks).await;
        Ok(())
    }
}
