//! End-to-end orchestrator tests against a mock Bitcoin Core endpoint.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use chainscan_bitcoin::{
    BitcoinApi, BitcoinIndexer, Block as RawBlock, ScriptPubKey, Transaction, TxOut, Vin, Vout,
};
use chainscan_core::{
    first_error, ChainConfig, ClientConfig, FailoverSettings, Indexer, NetworkKind, Throttle,
    TransferType,
};
use chainscan_rpc::{
    ClientError, Failover, FailoverConfig, Network, NetworkClient, ProviderState, RpcError,
};

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn spk(address: &str) -> ScriptPubKey {
    ScriptPubKey {
        address: address.into(),
        script_type: "witness_v0_keyhash".into(),
        ..Default::default()
    }
}

fn coinbase_block(height: u64) -> RawBlock {
    RawBlock {
        hash: format!("blk{height}"),
        height,
        time: 1_700_000_000 + height,
        previous_block_hash: format!("blk{}", height.saturating_sub(1)),
        tx: vec![Transaction {
            txid: format!("{height:064x}"),
            vin: vec![Vin {
                coinbase: "04ffff001d0104".into(),
                ..Default::default()
            }],
            vout: vec![Vout {
                value: dec("6.25"),
                n: 0,
                script_pub_key: spk("bc1qminer"),
            }],
            ..Default::default()
        }],
        ..Default::default()
    }
}

#[derive(Clone, Default)]
struct Counters {
    v3_calls: Arc<AtomicUsize>,
    v2_calls: Arc<AtomicUsize>,
    raw_tx_calls: Arc<AtomicUsize>,
    raw_tx_in_flight: Arc<AtomicUsize>,
    raw_tx_max_in_flight: Arc<AtomicUsize>,
    active_block_fetches: Arc<AtomicUsize>,
}

/// Decrements the active-fetch gauge even when the task is aborted.
struct FetchGuard(Arc<AtomicUsize>);

impl Drop for FetchGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct MockApi {
    url: String,
    latest: u64,
    fail_verbosity3: bool,
    fail_block_count: bool,
    /// Heights whose block fetch fails with a transport error.
    fail_heights: Vec<u64>,
    block_delay: Duration,
    raw_tx_delay: Duration,
    blocks: HashMap<u64, RawBlock>,
    prev_txs: HashMap<String, Transaction>,
    counters: Counters,
}

impl MockApi {
    fn new() -> Self {
        Self {
            url: "mock://bitcoind".into(),
            latest: 810_000,
            fail_verbosity3: false,
            fail_block_count: false,
            fail_heights: Vec::new(),
            block_delay: Duration::ZERO,
            raw_tx_delay: Duration::ZERO,
            blocks: HashMap::new(),
            prev_txs: HashMap::new(),
            counters: Counters::default(),
        }
    }

    fn block_for(&self, height: u64) -> RawBlock {
        self.blocks
            .get(&height)
            .cloned()
            .unwrap_or_else(|| coinbase_block(height))
    }

    async fn fetch_block(&self, hash: &str) -> Result<RawBlock, ClientError> {
        let height: u64 = hash
            .strip_prefix("blk")
            .and_then(|h| h.parse().ok())
            .expect("mock hash");
        self.counters.active_block_fetches.fetch_add(1, Ordering::SeqCst);
        let _guard = FetchGuard(self.counters.active_block_fetches.clone());
        if !self.block_delay.is_zero() {
            tokio::time::sleep(self.block_delay).await;
        }
        if self.fail_heights.contains(&height) {
            return Err(ClientError::Transport("mock: block unavailable".into()));
        }
        Ok(self.block_for(height))
    }
}

impl NetworkClient for MockApi {
    fn network(&self) -> Network {
        Network::Bitcoin
    }
    fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl BitcoinApi for MockApi {
    async fn get_block_count(&self) -> Result<u64, ClientError> {
        if self.fail_block_count {
            return Err(ClientError::Transport("mock: node down".into()));
        }
        Ok(self.latest)
    }

    async fn get_block_hash(&self, height: u64) -> Result<String, ClientError> {
        Ok(format!("blk{height}"))
    }

    async fn get_block_verbose(&self, hash: &str) -> Result<RawBlock, ClientError> {
        self.counters.v2_calls.fetch_add(1, Ordering::SeqCst);
        self.fetch_block(hash).await
    }

    async fn get_block_with_prev_out(&self, hash: &str) -> Result<RawBlock, ClientError> {
        self.counters.v3_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_verbosity3 {
            return Err(ClientError::Rpc(RpcError {
                code: -8,
                message: "verbosity 3 not supported".into(),
                data: None,
            }));
        }
        self.fetch_block(hash).await
    }

    async fn get_raw_transaction(
        &self,
        txid: &str,
        _verbosity: u8,
    ) -> Result<Transaction, ClientError> {
        self.counters.raw_tx_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.counters.raw_tx_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.raw_tx_max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.raw_tx_delay.is_zero() {
            tokio::time::sleep(self.raw_tx_delay).await;
        }
        self.counters.raw_tx_in_flight.fetch_sub(1, Ordering::SeqCst);

        self.prev_txs.get(txid).cloned().ok_or_else(|| {
            ClientError::Rpc(RpcError {
                code: -5,
                message: "No such mempool or blockchain transaction".into(),
                data: None,
            })
        })
    }

    async fn decode_raw_transaction(
        &self,
        _hex_tx: &str,
    ) -> Result<chainscan_bitcoin::DecodedRawTransaction, ClientError> {
        Err(ClientError::Unsupported("not mocked".into()))
    }

    async fn get_tx_out(
        &self,
        _txid: &str,
        _vout: u32,
        _include_mempool: bool,
    ) -> Result<Option<TxOut>, ClientError> {
        Ok(None)
    }
}

fn chain_config(concurrency: u32) -> ChainConfig {
    ChainConfig {
        network_id: "btc-mainnet".into(),
        internal_code: "BTC".into(),
        kind: NetworkKind::Btc,
        start_block: 0,
        poll_interval_ms: 1_000,
        reorg_rollback_window: 6,
        client: ClientConfig::default(),
        throttle: Throttle {
            concurrency,
            ..Default::default()
        },
        failover: FailoverSettings::default(),
        nodes: vec![],
    }
}

fn failover_config(max_retries: u32) -> FailoverConfig {
    FailoverConfig {
        max_retries,
        retry_delay: Duration::from_millis(1),
        max_retry_delay: Duration::from_millis(4),
        blacklist_cooldown: Duration::from_millis(50),
    }
}

fn indexer_with(mock: MockApi, concurrency: u32, max_retries: u32) -> BitcoinIndexer<MockApi> {
    let failover = Arc::new(Failover::new(vec![mock], failover_config(max_retries)));
    BitcoinIndexer::new("bitcoin", chain_config(concurrency), failover)
}

#[tokio::test]
async fn latest_block_number_and_identity() {
    let indexer = indexer_with(MockApi::new(), 4, 1);
    assert_eq!(indexer.latest_block_number().await.unwrap(), 810_000);
    assert_eq!(indexer.name(), "BITCOIN");
    assert_eq!(indexer.network_type(), NetworkKind::Btc);
    assert_eq!(indexer.network_id(), "btc-mainnet");
    assert_eq!(indexer.internal_code(), "BTC");
}

#[tokio::test]
async fn block_normalizes_coinbase_transfers() {
    let indexer = indexer_with(MockApi::new(), 4, 1);
    let block = indexer.block(810_000).await.unwrap();

    assert_eq!(block.number, 810_000);
    assert_eq!(block.hash, "blk810000");
    assert_eq!(block.parent_hash, "blk809999");
    assert_eq!(block.transfers.len(), 1);

    let t = &block.transfers[0];
    assert_eq!(t.from_address, "coinbase");
    assert_eq!(t.to_address, "bc1qminer");
    assert_eq!(t.amount, "6.25");
    assert_eq!(t.transfer_type, TransferType::Mining);
    assert!(t.tx_fee.is_zero());
}

#[tokio::test]
async fn verbosity_fallback_succeeds_without_provider_penalty() {
    let mut mock = MockApi::new();
    mock.fail_verbosity3 = true;
    let counters = mock.counters.clone();
    let indexer = indexer_with(mock, 4, 2);

    let block = indexer.block(42).await.unwrap();
    assert_eq!(block.number, 42);
    assert_eq!(counters.v3_calls.load(Ordering::SeqCst), 1);
    assert_eq!(counters.v2_calls.load(Ordering::SeqCst), 1);

    // The capability error must not have penalized the provider.
    for (_, state) in indexer.provider_health() {
        assert_eq!(state, ProviderState::Healthy);
    }
}

#[tokio::test]
async fn enrichment_recovers_fees_from_verbosity_2() {
    let prev_txid = "cc".repeat(32);
    let spend = Transaction {
        txid: "ab".repeat(32),
        vin: vec![Vin {
            txid: prev_txid.clone(),
            vout: 0,
            ..Default::default()
        }],
        vout: vec![
            Vout {
                value: dec("0.3"),
                n: 0,
                script_pub_key: spk("addrB"),
            },
            Vout {
                value: dec("0.69"),
                n: 1,
                script_pub_key: spk("addrA"),
            },
        ],
        ..Default::default()
    };
    let mut block = coinbase_block(500);
    block.tx.push(spend);

    let mut mock = MockApi::new();
    mock.fail_verbosity3 = true; // force the v2 + enrichment path
    mock.blocks.insert(500, block);
    mock.prev_txs.insert(
        prev_txid,
        Transaction {
            txid: "cc".repeat(32),
            vout: vec![Vout {
                value: dec("1.0"),
                n: 0,
                script_pub_key: spk("addrA"),
            }],
            ..Default::default()
        },
    );
    let indexer = indexer_with(mock, 4, 1);

    let normalized = indexer.block(500).await.unwrap();
    // 1 coinbase transfer + 2 spend transfers
    assert_eq!(normalized.transfers.len(), 3);

    let to_b = normalized
        .transfers
        .iter()
        .find(|t| t.to_address == "addrB")
        .unwrap();
    assert_eq!(to_b.from_address, "addrA");
    assert_eq!(to_b.tx_fee, dec("0.01"));

    let change = normalized
        .transfers
        .iter()
        .find(|t| t.to_address == "addrA")
        .unwrap();
    assert!(change.tx_fee.is_zero());
}

#[tokio::test]
async fn enrichment_failure_is_not_fatal() {
    let spend = Transaction {
        txid: "ab".repeat(32),
        vin: vec![Vin {
            txid: "dd".repeat(32), // unknown to the mock
            vout: 0,
            ..Default::default()
        }],
        vout: vec![Vout {
            value: dec("0.5"),
            n: 0,
            script_pub_key: spk("addrB"),
        }],
        ..Default::default()
    };
    let mut block = coinbase_block(501);
    block.tx.push(spend);

    let mut mock = MockApi::new();
    mock.fail_verbosity3 = true;
    mock.blocks.insert(501, block);
    let indexer = indexer_with(mock, 4, 1);

    let normalized = indexer.block(501).await.unwrap();
    let to_b = normalized
        .transfers
        .iter()
        .find(|t| t.to_address == "addrB")
        .unwrap();
    // Unknown sender fallback: no prevout data could be recovered.
    assert_eq!(to_b.from_address, "");
    assert!(to_b.tx_fee.is_zero());
}

#[tokio::test]
async fn blocks_by_numbers_preserves_slot_order() {
    let mut mock = MockApi::new();
    mock.block_delay = Duration::from_millis(5);
    let indexer = indexer_with(mock, 4, 1);

    let nums = [905u64, 901, 909, 903, 907, 902];
    let results = indexer.blocks_by_numbers(&nums).await.unwrap();

    assert_eq!(results.len(), nums.len());
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.number, nums[i]);
        let block = result.block.as_ref().expect("block fetched");
        assert_eq!(block.number, nums[i]);
        assert!(result.error.is_none());
    }
    assert!(first_error(&results).is_none());
}

#[tokio::test]
async fn blocks_by_numbers_records_per_slot_errors() {
    let mut mock = MockApi::new();
    mock.fail_heights = vec![907];
    let indexer = indexer_with(mock, 4, 0);

    let nums = [905u64, 906, 907, 908];
    let results = indexer.blocks_by_numbers(&nums).await.unwrap();

    assert!(results[0].error.is_none());
    assert!(results[1].error.is_none());
    assert!(results[3].error.is_none());

    let failed = &results[2];
    assert_eq!(failed.number, 907);
    assert!(failed.block.is_none());
    assert!(failed.error.is_some());

    let err = first_error(&results).unwrap();
    assert!(err.to_string().contains("907"));
}

#[tokio::test]
async fn blocks_validates_range() {
    let indexer = indexer_with(MockApi::new(), 4, 1);
    assert!(indexer.blocks(10, 5).await.is_err());
    assert!(indexer.blocks_by_numbers(&[]).await.unwrap().is_empty());

    let results = indexer.blocks(100, 103).await.unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(results[0].number, 100);
    assert_eq!(results[3].number, 103);
}

#[tokio::test]
async fn cancelled_batch_fetch_leaves_no_workers_behind() {
    let mut mock = MockApi::new();
    mock.block_delay = Duration::from_secs(30);
    let counters = mock.counters.clone();
    let indexer = indexer_with(mock, 4, 0);

    let nums: Vec<u64> = (1..=8).collect();
    let outcome =
        tokio::time::timeout(Duration::from_millis(100), indexer.blocks_by_numbers(&nums)).await;
    assert!(outcome.is_err(), "call should have been cancelled");

    // Dropping the call aborts the worker set; the in-flight gauge drains.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(counters.active_block_fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn enrichment_concurrency_is_capped() {
    let mut block = RawBlock {
        hash: "blk600".into(),
        height: 600,
        time: 1_700_000_600,
        ..Default::default()
    };
    let mut mock = MockApi::new();
    for i in 0..50u64 {
        let prev_txid = format!("{i:064x}");
        block.tx.push(Transaction {
            txid: format!("{:064x}", 1_000 + i),
            vin: vec![Vin {
                txid: prev_txid.clone(),
                vout: 0,
                ..Default::default()
            }],
            vout: vec![Vout {
                value: dec("0.1"),
                n: 0,
                script_pub_key: spk("addrOut"),
            }],
            ..Default::default()
        });
        mock.prev_txs.insert(
            prev_txid.clone(),
            Transaction {
                txid: prev_txid,
                vout: vec![Vout {
                    value: dec("0.2"),
                    n: 0,
                    script_pub_key: spk("addrIn"),
                }],
                ..Default::default()
            },
        );
    }
    mock.raw_tx_delay = Duration::from_millis(10);
    let counters = mock.counters.clone();

    mock.enrich_block_with_prev_outs(&mut block).await.unwrap();

    assert_eq!(counters.raw_tx_calls.load(Ordering::SeqCst), 50);
    let max = counters.raw_tx_max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 10, "observed {max} concurrent getrawtransaction calls");
    assert!(max > 1, "enrichment ran sequentially");
    for tx in &block.tx {
        assert!(tx.vin[0].prev_out.is_some(), "vin left unenriched");
    }
}

#[tokio::test]
async fn enrichment_deduplicates_prev_txid_within_a_transaction() {
    let prev_txid = "ee".repeat(32);
    let mut block = RawBlock {
        hash: "blk601".into(),
        height: 601,
        time: 1_700_000_601,
        tx: vec![Transaction {
            txid: "ab".repeat(32),
            vin: (0..3)
                .map(|n| Vin {
                    txid: prev_txid.clone(),
                    vout: n,
                    ..Default::default()
                })
                .collect(),
            vout: vec![Vout {
                value: dec("0.1"),
                n: 0,
                script_pub_key: spk("addrOut"),
            }],
            ..Default::default()
        }],
        ..Default::default()
    };

    let mut mock = MockApi::new();
    mock.prev_txs.insert(
        prev_txid.clone(),
        Transaction {
            txid: prev_txid,
            vout: (0..3)
                .map(|n| Vout {
                    value: dec("0.05"),
                    n,
                    script_pub_key: spk(&format!("addr{n}")),
                })
                .collect(),
            ..Default::default()
        },
    );
    let counters = mock.counters.clone();

    mock.enrich_block_with_prev_outs(&mut block).await.unwrap();

    assert_eq!(counters.raw_tx_calls.load(Ordering::SeqCst), 1);
    for (n, vin) in block.tx[0].vin.iter().enumerate() {
        let prev = vin.prev_out.as_ref().expect("vin enriched");
        assert_eq!(prev.script_pub_key.address, format!("addr{n}"));
    }
}

#[tokio::test]
async fn out_of_range_prev_index_is_skipped() {
    let prev_txid = "ff".repeat(32);
    let mut block = RawBlock {
        hash: "blk602".into(),
        height: 602,
        time: 1_700_000_602,
        tx: vec![Transaction {
            txid: "ab".repeat(32),
            vin: vec![Vin {
                txid: prev_txid.clone(),
                vout: 9, // prev tx only has one output
                ..Default::default()
            }],
            vout: vec![],
            ..Default::default()
        }],
        ..Default::default()
    };

    let mut mock = MockApi::new();
    mock.prev_txs.insert(
        prev_txid.clone(),
        Transaction {
            txid: prev_txid,
            vout: vec![Vout {
                value: dec("0.05"),
                n: 0,
                script_pub_key: spk("addrX"),
            }],
            ..Default::default()
        },
    );

    mock.enrich_block_with_prev_outs(&mut block).await.unwrap();
    assert!(block.tx[0].vin[0].prev_out.is_none());
}

#[tokio::test]
async fn health_probe() {
    let indexer = indexer_with(MockApi::new(), 4, 0);
    assert!(indexer.is_healthy().await);

    let mut down = MockApi::new();
    down.fail_block_count = true;
    let indexer = indexer_with(down, 4, 0);
    assert!(!indexer.is_healthy().await);
}
