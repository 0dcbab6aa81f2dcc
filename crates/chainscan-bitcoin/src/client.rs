//! Typed Bitcoin Core JSON-RPC client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use chainscan_rpc::{Auth, BaseClient, ClientError, ClientType, Network, NetworkClient, RateLimiter};

use crate::api::BitcoinApi;
use crate::types::{Block, DecodedRawTransaction, Transaction, TxOut};

/// Bitcoin Core client bound to one endpoint.
pub struct BitcoinClient {
    base: BaseClient,
}

impl BitcoinClient {
    pub fn new(
        url: impl Into<String>,
        auth: Auth,
        timeout: Duration,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            base: BaseClient::new(url, Network::Bitcoin, ClientType::Rpc, auth, timeout, limiter),
        }
    }
}

impl NetworkClient for BitcoinClient {
    fn network(&self) -> Network {
        self.base.network()
    }

    fn url(&self) -> &str {
        self.base.url()
    }
}

#[async_trait]
impl BitcoinApi for BitcoinClient {
    async fn get_block_count(&self) -> Result<u64, ClientError> {
        let resp = self.base.call_rpc("getblockcount", vec![]).await?;
        resp.decode()
    }

    async fn get_block_hash(&self, height: u64) -> Result<String, ClientError> {
        let resp = self
            .base
            .call_rpc("getblockhash", vec![json!(height)])
            .await?;
        resp.decode()
    }

    async fn get_block_verbose(&self, hash: &str) -> Result<Block, ClientError> {
        // verbosity=2 returns fully decoded txs
        let resp = self
            .base
            .call_rpc("getblock", vec![json!(hash), json!(2)])
            .await?;
        resp.decode()
    }

    async fn get_block_with_prev_out(&self, hash: &str) -> Result<Block, ClientError> {
        // verbosity=3 includes prevout data; Bitcoin Core 24.0+
        let resp = self
            .base
            .call_rpc("getblock", vec![json!(hash), json!(3)])
            .await?;
        resp.decode()
    }

    async fn get_raw_transaction(
        &self,
        txid: &str,
        verbosity: u8,
    ) -> Result<Transaction, ClientError> {
        if verbosity == 0 {
            return Err(ClientError::Unsupported(
                "hex format not supported, use verbosity >= 1".into(),
            ));
        }
        let resp = self
            .base
            .call_rpc("getrawtransaction", vec![json!(txid), json!(verbosity)])
            .await?;
        resp.decode()
    }

    async fn decode_raw_transaction(
        &self,
        hex_tx: &str,
    ) -> Result<DecodedRawTransaction, ClientError> {
        let resp = self
            .base
            .call_rpc("decoderawtransaction", vec![json!(hex_tx)])
            .await?;
        resp.decode()
    }

    async fn get_tx_out(
        &self,
        txid: &str,
        vout: u32,
        include_mempool: bool,
    ) -> Result<Option<TxOut>, ClientError> {
        let resp = self
            .base
            .call_rpc(
                "gettxout",
                vec![json!(txid), json!(vout), json!(include_mempool)],
            )
            .await?;
        // null result means the output is already spent
        if resp.is_null_result() {
            return Ok(None);
        }
        resp.decode().map(Some)
    }
}
