//! Normalized types emitted by every chain indexer.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::IndexerError;

// ─── Transfer ─────────────────────────────────────────────────────────────────

/// Network family an indexer serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    Btc,
    Evm,
    Tron,
    Solana,
}

impl std::fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Btc => write!(f, "btc"),
            Self::Evm => write!(f, "evm"),
            Self::Tron => write!(f, "tron"),
            Self::Solana => write!(f, "solana"),
        }
    }
}

/// Kind of value movement a transfer records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferType {
    /// Newly minted coins (coinbase output).
    Mining,
    /// Ordinary value transfer.
    Transfer,
}

/// A single normalized value transfer.
///
/// `asset_address` is empty for the chain's native asset. `amount` is a
/// decimal string so downstream consumers never touch binary floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub tx_hash: String,
    pub network_id: String,
    pub block_number: u64,
    pub from_address: String,
    pub to_address: String,
    pub asset_address: String,
    pub amount: String,
    #[serde(rename = "type")]
    pub transfer_type: TransferType,
    pub tx_fee: Decimal,
    pub timestamp: u64,
}

// ─── Block ────────────────────────────────────────────────────────────────────

/// A normalized block: header fields plus the transfers extracted from its
/// transactions, in block order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub number: u64,
    pub hash: String,
    pub parent_hash: String,
    pub timestamp: u64,
    pub transfers: Vec<Transfer>,
}

// ─── BlockResult ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockErrorType {
    Unknown,
}

/// Error recorded for a single slot of a batch fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockError {
    pub error_type: BlockErrorType,
    pub message: String,
}

/// One slot of a batch fetch: the requested height plus either the block or
/// the error that prevented fetching it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockResult {
    pub number: u64,
    pub block: Option<Block>,
    pub error: Option<BlockError>,
}

/// First errored slot of a batch result, in slot order.
pub fn first_error(results: &[BlockResult]) -> Option<IndexerError> {
    results.iter().find_map(|r| {
        r.error.as_ref().map(|e| IndexerError::Block {
            number: r.number,
            message: e.message.clone(),
        })
    })
}
