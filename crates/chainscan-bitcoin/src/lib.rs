//! chainscan-bitcoin — the Bitcoin ingestion pipeline.
//!
//! # Pipeline
//!
//! ```text
//! height → (failover) getblockhash → getblock v3
//!              │                        │ unsupported
//!              │                        └→ getblock v2 → prevout enrichment
//!              └→ per-tx fee → transfer extraction → normalized Block
//! ```
//!
//! - [`BitcoinApi`] — the Bitcoin Core RPC capability, with prevout
//!   enrichment shared by every implementation
//! - [`BitcoinClient`] — the HTTP implementation on top of `chainscan-rpc`
//! - [`BitcoinIndexer`] — the orchestrator implementing the core
//!   [`Indexer`](chainscan_core::Indexer) contract
//! - [`address`] — Base58Check/Bech32 validation and classification
//! - [`transfer`] — UTXO transfer extraction rules

pub mod address;
pub mod api;
pub mod client;
pub mod fee;
pub mod indexer;
pub mod transfer;
pub mod types;

pub use address::{
    detect_address_type, extract_addresses, is_valid_address, is_valid_base58_address,
    is_valid_bech32_address, normalize_address, script_type_to_address_type, AddressType,
};
pub use api::{BitcoinApi, MAX_CONCURRENT_PREVOUT_FETCHES};
pub use client::BitcoinClient;
pub use fee::{btc_to_satoshi, fee_priority, satoshi_to_btc, FeePriority};
pub use indexer::BitcoinIndexer;
pub use transfer::COINBASE_SENDER;
pub use types::{
    Block, DecodedRawTransaction, PrevOut, ScriptPubKey, ScriptSig, Transaction, TxOut, Vin, Vout,
};
