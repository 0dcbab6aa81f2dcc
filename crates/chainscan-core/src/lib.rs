//! chainscan-core — chain-agnostic contracts for the indexer pipeline.
//!
//! # Architecture
//!
//! ```text
//! scheduler → Indexer (per chain) → Block { transfers: Vec<Transfer> }
//!                 │
//!                 └── chainscan-rpc (failover, rate limiting, base client)
//! ```
//!
//! The core crate defines:
//!
//! - [`Transfer`] / [`Block`] / [`BlockResult`] — the normalized output
//! - [`Indexer`] — the capability every chain implementation exposes
//! - [`ChainConfig`] — per-chain configuration
//! - [`IndexerError`] — pipeline error taxonomy

pub mod config;
pub mod error;
pub mod indexer;
pub mod types;

pub use config::{ChainConfig, ClientConfig, FailoverSettings, NodeConfig, Throttle};
pub use error::IndexerError;
pub use indexer::Indexer;
pub use types::{
    first_error, Block, BlockError, BlockErrorType, BlockResult, NetworkKind, Transfer,
    TransferType,
};
