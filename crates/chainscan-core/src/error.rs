//! Error types for the indexing pipeline.

use thiserror::Error;

use chainscan_rpc::FailoverError;

/// Errors that can occur while indexing.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error(transparent)]
    Failover(#[from] FailoverError),

    #[error("invalid block range {from}..{to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("block {number}: {message}")]
    Block { number: u64, message: String },

    #[error("{0}")]
    Other(String),
}
