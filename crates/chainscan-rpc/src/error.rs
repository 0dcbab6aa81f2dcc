//! Client-level error types.

use thiserror::Error;

use crate::request::RpcError;

/// Errors that can occur during a single RPC call.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection refused, I/O failure, non-2xx HTTP status.
    #[error("transport error: {0}")]
    Transport(String),

    /// Request deadline exceeded.
    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Structured error returned by the node (code and message preserved).
    #[error("{0}")]
    Rpc(RpcError),

    /// Malformed or unexpected JSON from the server.
    #[error("decode error: {0}")]
    Decode(String),

    /// The operation is not supported by this client.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl ClientError {
    /// Returns `true` if this error is transient and worth retrying on
    /// another provider.
    ///
    /// Decode errors are not retryable: the provider answered, the payload
    /// was just not what we expected. Structured RPC errors default to
    /// retryable unless they signal a missing capability.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout { .. } => true,
            Self::Rpc(e) => !e.is_capability_error(),
            Self::Decode(_) | Self::Unsupported(_) => false,
        }
    }

    /// Returns `true` if the provider lacks a capability (unknown method,
    /// unsupported verbosity). Never a provider fault.
    pub fn is_capability_error(&self) -> bool {
        match self {
            Self::Rpc(e) => e.is_capability_error(),
            Self::Unsupported(_) => true,
            _ => false,
        }
    }
}
