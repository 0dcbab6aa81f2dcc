//! The base JSON-RPC client: one endpoint, one auth descriptor, one timeout,
//! one (shared) rate limiter. Stateless with respect to provider health —
//! health lives in the failover layer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientError;
use crate::policy::RateLimiter;
use crate::request::{RpcRequest, RpcResponse};

/// Supported blockchain network families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Evm,
    Solana,
    Tron,
    Bitcoin,
    Generic,
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Evm => write!(f, "evm"),
            Self::Solana => write!(f, "solana"),
            Self::Tron => write!(f, "tron"),
            Self::Bitcoin => write!(f, "bitcoin"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

/// Communication protocol spoken by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    Rpc,
    Rest,
}

/// Per-endpoint authentication, injected into every outbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Auth {
    #[default]
    None,
    Header {
        key: String,
        value: String,
    },
    Query {
        key: String,
        value: String,
    },
}

/// Capability every chain client exposes to the failover layer.
pub trait NetworkClient: Send + Sync + 'static {
    /// The network family this client speaks.
    fn network(&self) -> Network;
    /// The endpoint identifier (URL).
    fn url(&self) -> &str;
}

/// HTTP JSON-RPC client bound to a single endpoint.
pub struct BaseClient {
    url: String,
    network: Network,
    client_type: ClientType,
    auth: Auth,
    timeout: Duration,
    http: reqwest::Client,
    limiter: Arc<RateLimiter>,
    next_id: AtomicU64,
}

impl BaseClient {
    pub fn new(
        url: impl Into<String>,
        network: Network,
        client_type: ClientType,
        auth: Auth,
        timeout: Duration,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");

        Self {
            url: url.into(),
            network,
            client_type,
            auth,
            timeout,
            http,
            limiter,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn client_type(&self) -> ClientType {
        self.client_type
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue a JSON-RPC 2.0 call.
    ///
    /// Acquires one rate-limiter token before dispatch (may sleep). A
    /// transport-level success carrying a non-null `error` member surfaces
    /// as [`ClientError::Rpc`].
    pub async fn call_rpc(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<RpcResponse, ClientError> {
        self.limiter.acquire().await;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = RpcRequest::new(id, method, params);

        let mut builder = self.http.post(&self.url);
        match &self.auth {
            Auth::None => {}
            Auth::Header { key, value } => {
                builder = builder.header(key.as_str(), value.as_str());
            }
            Auth::Query { key, value } => {
                builder = builder.query(&[(key.as_str(), value.as_str())]);
            }
        }

        let resp = builder.json(&req).send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout {
                    ms: self.timeout.as_millis() as u64,
                }
            } else {
                ClientError::Transport(e.to_string())
            }
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Transport(format!("HTTP {status}: {body}")));
        }

        let decoded: RpcResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        if let Some(err) = decoded.error {
            tracing::debug!(method, code = err.code, message = %err.message, "rpc error response");
            return Err(ClientError::Rpc(err));
        }

        Ok(decoded)
    }
}
