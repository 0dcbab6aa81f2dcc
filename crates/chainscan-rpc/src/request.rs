//! JSON-RPC 2.0 wire types.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

use crate::error::ClientError;

/// JSON-RPC request ID — string, number, or null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(u64),
    String(String),
    #[default]
    Null,
}

impl std::fmt::Display for RpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// A single JSON-RPC parameter value.
pub type RpcParam = Value;

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<RpcParam>,
    pub id: RpcId,
}

impl RpcRequest {
    /// Create a new JSON-RPC 2.0 request.
    pub fn new(id: u64, method: impl Into<String>, params: Vec<RpcParam>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id: RpcId::Number(id),
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC "method not found" code.
pub const METHOD_NOT_FOUND: i64 = -32601;

impl RpcError {
    /// Returns `true` if the server is signalling a missing capability
    /// (unknown method, unsupported verbosity) rather than a fault.
    ///
    /// Capability errors are surfaced to the caller without penalizing the
    /// provider — the verbosity-fallback ladder consumes them.
    pub fn is_capability_error(&self) -> bool {
        if self.code == METHOD_NOT_FOUND {
            return true;
        }
        let msg = self.message.to_ascii_lowercase();
        msg.contains("method not found")
            || msg.contains("not supported")
            || msg.contains("unsupported")
            || msg.contains("verbosity")
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC error {}: {}", self.code, self.message)
    }
}

/// A JSON-RPC 2.0 response.
///
/// `result` stays raw until a typed façade decodes it — the substrate never
/// inspects payloads it only forwards. Bitcoin Core omits the `jsonrpc`
/// member on its 1.x-style responses, hence the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: RpcId,
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Box<RawValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// Decode the raw `result` into a concrete type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        match &self.result {
            Some(raw) => serde_json::from_str(raw.get())
                .map_err(|e| ClientError::Decode(e.to_string())),
            None => Err(ClientError::Decode("missing result".into())),
        }
    }

    /// Returns `true` if the server answered with a `null` (or absent) result.
    pub fn is_null_result(&self) -> bool {
        self.result.is_none()
    }
}
