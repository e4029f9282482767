use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("rpc transport error: {0}")]
    Transport(String),
    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    #[error("unexpected rpc response: {0}")]
    Decode(String),
}

impl RpcError {
    /// Hex payload attached to an execution revert, if the node returned one.
    pub fn revert_data(&self) -> Option<Vec<u8>> {
        let RpcError::Rpc { data: Some(data), .. } = self else {
            return None;
        };
        let raw = match data {
            Value::String(raw) => raw.as_str(),
            Value::Object(map) => map.get("data").and_then(Value::as_str)?,
            _ => return None,
        };
        hex::decode(raw.trim_start_matches("0x")).ok()
    }
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

/// Minimal JSON-RPC 2.0 client over HTTP.
pub struct JsonRpcClient {
    endpoint: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!("rpc {} id={} -> {}", method, id, self.endpoint);

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| RpcError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RpcError::Transport(format!("HTTP {status}: {text}")));
        }

        let parsed: RpcResponse = response
            .json()
            .await
            .map_err(|err| RpcError::Decode(err.to_string()))?;
        into_result(method, parsed)
    }
}

fn into_result<T: DeserializeOwned>(method: &str, response: RpcResponse) -> Result<T, RpcError> {
    if let Some(error) = response.error {
        return Err(RpcError::Rpc {
            code: error.code,
            message: error.message,
            data: error.data,
        });
    }
    let result = response.result.unwrap_or(Value::Null);
    serde_json::from_value(result).map_err(|err| RpcError::Decode(format!("{method}: {err}")))
}

/// Parses a `0x`-prefixed hex quantity such as `"0x1b4"`.
pub fn parse_quantity(raw: &str) -> Result<u128, RpcError> {
    let bare = raw.trim_start_matches("0x");
    if bare.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(bare, 16).map_err(|_| RpcError::Decode(format!("bad quantity {raw:?}")))
}

pub fn to_quantity(value: u128) -> String {
    format!("0x{value:x}")
}
