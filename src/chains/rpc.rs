// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-RPC 2.0 transport shared by the chain adapters.
//!
//! Adapters talk to the network only through [`JsonRpc`], so the HTTP client
//! can be swapped for a scripted transport in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// Errors that can occur while talking to a node.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcError {
    /// The request never produced a usable HTTP response.
    #[error("RPC transport error: {0}")]
    Transport(String),

    /// The node answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Server { code: i64, message: String },

    /// The node answered, but not in the expected shape.
    #[error("RPC decode error: {0}")]
    Decode(String),
}

/// JSON-RPC 2.0 "invalid params"; Solana also uses it for unknown accounts.
pub const INVALID_PARAMS: i64 = -32602;

impl RpcError {
    /// JSON-RPC error code, if the node answered with an error object.
    pub fn code(&self) -> Option<i64> {
        match self {
            RpcError::Server { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[async_trait]
pub trait JsonRpc: Send + Sync {
    /// Invoke `method` with positional `params` and return the `result` field.
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError>;
}

/// Deserialize an RPC result into a typed value.
pub fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T, RpcError> {
    serde_json::from_value(value).map_err(|e| RpcError::Decode(format!("{method}: {e}")))
}

/// Build the shared HTTP client used by every adapter.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, RpcError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RpcError::Transport(format!("failed to build HTTP client: {e}")))
}

/// JSON-RPC over HTTPS using a shared `reqwest` client.
pub struct HttpJsonRpc {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpJsonRpc {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl JsonRpc for HttpJsonRpc {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        tracing::trace!(method, id, "JSON-RPC request");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("{method}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RpcError::Transport(format!(
                "{method} returned HTTP {status}: {text}"
            )));
        }

        let mut envelope: Value = response
            .json()
            .await
            .map_err(|e| RpcError::Decode(format!("{method}: {e}")))?;

        if let Some(error) = envelope.get("error").filter(|e| !e.is_null()) {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            tracing::debug!(method, code, %message, "JSON-RPC error response");
            return Err(RpcError::Server { code, message });
        }

        Ok(envelope
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted transport for adapter tests.

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use super::*;

    type Handler = Arc<dyn Fn(&Value) -> Result<Value, RpcError> + Send + Sync>;

    /// Answers each method from a registered handler and records every call.
    #[derive(Default)]
    pub(crate) struct FakeRpc {
        handlers: Mutex<HashMap<String, Handler>>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl FakeRpc {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub(crate) fn on<F>(&self, method: &str, handler: F)
        where
            F: Fn(&Value) -> Result<Value, RpcError> + Send + Sync + 'static,
        {
            self.handlers
                .lock()
                .unwrap()
                .insert(method.to_string(), Arc::new(handler));
        }

        /// Always answer `method` with `result`.
        pub(crate) fn respond(&self, method: &str, result: Value) {
            self.on(method, move |_| Ok(result.clone()));
        }

        /// Always fail `method` with `error`.
        pub(crate) fn fail(&self, method: &str, error: RpcError) {
            self.on(method, move |_| Err(error.clone()));
        }

        pub(crate) fn calls_to(&self, method: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(m, _)| m == method)
                .count()
        }

        pub(crate) fn params_of(&self, method: &str) -> Vec<Value> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(m, _)| m == method)
                .map(|(_, p)| p.clone())
                .collect()
        }
    }

    #[async_trait]
    impl JsonRpc for FakeRpc {
        async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), params.clone()));
            let handler = self.handlers.lock().unwrap().get(method).cloned();
            match handler {
                Some(handler) => handler(&params),
                None => Err(RpcError::Server {
                    code: -32601,
                    message: format!("no scripted handler for {method}"),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeRpc;
    use super::*;

    #[tokio::test]
    async fn fake_records_calls_and_answers() {
        let rpc = FakeRpc::new();
        rpc.respond("getBalance", json!({ "value": 5 }));

        let result = rpc.call("getBalance", json!(["addr"])).await.unwrap();
        assert_eq!(result["value"], 5);
        assert_eq!(rpc.calls_to("getBalance"), 1);
        assert_eq!(rpc.params_of("getBalance")[0], json!(["addr"]));

        let missing = rpc.call("sendTransaction", json!([])).await;
        assert!(matches!(missing, Err(RpcError::Server { code: -32601, .. })));
    }

    #[test]
    fn decode_reports_method() {
        let err = decode::<u64>("getBalance", json!("nope")).unwrap_err();
        assert!(err.to_string().contains("getBalance"));
    }

    #[test]
    fn only_server_errors_carry_a_code() {
        assert_eq!(RpcError::Server { code: 1, message: "x".into() }.code(), Some(1));
        assert_eq!(RpcError::Transport("x".into()).code(), None);
    }
}
