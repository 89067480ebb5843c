//! JSON-RPC client for bitcoin-style chain daemons

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use rpc_core::{ChainSource, Hash, RawBlock, RawTx, RpcError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::RpcConfig;

/// Daemon error code for "No information available about transaction".
const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    user: Option<String>,
    password: Option<String>,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(config: &RpcConfig) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RpcError::SourceUnavailable(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            http,
            url: config.url.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call_method<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "1.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        trace!(method, id = request.id, "rpc call");

        let mut builder = self.http.post(&self.url).json(&request);
        if let Some(user) = &self.user {
            builder = builder.basic_auth(user, self.password.as_ref());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RpcError::SourceUnavailable(format!("{method}: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RpcError::SourceUnavailable(format!(
                "{method}: authorization rejected ({status}), check rpc user/password"
            )));
        }

        // The daemon reports RPC failures with a 4xx/5xx status and a JSON body,
        // so the body is decoded before the status is judged.
        let body = response
            .text()
            .await
            .map_err(|e| RpcError::SourceUnavailable(format!("{method}: {e}")))?;
        let envelope: JsonRpcResponse = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(RpcError::SourceUnavailable(format!(
                    "{method}: HTTP {status}: {}",
                    body.chars().take(200).collect::<String>()
                )));
            }
            Err(e) => return Err(RpcError::parse(method, e)),
        };

        if let Some(error) = envelope.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        serde_json::from_value(envelope.result).map_err(|e| RpcError::parse(method, e))
    }
}

#[async_trait]
impl ChainSource for RpcClient {
    async fn tip_height(&self) -> Result<u64, RpcError> {
        self.call_method("getblockcount", serde_json::json!([])).await
    }

    async fn hash_at(&self, height: u64) -> Result<Hash, RpcError> {
        self.call_method("getblockhash", serde_json::json!([height])).await
    }

    async fn block(&self, hash: &Hash) -> Result<RawBlock, RpcError> {
        self.call_method("getblock", serde_json::json!([hash.as_str()])).await
    }

    async fn raw_tx(&self, txid: &Hash) -> Result<RawTx, RpcError> {
        let params = serde_json::json!([txid.as_str(), 1]);
        match self.call_method("getrawtransaction", params).await {
            Err(RpcError::Rpc { code, .. }) if code == RPC_INVALID_ADDRESS_OR_KEY => {
                Err(RpcError::TransactionNotFound(txid.clone()))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP reply and returns the URL to reach it.
    async fn serve_once(status: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await.unwrap();
            let reply = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn client(url: String) -> RpcClient {
        RpcClient::new(&RpcConfig {
            url,
            user: Some("user".into()),
            password: Some("pass".into()),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_tip_height() {
        let url = serve_once("200 OK", r#"{"result":42,"error":null,"id":1}"#.into()).await;
        assert_eq!(client(url).tip_height().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_missing_transaction_maps_to_not_found() {
        let body = r#"{"result":null,"error":{"code":-5,"message":"No information available about transaction"},"id":1}"#;
        let url = serve_once("500 Internal Server Error", body.into()).await;
        let txid: Hash = "ab".repeat(32).parse().unwrap();

        let err = client(url).raw_tx(&txid).await.unwrap_err();
        assert_eq!(err, RpcError::TransactionNotFound(txid));
    }

    #[tokio::test]
    async fn test_unauthorized_is_source_unavailable() {
        let url = serve_once("401 Unauthorized", String::new()).await;
        let err = client(url).tip_height().await.unwrap_err();
        assert!(matches!(err, RpcError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_malformed_result_is_parse_error() {
        let url = serve_once("200 OK", r#"{"result":"not-a-hash","error":null,"id":1}"#.into()).await;
        let err = client(url).hash_at(7).await.unwrap_err();
        assert!(matches!(err, RpcError::Parse { ref method, .. } if method == "getblockhash"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_source_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(format!("http://{addr}/")).tip_height().await.unwrap_err();
        assert!(matches!(err, RpcError::SourceUnavailable(_)));
    }
}
