//! Execution node (JSON-RPC) queries.

use crate::{base_url, Error, SyncStatus};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{debug, trace};

/// Fixed JSON-RPC request asking whether the node is syncing.
pub const SYNCING_REQUEST: &str = r#"{"method":"eth_syncing","params":[],"id":1,"jsonrpc":"2.0"}"#;

#[derive(Deserialize)]
struct Response {
    result: Option<Syncing>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// `eth_syncing` returns `false` when synced and a progress object while syncing.
#[derive(Deserialize)]
#[serde(untagged)]
enum Syncing {
    Flag(bool),
    Progress(serde_json::Map<String, serde_json::Value>),
}

/// Decode an `eth_syncing` response body.
pub fn decode_syncing(body: &[u8]) -> Result<SyncStatus, Error> {
    let response: Response = serde_json::from_slice(body)?;
    if let Some(error) = response.error {
        return Err(Error::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    let is_syncing = match response.result.ok_or(Error::MissingResult)? {
        Syncing::Flag(is_syncing) => is_syncing,
        Syncing::Progress(progress) => {
            debug!(?progress, "execution node reported sync progress");
            true
        }
    };
    Ok(SyncStatus { is_syncing })
}

/// Client for the JSON-RPC endpoint of a single execution node.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base: String,
}

impl Client {
    pub fn new(http: reqwest::Client, host: &str, port: u16) -> Self {
        Self {
            http,
            base: base_url(host, port),
        }
    }

    /// Base URL of the node.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Ask the node whether it is syncing.
    pub async fn syncing(&self) -> Result<SyncStatus, Error> {
        trace!(base = %self.base, "querying execution node");
        let response = self
            .http
            .post(format!("{}/", self.base))
            .header(CONTENT_TYPE, "application/json")
            .body(SYNCING_REQUEST)
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;
        decode_syncing(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        http_client,
        tests::{closed_port, serve},
        DEFAULT_REQUEST_TIMEOUT,
    };
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    #[test]
    fn test_decode_flag() {
        let body = br#"{"jsonrpc":"2.0","id":1,"result":false}"#;
        assert_eq!(
            decode_syncing(body).unwrap(),
            SyncStatus { is_syncing: false }
        );
        let body = br#"{"jsonrpc":"2.0","id":1,"result":true}"#;
        assert_eq!(decode_syncing(body).unwrap(), SyncStatus { is_syncing: true });
    }

    #[test]
    fn test_decode_progress() {
        let body = br#"{"jsonrpc":"2.0","id":1,"result":{"startingBlock":"0x0","currentBlock":"0x10","highestBlock":"0x20"}}"#;
        assert_eq!(decode_syncing(body).unwrap(), SyncStatus { is_syncing: true });
        let body = br#"{"jsonrpc":"2.0","id":1,"result":{}}"#;
        assert_eq!(decode_syncing(body).unwrap(), SyncStatus { is_syncing: true });
    }

    #[test]
    fn test_decode_failures() {
        let body = br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"method not found"}}"#;
        match decode_syncing(body) {
            Err(Error::Rpc { code, message }) => {
                assert_eq!(code, -32601);
                assert_eq!(message, "method not found");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            decode_syncing(br#"{"jsonrpc":"2.0","id":1}"#),
            Err(Error::MissingResult)
        ));
        assert!(matches!(
            decode_syncing(br#"{"jsonrpc":"2.0","id":1,"result":"false"}"#),
            Err(Error::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_posts_fixed_request() {
        let router = Router::new().route(
            "/",
            post(|Json(request): Json<Value>| async move {
                assert_eq!(
                    request,
                    json!({"method": "eth_syncing", "params": [], "id": 1, "jsonrpc": "2.0"})
                );
                Json(json!({"jsonrpc": "2.0", "id": 1, "result": false}))
            }),
        );
        let addr = serve(router).await;
        let client = Client::new(
            http_client(DEFAULT_REQUEST_TIMEOUT).unwrap(),
            "127.0.0.1",
            addr.port(),
        );
        assert_eq!(
            client.syncing().await.unwrap(),
            SyncStatus { is_syncing: false }
        );
    }

    #[tokio::test]
    async fn test_unreachable_node() {
        let port = closed_port().await;
        let client = Client::new(
            http_client(DEFAULT_REQUEST_TIMEOUT).unwrap(),
            "127.0.0.1",
            port,
        );
        assert!(matches!(client.syncing().await, Err(Error::Transport(_))));
    }
}
