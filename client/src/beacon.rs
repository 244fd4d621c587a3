//! Consensus node (beacon API) queries.

use crate::{base_url, Error, SyncStatus};
use serde::Deserialize;
use tracing::trace;

/// Path of the head state's finality checkpoints.
pub const FINALITY_CHECKPOINTS_PATH: &str = "eth/v1/beacon/states/head/finality_checkpoints";

/// Path of the node's sync status.
pub const SYNCING_PATH: &str = "eth/v1/node/syncing";

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct FinalityCheckpoints {
    finalized: Checkpoint,
}

#[derive(Deserialize)]
struct Checkpoint {
    epoch: String,
}

#[derive(Deserialize)]
struct Syncing {
    is_syncing: bool,
}

/// The most recent finalized checkpoint of a consensus node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FinalityCheckpoint {
    pub epoch: u64,
}

impl FinalityCheckpoint {
    /// Decode a `finality_checkpoints` response body.
    ///
    /// The beacon API encodes the epoch as a decimal string.
    pub fn decode(body: &[u8]) -> Result<Self, Error> {
        let response: Envelope<FinalityCheckpoints> = serde_json::from_slice(body)?;
        let epoch = response.data.finalized.epoch;
        let epoch = epoch
            .parse::<u64>()
            .map_err(|_| Error::InvalidEpoch(epoch))?;
        Ok(Self { epoch })
    }
}

/// Decode a `node/syncing` response body.
pub fn decode_syncing(body: &[u8]) -> Result<SyncStatus, Error> {
    let response: Envelope<Syncing> = serde_json::from_slice(body)?;
    Ok(SyncStatus {
        is_syncing: response.data.is_syncing,
    })
}

/// Client for the beacon API of a single consensus node.
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

    /// Fetch the finalized checkpoint of the head state.
    pub async fn finality_checkpoint(&self) -> Result<FinalityCheckpoint, Error> {
        let body = self.get(FINALITY_CHECKPOINTS_PATH).await?;
        FinalityCheckpoint::decode(&body)
    }

    /// Fetch whether the node is syncing.
    pub async fn syncing(&self) -> Result<SyncStatus, Error> {
        let body = self.get(SYNCING_PATH).await?;
        decode_syncing(&body)
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, Error> {
        let url = format!("{}/{}", self.base, path);
        trace!(%url, "querying beacon node");
        let response = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
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
    use axum::{http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    fn finality(epoch: &str) -> Vec<u8> {
        json!({
            "execution_optimistic": false,
            "data": {
                "previous_justified": {"epoch": "1", "root": "0x00"},
                "current_justified": {"epoch": "2", "root": "0x00"},
                "finalized": {"epoch": epoch, "root": "0x00"}
            }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_decode_epoch() {
        assert_eq!(
            FinalityCheckpoint::decode(&finality("0")).unwrap(),
            FinalityCheckpoint { epoch: 0 }
        );
        assert_eq!(
            FinalityCheckpoint::decode(&finality("18446744073709551615")).unwrap(),
            FinalityCheckpoint { epoch: u64::MAX }
        );
    }

    #[test]
    fn test_decode_non_numeric_epoch() {
        for epoch in ["", "abc", "-1", "1.5", "0x10"] {
            match FinalityCheckpoint::decode(&finality(epoch)) {
                Err(Error::InvalidEpoch(value)) => assert_eq!(value, epoch),
                other => panic!("unexpected result for {epoch:?}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_decode_wrong_shape() {
        let body = br#"{"data":{"finalized":{"epoch":3}}}"#;
        assert!(matches!(
            FinalityCheckpoint::decode(body),
            Err(Error::Decode(_))
        ));
        assert!(matches!(
            FinalityCheckpoint::decode(b"not json"),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_decode_syncing() {
        let body = br#"{"data":{"head_slot":"12","sync_distance":"0","is_syncing":false,"is_optimistic":false}}"#;
        assert_eq!(
            decode_syncing(body).unwrap(),
            SyncStatus { is_syncing: false }
        );
        let body = br#"{"data":{"is_syncing":true}}"#;
        assert_eq!(decode_syncing(body).unwrap(), SyncStatus { is_syncing: true });
        assert!(matches!(
            decode_syncing(br#"{"is_syncing":true}"#),
            Err(Error::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_queries_node() {
        let router = Router::new()
            .route(
                "/eth/v1/beacon/states/head/finality_checkpoints",
                get(|| async {
                    Json(json!({"data": {"finalized": {"epoch": "4", "root": "0x00"}}}))
                }),
            )
            .route(
                "/eth/v1/node/syncing",
                get(|| async { Json(json!({"data": {"is_syncing": false}})) }),
            );
        let addr = serve(router).await;
        let client = Client::new(
            http_client(DEFAULT_REQUEST_TIMEOUT).unwrap(),
            "127.0.0.1",
            addr.port(),
        );
        assert_eq!(client.base(), format!("http://127.0.0.1:{}", addr.port()));
        assert_eq!(
            client.finality_checkpoint().await.unwrap(),
            FinalityCheckpoint { epoch: 4 }
        );
        assert_eq!(
            client.syncing().await.unwrap(),
            SyncStatus { is_syncing: false }
        );
    }

    #[tokio::test]
    async fn test_server_error_is_transport_failure() {
        let router = Router::new().route(
            "/eth/v1/node/syncing",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let addr = serve(router).await;
        let client = Client::new(
            http_client(DEFAULT_REQUEST_TIMEOUT).unwrap(),
            "127.0.0.1",
            addr.port(),
        );
        assert!(matches!(client.syncing().await, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn test_unreachable_node() {
        let port = closed_port().await;
        let client = Client::new(
            http_client(DEFAULT_REQUEST_TIMEOUT).unwrap(),
            "127.0.0.1",
            port,
        );
        assert!(matches!(
            client.finality_checkpoint().await,
            Err(Error::Transport(_))
        ));
    }
}
