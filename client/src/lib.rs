//! Query finality and sync status from Ethereum consensus and execution nodes.
//!
//! Every query performs exactly one request and decodes the response into a typed
//! value. Nothing is retried here: a failed request or an undecodable response is
//! returned to the caller as an [Error]. Retrying until a condition holds is the job
//! of [ethnet_convergence::Poller], which drives the probes in [probes].

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod beacon;
pub mod execution;
pub mod probes;

/// Default time allowed for a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when querying a node.
#[derive(Error, Debug)]
pub enum Error {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid epoch: {0}")]
    InvalidEpoch(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("rpc response has neither result nor error")]
    MissingResult,
}

/// Whether a node is still catching up with the chain.
///
/// Consensus and execution nodes report this with different wire shapes; both decode
/// into this type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub is_syncing: bool,
}

/// Build the HTTP client shared by all queries.
pub fn http_client(request_timeout: Duration) -> Result<reqwest::Client, Error> {
    Ok(reqwest::Client::builder().timeout(request_timeout).build()?)
}

/// Base URL of a node's HTTP endpoint.
pub(crate) fn base_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}")
}
