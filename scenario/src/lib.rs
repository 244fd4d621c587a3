//! Launch an Ethereum test network and check that it finalizes and syncs.
//!
//! A scenario is described by a [config::Config]. The [driver::Driver] launches the
//! network through an [orchestrator::Orchestrator], discovers the launched nodes
//! ([topology::Topology]) and then waits, stage by stage, for every node to converge:
//!
//! 1. every consensus node reports a finalized epoch past genesis,
//! 2. every consensus node reports it is no longer syncing,
//! 3. every execution node reports it is no longer syncing.
//!
//! If the scenario includes an MEV relay, the relay's database is checked last. The
//! network is only torn down after a fully successful run. A failed run leaves the
//! network standing so it can be inspected (and later removed with `ethnet destroy`).

use std::{path::PathBuf, time::Duration};
use thiserror::Error;

pub mod config;
pub mod driver;
pub mod kurtosis;
pub mod mocks;
pub mod orchestrator;
pub mod topology;

/// Errors that can occur while running a scenario.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to read config {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read input parameters {path}: {source}")]
    ReadArgs {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("input parameters are empty: {0}")]
    EmptyArgs(PathBuf),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{command} failed: {stderr}")]
    Command { command: String, stderr: String },
    #[error("unable to parse enclave services: {0}")]
    Inspect(String),
    #[error("package failed (interpretation: {interpretation_error:?}, validation: {validation_errors:?}, execution: {execution_error:?})")]
    Package {
        interpretation_error: Option<String>,
        validation_errors: Vec<String>,
        execution_error: Option<String>,
    },
    #[error("missing service: {0}")]
    MissingService(String),
    #[error("service {service} does not expose port {port}")]
    MissingPort { service: String, port: String },
    #[error("client error: {0}")]
    Client(#[from] ethnet_client::Error),
    #[error("{stage} failed: {source}")]
    Convergence {
        stage: driver::Stage,
        #[source]
        source: ethnet_convergence::Error<ethnet_client::Error>,
    },
    #[error("{stage} timed out after {timeout:?} (stalled: {stalled:?})")]
    Timeout {
        stage: driver::Stage,
        timeout: Duration,
        stalled: Vec<String>,
    },
    #[error("relay error: {0}")]
    Relay(#[from] ethnet_relay::Error),
}
