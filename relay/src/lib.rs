//! Verify what an MEV relay recorded while the network was running.
//!
//! After the network has finalized, the relay's store is queried for two counts: the
//! number of distinct validators that registered with the relay and the number of
//! payloads it delivered. [verify] checks both against [Expectations].
//!
//! Queries are not retried. By the time verification runs the network is expected to
//! be stable, so any failure is reported to the caller as-is.

use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

pub mod mocks;
pub mod postgres;

/// Errors that can occur when verifying the relay.
#[derive(Error, Debug)]
pub enum Error {
    #[error("connection failed: {0}")]
    Connect(#[source] tokio_postgres::Error),
    #[error("query failed: {0}")]
    Query(#[source] tokio_postgres::Error),
    #[error("invalid table prefix: {0}")]
    InvalidTablePrefix(String),
    #[error("negative count: {0}")]
    NegativeCount(i64),
    #[error("registered validators mismatch: expected {expected}, found {actual}")]
    RegisteredValidators { expected: u64, actual: u64 },
    #[error("too few delivered payloads: expected at least {min}, found {actual}")]
    DeliveredPayloads { min: u64, actual: u64 },
}

/// Counts read from the relay's store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelayStats {
    pub registered_validators: u64,
    pub delivered_payloads: u64,
}

fn default_registered_validators() -> u64 {
    256
}

fn default_min_delivered_payloads() -> u64 {
    1
}

/// Values the relay's counts must satisfy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectations {
    /// Exact number of distinct validators registered with the relay.
    #[serde(default = "default_registered_validators")]
    pub registered_validators: u64,

    /// Minimum number of payloads delivered by the relay.
    #[serde(default = "default_min_delivered_payloads")]
    pub min_delivered_payloads: u64,
}

impl Default for Expectations {
    fn default() -> Self {
        Self {
            registered_validators: default_registered_validators(),
            min_delivered_payloads: default_min_delivered_payloads(),
        }
    }
}

/// Check `stats` against `expectations`.
///
/// The registered validator count is checked first.
pub fn verify(stats: &RelayStats, expectations: &Expectations) -> Result<(), Error> {
    if stats.registered_validators != expectations.registered_validators {
        return Err(Error::RegisteredValidators {
            expected: expectations.registered_validators,
            actual: stats.registered_validators,
        });
    }
    if stats.delivered_payloads < expectations.min_delivered_payloads {
        return Err(Error::DeliveredPayloads {
            min: expectations.min_delivered_payloads,
            actual: stats.delivered_payloads,
        });
    }
    Ok(())
}

/// Read-only access to the relay's store.
pub trait Store: Send + Sync {
    /// Number of distinct validators that registered with the relay.
    fn registered_validators(&self) -> impl Future<Output = Result<u64, Error>> + Send;

    /// Number of payloads delivered by the relay.
    fn delivered_payloads(&self) -> impl Future<Output = Result<u64, Error>> + Send;

    /// Read both counts.
    fn stats(&self) -> impl Future<Output = Result<RelayStats, Error>> + Send {
        async move {
            Ok(RelayStats {
                registered_validators: self.registered_validators().await?,
                delivered_payloads: self.delivered_payloads().await?,
            })
        }
    }
}

/// Opens a [Store] on a discovered host and port.
pub trait Connector: Send + Sync {
    type Store: Store;

    fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = Result<Self::Store, Error>> + Send;
}
