//! Wait for a set of remote endpoints to converge on a target condition.
//!
//! A [Probe] performs a single observation of one endpoint. A [Poller] repeats that
//! observation at a fixed interval until a predicate holds over it. A [Barrier] runs
//! one [Poller] per endpoint concurrently and reports whether all of them converged
//! before a shared deadline.
//!
//! Pollers never give up on their own: the deadline is only observed by the [Barrier].
//! When the deadline passes (or any probe fails), the [Barrier] stops every outstanding
//! [Poller] before returning, so no background polling outlives the call.
//!
//! All timing is driven by the runtime [commonware_runtime::Clock], which allows the
//! convergence logic to be exercised with the deterministic runtime.

use std::{fmt::Debug, future::Future};
use thiserror::Error;

mod barrier;
pub use barrier::{Barrier, Config, Outcome, Stalled};
pub mod mocks;
mod poller;
pub use poller::{Converged, Poller};

/// Errors that can occur while waiting for convergence.
#[derive(Error, Debug)]
pub enum Error<E: std::error::Error + 'static> {
    #[error("probe of {node} failed: {source}")]
    Probe {
        node: String,
        #[source]
        source: E,
    },
    #[error("poller for {0} exited unexpectedly")]
    Exited(String),
    #[error("stopped")]
    Stopped,
}

/// A single observation of a remote endpoint.
///
/// Implementations must perform exactly one request per call and must not retry:
/// retrying is the responsibility of the [Poller].
pub trait Probe: Send + 'static {
    /// The decoded value returned by the endpoint.
    type Observation: Clone + Debug + Send + 'static;

    /// Error returned when the endpoint cannot be reached or its response cannot be decoded.
    type Error: std::error::Error + Send + 'static;

    /// Observe the endpoint once.
    fn probe(&mut self) -> impl Future<Output = Result<Self::Observation, Self::Error>> + Send;
}
