use crate::{Error, Probe};
use commonware_macros::select;
use commonware_runtime::Clock;
use futures::channel::{mpsc, oneshot};
use prometheus_client::metrics::counter::Counter;
use std::time::Duration;
use tracing::{debug, info};

/// Observation that satisfied the predicate of a [Poller].
#[derive(Clone, Debug)]
pub struct Converged<O> {
    /// The final observation.
    pub observation: O,

    /// Number of probes performed (including the final one).
    pub attempts: u64,
}

/// Repeatedly probes a single endpoint until a predicate holds over the observation.
///
/// The poller sleeps for exactly `interval` between attempts and never gives up on its
/// own. It exits early only when its probe fails (which is fatal) or when the stop
/// signal resolves. The stop signal resolves when its sender is used or dropped, and is
/// raced against both the in-flight probe and the sleep between attempts.
pub struct Poller<P: Probe, F> {
    name: String,
    probe: P,
    predicate: F,
    interval: Duration,
    stop: oneshot::Receiver<()>,

    reporter: Option<(usize, mpsc::UnboundedSender<(usize, P::Observation)>)>,
    attempts: Counter,
}

impl<P, F> Poller<P, F>
where
    P: Probe,
    F: Fn(&P::Observation) -> bool + Send + 'static,
{
    /// Create a new poller for the endpoint called `name`.
    pub fn new(
        name: impl Into<String>,
        probe: P,
        predicate: F,
        interval: Duration,
        stop: oneshot::Receiver<()>,
    ) -> Self {
        Self {
            name: name.into(),
            probe,
            predicate,
            interval,
            stop,
            reporter: None,
            attempts: Counter::default(),
        }
    }

    /// Forward every observation (tagged with `index`) to `reporter`.
    pub(crate) fn with_reporter(
        mut self,
        index: usize,
        reporter: mpsc::UnboundedSender<(usize, P::Observation)>,
    ) -> Self {
        self.reporter = Some((index, reporter));
        self
    }

    /// Count every probe in `attempts`.
    pub(crate) fn with_attempts(mut self, attempts: Counter) -> Self {
        self.attempts = attempts;
        self
    }

    /// Poll until the predicate holds.
    pub async fn run<E: Clock>(
        mut self,
        context: E,
    ) -> Result<Converged<P::Observation>, Error<P::Error>> {
        let mut attempts = 0u64;
        loop {
            // Observe the endpoint (abandoning the request if stopped)
            let result = select! {
                _ = &mut self.stop => {
                    debug!(node = %self.name, attempts, "poller stopped");
                    return Err(Error::Stopped);
                },
                result = self.probe.probe() => {
                    result
                },
            };
            let observation = result.map_err(|source| Error::Probe {
                node: self.name.clone(),
                source,
            })?;
            attempts += 1;
            self.attempts.inc();
            info!(node = %self.name, ?observation, attempts, "queried node");
            if let Some((index, reporter)) = &self.reporter {
                let _ = reporter.unbounded_send((*index, observation.clone()));
            }

            // Check for convergence
            if (self.predicate)(&observation) {
                info!(node = %self.name, attempts, "converged");
                return Ok(Converged {
                    observation,
                    attempts,
                });
            }

            // Wait before trying again
            debug!(node = %self.name, interval = ?self.interval, "pausing before next query");
            select! {
                _ = &mut self.stop => {
                    debug!(node = %self.name, attempts, "poller stopped");
                    return Err(Error::Stopped);
                },
                _ = context.sleep(self.interval) => {},
            };
        }
    }
}
