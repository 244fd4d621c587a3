use crate::{poller::Poller, Error, Probe};
use commonware_macros::select;
use commonware_runtime::{Clock, Metrics, Spawner};
use futures::{
    channel::{mpsc, oneshot},
    stream::FuturesUnordered,
    StreamExt,
};
use prometheus_client::metrics::{counter::Counter, gauge::Gauge};
use std::time::Duration;
use tracing::{info, warn};

/// Configuration for a [Barrier].
#[derive(Clone, Debug)]
pub struct Config {
    /// Time to wait between consecutive probes of the same member.
    pub interval: Duration,

    /// Time allowed for all members to converge.
    pub timeout: Duration,
}

/// A member that had not converged when the deadline passed.
#[derive(Clone, Debug)]
pub struct Stalled<O> {
    pub name: String,

    /// Last observation made before the deadline (if any probe completed).
    pub last: Option<O>,
}

/// Result of waiting on a [Barrier].
#[derive(Clone, Debug)]
pub enum Outcome<O> {
    /// Every member converged before the deadline.
    Converged,

    /// The deadline passed before every member converged.
    TimedOut { stalled: Vec<Stalled<O>> },
}

impl<O> Outcome<O> {
    /// Returns true if the deadline passed before every member converged.
    pub fn timed_out(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

/// Runs one [Poller] per member concurrently and waits for the first of
/// {all members converged, deadline elapsed}.
///
/// Whatever the outcome, every poller spawned by [Barrier::run] is stopped before it
/// returns.
pub struct Barrier<E: Clock + Spawner + Metrics> {
    context: E,
    interval: Duration,
    timeout: Duration,

    attempts: Counter,
    converged: Gauge,
    stalled: Gauge,
}

impl<E: Clock + Spawner + Metrics> Barrier<E> {
    /// Create a new barrier, registering its metrics with `context`.
    pub fn new(context: E, cfg: Config) -> Self {
        let attempts = Counter::default();
        let converged = Gauge::default();
        let stalled = Gauge::default();
        context.register("attempts", "probes performed", attempts.clone());
        context.register("converged", "members that converged", converged.clone());
        context.register(
            "stalled",
            "members that had not converged at the deadline",
            stalled.clone(),
        );
        Self {
            context,
            interval: cfg.interval,
            timeout: cfg.timeout,
            attempts,
            converged,
            stalled,
        }
    }

    /// Poll every member until `predicate` holds over its observation or the
    /// deadline passes.
    ///
    /// A probe failure of any member is fatal: all pollers are stopped and the error
    /// is returned.
    pub async fn run<P, F>(
        &self,
        members: Vec<(String, P)>,
        predicate: F,
    ) -> Result<Outcome<P::Observation>, Error<P::Error>>
    where
        P: Probe,
        F: Fn(&P::Observation) -> bool + Clone + Send + 'static,
    {
        let total = members.len();
        self.converged.set(0);
        self.stalled.set(0);
        if total == 0 {
            warn!("no members to wait for");
            return Ok(Outcome::Converged);
        }
        info!(members = total, timeout = ?self.timeout, "waiting for convergence");

        // Spawn pollers
        //
        // The reporter is held until we return so the observation stream never
        // terminates while we are waiting.
        let deadline = self.context.current() + self.timeout;
        let (reporter, mut observations) = mpsc::unbounded();
        let mut names = Vec::with_capacity(total);
        let mut stops = Vec::with_capacity(total);
        let mut pending = FuturesUnordered::new();
        for (index, (name, probe)) in members.into_iter().enumerate() {
            let (stop, stopped) = oneshot::channel::<()>();
            let poller = Poller::new(
                name.clone(),
                probe,
                predicate.clone(),
                self.interval,
                stopped,
            )
            .with_reporter(index, reporter.clone())
            .with_attempts(self.attempts.clone());
            let handle = self
                .context
                .with_label("poller")
                .spawn(move |context| poller.run(context));
            pending.push(async move { (index, handle.await) });
            names.push(name);
            stops.push(stop);
        }

        // Wait for all pollers to converge (or the deadline to pass)
        let mut last: Vec<Option<P::Observation>> = vec![None; total];
        let mut done = vec![false; total];
        let mut remaining = total;
        while remaining > 0 {
            select! {
                _ = self.context.sleep_until(deadline) => {
                    // Dropping the stop senders stops every outstanding poller
                    drop(stops);
                    let stalled: Vec<_> = names
                        .into_iter()
                        .zip(last)
                        .zip(done)
                        .filter(|(_, done)| !*done)
                        .map(|((name, last), _)| Stalled { name, last })
                        .collect();
                    self.stalled.set(stalled.len() as i64);
                    for member in &stalled {
                        warn!(node = %member.name, last = ?member.last, "member did not converge");
                    }
                    warn!(stalled = stalled.len(), timeout = ?self.timeout, "deadline elapsed");
                    return Ok(Outcome::TimedOut { stalled });
                },
                completed = pending.next() => {
                    if let Some((index, result)) = completed {
                        match result {
                            Ok(Ok(converged)) => {
                                done[index] = true;
                                last[index] = Some(converged.observation);
                                remaining -= 1;
                                self.converged.inc();
                            }
                            Ok(Err(Error::Stopped)) | Err(_) => {
                                return Err(Error::Exited(names[index].clone()));
                            }
                            Ok(Err(err)) => {
                                warn!(node = %names[index], ?err, "probe failed");
                                return Err(err);
                            }
                        }
                    }
                },
                observation = observations.next() => {
                    if let Some((index, observation)) = observation {
                        last[index] = Some(observation);
                    }
                },
            };
        }
        drop(reporter);
        info!(members = total, "all members converged");
        Ok(Outcome::Converged)
    }
}
