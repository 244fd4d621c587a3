//! Scripted probes for exercising pollers and barriers without a network.

use commonware_runtime::Clock;
use std::{
    fmt::Debug,
    sync::{Arc, Mutex},
    time::SystemTime,
};
use thiserror::Error;

/// Error returned by a [Probe] once its script is exhausted (if configured to fail).
#[derive(Error, Debug)]
#[error("mock endpoint unreachable")]
pub struct Unreachable;

struct State<O> {
    script: Vec<O>,
    next: usize,
    fail: bool,
    calls: Vec<SystemTime>,
}

/// A [crate::Probe] that returns scripted observations.
///
/// Observations are returned in order. Once the script is exhausted, the last
/// observation is repeated forever (or, if created with [Probe::failing_after], every
/// further call fails). The time of every call is recorded.
#[derive(Clone)]
pub struct Probe<E: Clock, O> {
    context: E,
    state: Arc<Mutex<State<O>>>,
}

impl<E: Clock, O: Clone> Probe<E, O> {
    /// Create a probe that returns `script` in order and then repeats its last entry.
    pub fn new(context: E, script: Vec<O>) -> Self {
        assert!(!script.is_empty(), "script must not be empty");
        Self::with_failure(context, script, false)
    }

    /// Create a probe that always returns `observation`.
    pub fn constant(context: E, observation: O) -> Self {
        Self::new(context, vec![observation])
    }

    /// Create a probe that returns `script` in order and then fails.
    pub fn failing_after(context: E, script: Vec<O>) -> Self {
        Self::with_failure(context, script, true)
    }

    fn with_failure(context: E, script: Vec<O>, fail: bool) -> Self {
        Self {
            context,
            state: Arc::new(Mutex::new(State {
                script,
                next: 0,
                fail,
                calls: Vec::new(),
            })),
        }
    }

    /// Times at which the probe was called.
    pub fn calls(&self) -> Vec<SystemTime> {
        self.state.lock().unwrap().calls.clone()
    }

    fn observe(&self) -> Result<O, Unreachable> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(self.context.current());
        if state.next < state.script.len() {
            let observation = state.script[state.next].clone();
            state.next += 1;
            return Ok(observation);
        }
        if state.fail {
            return Err(Unreachable);
        }
        state.script.last().cloned().ok_or(Unreachable)
    }
}

impl<E, O> crate::Probe for Probe<E, O>
where
    E: Clock,
    O: Clone + Debug + Send + 'static,
{
    type Observation = O;
    type Error = Unreachable;

    async fn probe(&mut self) -> Result<O, Unreachable> {
        self.observe()
    }
}
