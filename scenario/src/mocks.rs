//! In-memory orchestrator for tests.

use crate::{
    config::Package,
    orchestrator::RunResult,
    topology::Service,
    Error,
};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct State {
    created: Vec<String>,
    runs: Vec<(String, String)>,
    destroyed: Vec<String>,
}

/// An orchestrator that "launches" a fixed set of services.
#[derive(Clone)]
pub struct Orchestrator {
    services: Vec<Service>,
    result: RunResult,
    state: Arc<Mutex<State>>,
}

impl Orchestrator {
    pub fn new(services: Vec<Service>) -> Self {
        Self {
            services,
            result: RunResult::default(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Report `result` from every package run.
    pub fn with_result(mut self, result: RunResult) -> Self {
        self.result = result;
        self
    }

    /// Enclaves created so far.
    pub fn created(&self) -> Vec<String> {
        self.state.lock().unwrap().created.clone()
    }

    /// `(enclave, args)` of each package run.
    pub fn runs(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().runs.clone()
    }

    /// Enclaves destroyed so far.
    pub fn destroyed(&self) -> Vec<String> {
        self.state.lock().unwrap().destroyed.clone()
    }
}

impl crate::orchestrator::Orchestrator for Orchestrator {
    async fn create_enclave(&self, name: &str) -> Result<(), Error> {
        self.state.lock().unwrap().created.push(name.to_string());
        Ok(())
    }

    async fn run_package(
        &self,
        enclave: &str,
        _package: &Package,
        args: &str,
    ) -> Result<RunResult, Error> {
        self.state
            .lock()
            .unwrap()
            .runs
            .push((enclave.to_string(), args.to_string()));
        Ok(self.result.clone())
    }

    async fn services(&self, enclave: &str) -> Result<Vec<Service>, Error> {
        if !self.state.lock().unwrap().created.iter().any(|e| e == enclave) {
            return Err(Error::Command {
                command: format!("enclave inspect {enclave}"),
                stderr: "enclave not found".to_string(),
            });
        }
        Ok(self.services.clone())
    }

    async fn destroy_enclave(&self, name: &str) -> Result<(), Error> {
        self.state.lock().unwrap().destroyed.push(name.to_string());
        Ok(())
    }
}
