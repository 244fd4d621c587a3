//! Launch and inspect networks through an external orchestrator.

use crate::{config::Package, topology::Service, Error};
use std::future::Future;

/// Errors reported by the orchestrator after running a package.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunResult {
    pub interpretation_error: Option<String>,
    pub validation_errors: Vec<String>,
    pub execution_error: Option<String>,
}

impl RunResult {
    /// Fail if the package reported any error.
    pub fn check(self) -> Result<(), Error> {
        if self.interpretation_error.is_none()
            && self.validation_errors.is_empty()
            && self.execution_error.is_none()
        {
            return Ok(());
        }
        Err(Error::Package {
            interpretation_error: self.interpretation_error,
            validation_errors: self.validation_errors,
            execution_error: self.execution_error,
        })
    }
}

/// Creates isolated environments (enclaves) and launches packages inside them.
pub trait Orchestrator: Send + Sync {
    /// Create an empty enclave.
    fn create_enclave(&self, name: &str) -> impl Future<Output = Result<(), Error>> + Send;

    /// Run `package` in `enclave` with `args`, returning once it has completed.
    fn run_package(
        &self,
        enclave: &str,
        package: &Package,
        args: &str,
    ) -> impl Future<Output = Result<RunResult, Error>> + Send;

    /// List the services running in `enclave`.
    fn services(&self, enclave: &str) -> impl Future<Output = Result<Vec<Service>, Error>> + Send;

    /// Stop and remove `enclave` with everything in it.
    fn destroy_enclave(&self, name: &str) -> impl Future<Output = Result<(), Error>> + Send;
}
