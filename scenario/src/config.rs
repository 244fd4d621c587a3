//! Scenario configuration.

use crate::{topology::Patterns, Error};
use ethnet_relay::{postgres, Expectations};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    path::{Path, PathBuf},
    time::Duration,
};

/// Package launched when none is configured.
pub const DEFAULT_PACKAGE: &str = "github.com/kurtosis-tech/eth2-package";

fn default_parallelism() -> u32 {
    4
}

fn default_finalization() -> Timing {
    Timing {
        interval_ms: 10_000,
        timeout_ms: 510_000,
    }
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_reference() -> String {
    DEFAULT_PACKAGE.to_string()
}

/// The package that launches the network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Package locator passed to the orchestrator.
    #[serde(default = "default_reference")]
    pub reference: String,

    /// Path to the JSON input parameters handed to the package as-is.
    pub args: PathBuf,

    pub main_file: Option<String>,
    pub main_function: Option<String>,

    /// Maximum number of package instructions executed at once.
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,

    #[serde(default)]
    pub dry_run: bool,
}

/// How often to probe and how long to wait for a stage to converge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl Timing {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Checks run against the MEV relay after the network has converged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relay {
    #[serde(default)]
    pub connection: postgres::Config,
    #[serde(default)]
    pub expectations: Expectations,
}

fn default_beacon_port() -> String {
    "http".to_string()
}

fn default_execution_port() -> String {
    "rpc".to_string()
}

fn default_relay_website_port() -> String {
    "api".to_string()
}

fn default_database_port() -> String {
    "postgresql".to_string()
}

/// Port ids under which each kind of service exposes the endpoint we talk to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ports {
    #[serde(default = "default_beacon_port")]
    pub beacon: String,
    #[serde(default = "default_execution_port")]
    pub execution: String,
    #[serde(default = "default_relay_website_port")]
    pub relay_website: String,
    #[serde(default = "default_database_port")]
    pub database: String,
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            beacon: default_beacon_port(),
            execution: default_execution_port(),
            relay_website: default_relay_website_port(),
            database: default_database_port(),
        }
    }
}

/// A complete scenario.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Prefix of the enclave name (suffixed with the launch time in seconds).
    pub name: String,

    pub package: Package,

    #[serde(default = "default_finalization")]
    pub finalization: Timing,

    /// Sync checks are skipped when absent.
    pub sync: Option<Timing>,

    /// Relay checks are skipped when absent.
    pub relay: Option<Relay>,

    #[serde(default)]
    pub patterns: Patterns,

    #[serde(default)]
    pub ports: Ports,

    /// Remove the enclave after a successful run.
    #[serde(default = "default_true")]
    pub teardown: bool,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Config {
    /// Load a scenario from a YAML file.
    ///
    /// A relative input parameters path is resolved against the directory holding the
    /// config.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|source| Error::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config = serde_yaml::from_reader(file)?;
        if config.package.args.is_relative() {
            if let Some(dir) = path.parent() {
                config.package.args = dir.join(&config.package.args);
            }
        }
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
