//! Run a scenario from launch to teardown.

use crate::{
    config::{Config, Relay, Timing},
    orchestrator::Orchestrator,
    topology::Topology,
    Error,
};
use commonware_runtime::{Clock, Metrics, Spawner};
use ethnet_client::{
    beacon, execution, http_client,
    probes::{self, BeaconSyncProbe, ExecutionSyncProbe, FinalityProbe},
};
use ethnet_convergence::{Barrier, Config as BarrierConfig, Outcome, Probe};
use ethnet_relay::{verify, Connector, RelayStats, Store as _};
use std::{
    fmt,
    fs,
    path::Path,
    time::{Duration, UNIX_EPOCH},
};
use tracing::{info, warn};

/// A step of the scenario that waits for every node of one kind to converge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Consensus nodes have finalized an epoch past genesis.
    Finalization,
    /// Consensus nodes are no longer syncing.
    ConsensusSync,
    /// Execution nodes are no longer syncing.
    ExecutionSync,
}

impl Stage {
    /// Label under which the stage's metrics are registered.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Finalization => "finalization",
            Self::ConsensusSync => "consensus_sync",
            Self::ExecutionSync => "execution_sync",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finalization => write!(f, "finalization"),
            Self::ConsensusSync => write!(f, "consensus sync"),
            Self::ExecutionSync => write!(f, "execution sync"),
        }
    }
}

/// Summary of a successful run.
#[derive(Clone, Debug)]
pub struct Report {
    pub enclave: String,
    pub topology: Topology,

    /// Counts read from the relay (if relay checks were enabled).
    pub relay: Option<RelayStats>,
}

/// Read the package input parameters.
///
/// The contents are passed to the package as-is but must be non-empty JSON.
pub fn load_args(path: &Path) -> Result<String, Error> {
    let args = fs::read_to_string(path).map_err(|source| Error::ReadArgs {
        path: path.to_path_buf(),
        source,
    })?;
    if args.trim().is_empty() {
        return Err(Error::EmptyArgs(path.to_path_buf()));
    }
    serde_json::from_str::<serde_json::Value>(&args)?;
    Ok(args)
}

/// Launches the network described by a [Config] and checks that it converges.
pub struct Driver<E: Clock + Spawner + Metrics, O: Orchestrator, C: Connector> {
    context: E,
    orchestrator: O,
    connector: C,
    config: Config,
}

impl<E: Clock + Spawner + Metrics, O: Orchestrator, C: Connector> Driver<E, O, C> {
    pub fn new(context: E, orchestrator: O, connector: C, config: Config) -> Self {
        Self {
            context,
            orchestrator,
            connector,
            config,
        }
    }

    /// Name of the enclave for a run starting now.
    fn enclave_name(&self) -> String {
        let seconds = self
            .context
            .current()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        format!("{}-{}", self.config.name, seconds)
    }

    /// Run the scenario once.
    ///
    /// The enclave is removed only if every step succeeds. On failure it is left
    /// running so it can be inspected.
    pub async fn run(&self) -> Result<Report, Error> {
        let args = load_args(&self.config.package.args)?;
        let enclave = self.enclave_name();
        self.orchestrator.create_enclave(&enclave).await?;
        info!(%enclave, "created enclave");

        let report = match self.exercise(&enclave, &args).await {
            Ok(report) => report,
            Err(err) => {
                warn!(%enclave, ?err, "scenario failed, leaving enclave for inspection");
                return Err(err);
            }
        };
        if self.config.teardown {
            self.orchestrator.destroy_enclave(&enclave).await?;
            info!(%enclave, "destroyed enclave");
        }
        Ok(report)
    }

    async fn exercise(&self, enclave: &str, args: &str) -> Result<Report, Error> {
        // Launch the network
        let package = &self.config.package;
        info!(
            enclave,
            package = %package.reference,
            parallelism = package.parallelism,
            "running package"
        );
        self.orchestrator
            .run_package(enclave, package, args)
            .await?
            .check()?;

        // Discover nodes
        let services = self.orchestrator.services(enclave).await?;
        let topology = Topology::discover(services, &self.config.patterns, &self.config.ports)?;
        if topology.consensus.is_empty() {
            return Err(Error::MissingService(format!(
                "{}*",
                self.config.patterns.consensus_prefix
            )));
        }
        info!(
            consensus = topology.consensus.len(),
            execution = topology.execution.len(),
            "discovered nodes"
        );

        // Wait for finalization
        let http = http_client(self.config.request_timeout())?;
        let finality = topology
            .consensus
            .iter()
            .map(|node| {
                let client = beacon::Client::new(http.clone(), &node.host, node.port);
                (node.name.clone(), FinalityProbe::new(client))
            })
            .collect();
        self.converge(
            Stage::Finalization,
            self.config.finalization,
            finality,
            probes::finalized,
        )
        .await?;

        // Wait for sync
        if let Some(sync) = self.config.sync {
            let consensus = topology
                .consensus
                .iter()
                .map(|node| {
                    let client = beacon::Client::new(http.clone(), &node.host, node.port);
                    (node.name.clone(), BeaconSyncProbe::new(client))
                })
                .collect();
            self.converge(Stage::ConsensusSync, sync, consensus, probes::synced)
                .await?;

            if topology.execution.is_empty() {
                return Err(Error::MissingService(format!(
                    "{}*",
                    self.config.patterns.execution_prefix
                )));
            }
            let execution = topology
                .execution
                .iter()
                .map(|node| {
                    let client = execution::Client::new(http.clone(), &node.host, node.port);
                    (node.name.clone(), ExecutionSyncProbe::new(client))
                })
                .collect();
            self.converge(Stage::ExecutionSync, sync, execution, probes::synced)
                .await?;
        }

        // Verify the relay
        let relay = match &self.config.relay {
            Some(relay) => Some(self.verify_relay(&topology, relay).await?),
            None => None,
        };
        Ok(Report {
            enclave: enclave.to_string(),
            topology,
            relay,
        })
    }

    async fn converge<P, F>(
        &self,
        stage: Stage,
        timing: Timing,
        members: Vec<(String, P)>,
        predicate: F,
    ) -> Result<(), Error>
    where
        P: Probe<Error = ethnet_client::Error>,
        F: Fn(&P::Observation) -> bool + Clone + Send + 'static,
    {
        info!(%stage, members = members.len(), timeout = ?timing.timeout(), "waiting");
        let barrier = Barrier::new(
            self.context.with_label(stage.label()),
            BarrierConfig {
                interval: timing.interval(),
                timeout: timing.timeout(),
            },
        );
        let start = self.context.current();
        let outcome = barrier
            .run(members, predicate)
            .await
            .map_err(|source| Error::Convergence { stage, source })?;
        match outcome {
            Outcome::Converged => {
                let elapsed = self
                    .context
                    .current()
                    .duration_since(start)
                    .unwrap_or(Duration::ZERO);
                info!(%stage, ?elapsed, "converged");
                Ok(())
            }
            Outcome::TimedOut { stalled } => {
                for node in &stalled {
                    warn!(%stage, node = %node.name, last = ?node.last, "did not converge");
                }
                Err(Error::Timeout {
                    stage,
                    timeout: timing.timeout(),
                    stalled: stalled.into_iter().map(|node| node.name).collect(),
                })
            }
        }
    }

    async fn verify_relay(&self, topology: &Topology, relay: &Relay) -> Result<RelayStats, Error> {
        let Some(website) = &topology.relay_website else {
            return Err(Error::MissingService(
                self.config.patterns.relay_website.clone(),
            ));
        };
        info!(url = %website.url(), "relay website");
        let Some(database) = &topology.database else {
            return Err(Error::MissingService(self.config.patterns.database.clone()));
        };
        let store = self.connector.connect(&database.host, database.port).await?;
        let stats = store.stats().await?;
        info!(
            registered_validators = stats.registered_validators,
            delivered_payloads = stats.delivered_payloads,
            "read relay stats"
        );
        verify(&stats, &relay.expectations)?;
        Ok(stats)
    }
}
