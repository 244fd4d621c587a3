//! [Probe] adapters over node queries, along with the predicates used to decide
//! when a node has converged.

use crate::{
    beacon::{self, FinalityCheckpoint},
    execution, Error, SyncStatus,
};
use ethnet_convergence::Probe;

/// Returns true once a checkpoint has been finalized past genesis.
pub fn finalized(checkpoint: &FinalityCheckpoint) -> bool {
    checkpoint.epoch > 0
}

/// Returns true once a node reports it is no longer syncing.
pub fn synced(status: &SyncStatus) -> bool {
    !status.is_syncing
}

/// Observes the finalized checkpoint of a consensus node.
#[derive(Clone)]
pub struct FinalityProbe {
    client: beacon::Client,
}

impl FinalityProbe {
    pub fn new(client: beacon::Client) -> Self {
        Self { client }
    }
}

impl Probe for FinalityProbe {
    type Observation = FinalityCheckpoint;
    type Error = Error;

    async fn probe(&mut self) -> Result<FinalityCheckpoint, Error> {
        self.client.finality_checkpoint().await
    }
}

/// Observes the sync status of a consensus node.
#[derive(Clone)]
pub struct BeaconSyncProbe {
    client: beacon::Client,
}

impl BeaconSyncProbe {
    pub fn new(client: beacon::Client) -> Self {
        Self { client }
    }
}

impl Probe for BeaconSyncProbe {
    type Observation = SyncStatus;
    type Error = Error;

    async fn probe(&mut self) -> Result<SyncStatus, Error> {
        self.client.syncing().await
    }
}

/// Observes the sync status of an execution node.
#[derive(Clone)]
pub struct ExecutionSyncProbe {
    client: execution::Client,
}

impl ExecutionSyncProbe {
    pub fn new(client: execution::Client) -> Self {
        Self { client }
    }
}

impl Probe for ExecutionSyncProbe {
    type Observation = SyncStatus;
    type Error = Error;

    async fn probe(&mut self) -> Result<SyncStatus, Error> {
        self.client.syncing().await
    }
}
