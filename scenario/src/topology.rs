//! Classify launched services into the roles a scenario checks.

use crate::{config::Ports, Error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a service does in the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Consensus,
    Execution,
    RelayWebsite,
    Database,
}

/// Service name patterns used to assign a [Role].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Patterns {
    pub consensus_prefix: String,
    pub consensus_excluded_suffixes: Vec<String>,
    pub execution_prefix: String,
    pub execution_excluded_suffixes: Vec<String>,
    pub relay_website: String,
    pub database: String,
}

impl Default for Patterns {
    fn default() -> Self {
        Self {
            consensus_prefix: "cl-".to_string(),
            consensus_excluded_suffixes: vec!["-validator".to_string(), "-forkmon".to_string()],
            execution_prefix: "el-".to_string(),
            execution_excluded_suffixes: vec!["-forkmon".to_string()],
            relay_website: "mev-relay-website".to_string(),
            database: "postgres".to_string(),
        }
    }
}

impl Patterns {
    /// Assign a [Role] to a service by name alone.
    ///
    /// Returns `None` for services the scenario does not talk to (validator clients,
    /// fork monitors, etc.).
    pub fn classify(&self, name: &str) -> Option<Role> {
        let excluded = |suffixes: &[String]| suffixes.iter().any(|s| name.ends_with(s.as_str()));
        if name.starts_with(&self.consensus_prefix) && !excluded(&self.consensus_excluded_suffixes)
        {
            return Some(Role::Consensus);
        }
        if name.starts_with(&self.execution_prefix) && !excluded(&self.execution_excluded_suffixes)
        {
            return Some(Role::Execution);
        }
        if name == self.relay_website {
            return Some(Role::RelayWebsite);
        }
        if name == self.database {
            return Some(Role::Database);
        }
        None
    }
}

/// A publicly reachable port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Port {
    pub host: String,
    pub number: u16,
}

/// A launched service and its public ports, keyed by port id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    pub ports: BTreeMap<String, Port>,
}

/// The endpoint used to reach a service in a given [Role].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeEndpoint {
    pub role: Role,
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl NodeEndpoint {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Every service of the launched network the scenario checks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Topology {
    pub consensus: Vec<NodeEndpoint>,
    pub execution: Vec<NodeEndpoint>,
    pub relay_website: Option<NodeEndpoint>,
    pub database: Option<NodeEndpoint>,
}

impl Topology {
    /// Classify `services` and resolve the endpoint of each one with a [Role].
    ///
    /// Nodes are sorted by name. A classified service that does not expose the port
    /// its role requires is an error.
    pub fn discover(
        services: Vec<Service>,
        patterns: &Patterns,
        ports: &Ports,
    ) -> Result<Self, Error> {
        let mut topology = Self::default();
        for service in services {
            let Some(role) = patterns.classify(&service.name) else {
                continue;
            };
            let id = match role {
                Role::Consensus => &ports.beacon,
                Role::Execution => &ports.execution,
                Role::RelayWebsite => &ports.relay_website,
                Role::Database => &ports.database,
            };
            let Some(port) = service.ports.get(id) else {
                return Err(Error::MissingPort {
                    service: service.name,
                    port: id.clone(),
                });
            };
            let endpoint = NodeEndpoint {
                role,
                host: port.host.clone(),
                port: port.number,
                name: service.name,
            };
            match role {
                Role::Consensus => topology.consensus.push(endpoint),
                Role::Execution => topology.execution.push(endpoint),
                Role::RelayWebsite => topology.relay_website = Some(endpoint),
                Role::Database => topology.database = Some(endpoint),
            }
        }
        topology.consensus.sort_by(|a, b| a.name.cmp(&b.name));
        topology.execution.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(topology)
    }
}
