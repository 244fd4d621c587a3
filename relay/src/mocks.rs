//! In-memory relay store for tests.

use crate::{Error, RelayStats};
use std::sync::{Arc, Mutex};

/// A store that reports fixed counts.
#[derive(Clone)]
pub struct Store {
    stats: RelayStats,
}

impl Store {
    pub fn new(stats: RelayStats) -> Self {
        Self { stats }
    }
}

impl crate::Store for Store {
    async fn registered_validators(&self) -> Result<u64, Error> {
        Ok(self.stats.registered_validators)
    }

    async fn delivered_payloads(&self) -> Result<u64, Error> {
        Ok(self.stats.delivered_payloads)
    }
}

/// Hands out a fixed [Store] and records where it was asked to connect.
#[derive(Clone)]
pub struct Connector {
    store: Store,
    connections: Arc<Mutex<Vec<(String, u16)>>>,
}

impl Connector {
    pub fn new(stats: RelayStats) -> Self {
        Self {
            store: Store::new(stats),
            connections: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Addresses passed to [crate::Connector::connect].
    pub fn connections(&self) -> Vec<(String, u16)> {
        self.connections.lock().unwrap().clone()
    }
}

impl crate::Connector for Connector {
    type Store = Store;

    async fn connect(&self, host: &str, port: u16) -> Result<Store, Error> {
        self.connections
            .lock()
            .unwrap()
            .push((host.to_string(), port));
        Ok(self.store.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{verify, Connector as _, Expectations, Store as _};
    use commonware_macros::test_traced;
    use commonware_runtime::{deterministic, Runner};

    #[test_traced]
    fn test_stats_from_store() {
        let executor = deterministic::Runner::default();
        executor.start(|_| async move {
            let connector = Connector::new(RelayStats {
                registered_validators: 256,
                delivered_payloads: 3,
            });
            let store = connector.connect("127.0.0.1", 5432).await.unwrap();
            let stats = store.stats().await.unwrap();
            assert_eq!(stats.registered_validators, 256);
            assert_eq!(stats.delivered_payloads, 3);
            verify(&stats, &Expectations::default()).unwrap();
            assert_eq!(
                connector.connections(),
                vec![("127.0.0.1".to_string(), 5432)]
            );
        });
    }
}
