//! Runs the shipped scenarios against a local Kurtosis engine.
//!
//! Requires the `kurtosis` CLI on the `PATH`, a running engine and the relay database
//! reachable from the host. Run with `cargo test -p ethnet-scenario -- --ignored`.

use commonware_runtime::{tokio, Metrics, Runner};
use ethnet_relay::postgres;
use ethnet_scenario::{config::Config, driver::Driver, kurtosis::Cli};
use std::path::Path;

fn scenario(name: &str) -> Config {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("configs")
        .join(name);
    Config::load(&path).unwrap()
}

#[test]
#[ignore]
fn test_finalization() {
    let config = scenario("finalization.yaml");
    let executor = tokio::Runner::default();
    executor.start(|context| async move {
        let connector = postgres::Connector::new(context.with_label("relay"), Default::default());
        let driver = Driver::new(context, Cli::default(), connector, config);
        let report = driver.run().await.unwrap();
        assert!(!report.topology.consensus.is_empty());
    });
}

#[test]
#[ignore]
fn test_finalization_sync_and_relay() {
    let config = scenario("mev.yaml");
    let connection = config.relay.clone().unwrap().connection;
    let executor = tokio::Runner::default();
    executor.start(|context| async move {
        let connector = postgres::Connector::new(context.with_label("relay"), connection);
        let driver = Driver::new(context, Cli::default(), connector, config);
        let report = driver.run().await.unwrap();
        let stats = report.relay.unwrap();
        assert_eq!(stats.registered_validators, 256);
        assert!(stats.delivered_payloads >= 1);
    });
}
