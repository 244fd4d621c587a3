//! Launch an Ethereum test network and check that it finalizes and syncs.

use clap::{Arg, ArgAction, Command};
use commonware_runtime::{tokio, Metrics, Runner};
use ethnet_relay::postgres;
use ethnet_scenario::{
    config::Config,
    driver::Driver,
    kurtosis::{self, Cli},
    orchestrator::Orchestrator,
};
use std::{path::PathBuf, process::ExitCode};
use tracing::{error, info};

/// Returns the version of the crate.
pub const fn crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Flag for verbose output
const VERBOSE_FLAG: &str = "verbose";

const RUN_CMD: &str = "run";
const DESTROY_CMD: &str = "destroy";

fn main() -> ExitCode {
    // Define application
    let matches = Command::new("ethnet")
        .version(crate_version())
        .about("Launch an Ethereum test network and check that it finalizes and syncs.")
        .arg(
            Arg::new(VERBOSE_FLAG)
                .short('v')
                .long(VERBOSE_FLAG)
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("kurtosis")
                .long("kurtosis")
                .global(true)
                .default_value(kurtosis::DEFAULT_BINARY)
                .help("Path to the kurtosis CLI")
                .value_parser(clap::value_parser!(String)),
        )
        .subcommand(
            Command::new(RUN_CMD)
                .about("Run a scenario from a YAML configuration file.")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .required(true)
                        .help("Path to YAML config file")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("args")
                        .long("args")
                        .help("Path to JSON input parameters (overrides the config)")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new(DESTROY_CMD)
                .about("Remove an enclave left standing by a failed run.")
                .arg(
                    Arg::new("enclave")
                        .long("enclave")
                        .required(true)
                        .help("Name of the enclave")
                        .value_parser(clap::value_parser!(String)),
                ),
        )
        .get_matches();

    // Create logger
    let level = if matches.get_flag(VERBOSE_FLAG) {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    // Parse subcommands
    let cli = Cli::new(matches.get_one::<String>("kurtosis").unwrap().clone());
    let executor = tokio::Runner::default();
    match matches.subcommand() {
        Some((RUN_CMD, matches)) => {
            let config_path = matches.get_one::<PathBuf>("config").unwrap();
            let mut config = match Config::load(config_path) {
                Ok(config) => config,
                Err(e) => {
                    error!(error=?e, "failed to load config");
                    return ExitCode::FAILURE;
                }
            };
            if let Some(args) = matches.get_one::<PathBuf>("args") {
                config.package.args = args.clone();
            }
            executor.start(|context| async move {
                let connection = config
                    .relay
                    .as_ref()
                    .map(|relay| relay.connection.clone())
                    .unwrap_or_default();
                let connector =
                    postgres::Connector::new(context.with_label("relay"), connection);
                let driver = Driver::new(context, cli, connector, config);
                match driver.run().await {
                    Ok(report) => {
                        info!(enclave = %report.enclave, "scenario passed");
                        ExitCode::SUCCESS
                    }
                    Err(e) => {
                        error!(error=?e, "scenario failed");
                        ExitCode::FAILURE
                    }
                }
            })
        }
        Some((DESTROY_CMD, matches)) => {
            let enclave = matches.get_one::<String>("enclave").unwrap().clone();
            executor.start(|_| async move {
                if let Err(e) = cli.destroy_enclave(&enclave).await {
                    error!(error=?e, "failed to destroy enclave");
                    return ExitCode::FAILURE;
                }
                info!(%enclave, "destroyed enclave");
                ExitCode::SUCCESS
            })
        }
        Some((cmd, _)) => {
            error!(cmd, "invalid subcommand");
            ExitCode::FAILURE
        }
        None => {
            error!("no subcommand provided");
            ExitCode::FAILURE
        }
    }
}
