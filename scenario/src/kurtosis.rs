//! [Orchestrator] backed by the `kurtosis` CLI.
//!
//! Every operation shells out to the CLI and waits for it to exit. Services are read
//! from the "User Services" table printed by `kurtosis enclave inspect`.

use crate::{
    config::Package,
    orchestrator::{Orchestrator, RunResult},
    topology::{Port, Service},
    Error,
};
use std::{collections::BTreeMap, process::Output};
use tokio::process::Command;
use tracing::debug;

/// Name of the CLI binary when none is configured.
pub const DEFAULT_BINARY: &str = "kurtosis";

/// Heading of the services table in `enclave inspect` output.
const SERVICES_SECTION: &str = "User Services";

/// Drives a local Kurtosis engine through its CLI.
#[derive(Clone, Debug)]
pub struct Cli {
    binary: String,
}

impl Default for Cli {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

impl Cli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn execute(&self, args: &[String]) -> Result<Output, Error> {
        let command = format!("{} {}", self.binary, args.join(" "));
        debug!(%command, "executing");
        Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|source| Error::Spawn { command, source })
    }

    /// Run `args`, failing if the CLI exits unsuccessfully.
    async fn execute_checked(&self, args: &[String]) -> Result<String, Error> {
        let output = self.execute(args).await?;
        if !output.status.success() {
            return Err(Error::Command {
                command: format!("{} {}", self.binary, args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Arguments for `kurtosis run`.
pub fn run_args(enclave: &str, package: &Package, args: &str) -> Vec<String> {
    let mut command = vec![
        "run".to_string(),
        "--enclave".to_string(),
        enclave.to_string(),
        "--parallelism".to_string(),
        package.parallelism.to_string(),
    ];
    if package.dry_run {
        command.push("--dry-run".to_string());
    }
    if let Some(main_file) = &package.main_file {
        command.push("--main-file".to_string());
        command.push(main_file.clone());
    }
    if let Some(main_function) = &package.main_function {
        command.push("--main-function-name".to_string());
        command.push(main_function.clone());
    }
    command.push(package.reference.clone());
    command.push(args.to_string());
    command
}

/// Sort the output of a failed `kurtosis run` into the stage that failed.
pub fn classify_failure(output: &str) -> RunResult {
    let message = output.trim().to_string();
    let lower = message.to_lowercase();
    if lower.contains("interpreting") || lower.contains("interpretation") {
        RunResult {
            interpretation_error: Some(message),
            ..Default::default()
        }
    } else if lower.contains("validating") || lower.contains("validation") {
        RunResult {
            validation_errors: vec![message],
            ..Default::default()
        }
    } else {
        RunResult {
            execution_error: Some(message),
            ..Default::default()
        }
    }
}

/// Parse one `id: private/proto -> [scheme://]host:port` mapping.
///
/// Ports without a public mapping are skipped.
fn parse_port(text: &str) -> Result<Option<(String, Port)>, Error> {
    let Some((private, public)) = text.split_once("->") else {
        return Ok(None);
    };
    let mut tokens = private.split_whitespace().rev();
    tokens.next();
    let id = tokens
        .next()
        .and_then(|token| token.strip_suffix(':'))
        .ok_or_else(|| Error::Inspect(text.trim().to_string()))?;
    let address = public
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::Inspect(text.trim().to_string()))?;
    let address = address
        .split_once("://")
        .map_or(address, |(_, rest)| rest)
        .trim_end_matches('/');
    let (host, number) = address
        .rsplit_once(':')
        .ok_or_else(|| Error::Inspect(text.trim().to_string()))?;
    let number = number
        .parse()
        .map_err(|_| Error::Inspect(text.trim().to_string()))?;
    Ok(Some((
        id.to_string(),
        Port {
            host: host.to_string(),
            number,
        },
    )))
}

/// Parse the services table of `kurtosis enclave inspect`.
///
/// A service spans one line per port: the first carries its UUID and name, the rest
/// are indented continuations.
pub fn parse_inspect(output: &str) -> Result<Vec<Service>, Error> {
    let mut services = Vec::new();
    let mut in_section = false;
    for line in output.lines() {
        if line.trim_start().starts_with('=') {
            in_section = line.contains(SERVICES_SECTION);
            continue;
        }
        if !in_section || line.trim().is_empty() || line.trim_start().starts_with("UUID") {
            continue;
        }
        if !line.starts_with(char::is_whitespace) {
            let mut tokens = line.split_whitespace();
            tokens.next();
            let name = tokens
                .next()
                .ok_or_else(|| Error::Inspect(line.to_string()))?;
            services.push(Service {
                name: name.to_string(),
                ports: BTreeMap::new(),
            });
        }
        let Some(service) = services.last_mut() else {
            return Err(Error::Inspect(line.to_string()));
        };
        if let Some((id, port)) = parse_port(line)? {
            service.ports.insert(id, port);
        }
    }
    Ok(services)
}

impl Orchestrator for Cli {
    async fn create_enclave(&self, name: &str) -> Result<(), Error> {
        let args = ["enclave", "add", "--name", name].map(String::from);
        self.execute_checked(&args).await?;
        Ok(())
    }

    async fn run_package(
        &self,
        enclave: &str,
        package: &Package,
        args: &str,
    ) -> Result<RunResult, Error> {
        let output = self.execute(&run_args(enclave, package, args)).await?;
        if output.status.success() {
            return Ok(RunResult::default());
        }
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(classify_failure(&combined))
    }

    async fn services(&self, enclave: &str) -> Result<Vec<Service>, Error> {
        let args = ["enclave", "inspect", enclave].map(String::from);
        let output = self.execute_checked(&args).await?;
        parse_inspect(&output)
    }

    async fn destroy_enclave(&self, name: &str) -> Result<(), Error> {
        let args = ["enclave", "rm", "-f", name].map(String::from);
        self.execute_checked(&args).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const INSPECT: &str = r#"Name:            finalization-test-1700000000
UUID:            5b1d8a2f6c3e
Status:          RUNNING
Creation Time:   Tue, 14 Nov 2023 22:13:20 UTC

========================================= Files Artifacts =========================================
UUID           Name
0f8a1b2c3d4e   el_cl_genesis_data

========================================== User Services ==========================================
UUID           Name                             Ports                                          Status
a1b2c3d4e5f6   cl-1-lighthouse-geth             http: 4000/tcp -> http://127.0.0.1:53000       RUNNING
                                                metrics: 5054/tcp -> http://127.0.0.1:53001
                                                udp-discovery: 9000/udp -> 127.0.0.1:53003
b2c3d4e5f6a1   cl-1-lighthouse-geth-validator   http: 5042/tcp                                 RUNNING
c3d4e5f6a1b2   el-1-geth-lighthouse             engine-rpc: 8551/tcp -> 127.0.0.1:53004        RUNNING
                                                rpc: 8545/tcp -> 127.0.0.1:53005
d4e5f6a1b2c3   postgres                         postgresql: 5432/tcp -> postgresql://127.0.0.1:53010   RUNNING
e5f6a1b2c3d4   mev-relay-website                api: 8080/tcp -> http://127.0.0.1:53020/       RUNNING
f6a1b2c3d4e5   prometheus                       <none>                                         RUNNING
"#;

    #[test]
    fn test_parse_inspect() {
        let services = parse_inspect(INSPECT).unwrap();
        let names: Vec<_> = services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "cl-1-lighthouse-geth",
                "cl-1-lighthouse-geth-validator",
                "el-1-geth-lighthouse",
                "postgres",
                "mev-relay-website",
                "prometheus",
            ]
        );

        let beacon = &services[0];
        assert_eq!(beacon.ports.len(), 3);
        assert_eq!(
            beacon.ports["http"],
            Port {
                host: "127.0.0.1".to_string(),
                number: 53000
            }
        );
        assert_eq!(beacon.ports["udp-discovery"].number, 53003);
        assert!(services[1].ports.is_empty());
        assert_eq!(services[2].ports["rpc"].number, 53005);
        assert_eq!(services[3].ports["postgresql"].number, 53010);
        assert_eq!(services[4].ports["api"].number, 53020);
        assert!(services[5].ports.is_empty());
    }

    #[test]
    fn test_parse_inspect_empty() {
        assert!(parse_inspect("Name: empty\nStatus: RUNNING\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_inspect_bad_port() {
        let output = "===== User Services =====\nUUID Name Ports Status\nabc cl-1 http: 4000/tcp -> 127.0.0.1:notaport RUNNING\n";
        assert!(matches!(parse_inspect(output), Err(Error::Inspect(_))));
    }

    #[test]
    fn test_run_args() {
        let mut package = Package {
            reference: "github.com/kurtosis-tech/eth2-package".to_string(),
            args: PathBuf::from("input_args.json"),
            main_file: None,
            main_function: None,
            parallelism: 4,
            dry_run: false,
        };
        assert_eq!(
            run_args("test-1", &package, "{}"),
            vec![
                "run",
                "--enclave",
                "test-1",
                "--parallelism",
                "4",
                "github.com/kurtosis-tech/eth2-package",
                "{}",
            ]
        );

        package.dry_run = true;
        package.main_file = Some("main.star".to_string());
        package.main_function = Some("run".to_string());
        assert_eq!(
            run_args("test-1", &package, "{}"),
            vec![
                "run",
                "--enclave",
                "test-1",
                "--parallelism",
                "4",
                "--dry-run",
                "--main-file",
                "main.star",
                "--main-function-name",
                "run",
                "github.com/kurtosis-tech/eth2-package",
                "{}",
            ]
        );
    }

    #[test]
    fn test_classify_failure() {
        let result = classify_failure("There was an error interpreting Starlark code\n");
        assert!(result.interpretation_error.is_some());
        let result = classify_failure("Error encountered validating Starlark code");
        assert_eq!(result.validation_errors.len(), 1);
        let result = classify_failure("Error encountered running Starlark code");
        assert_eq!(
            result.execution_error.as_deref(),
            Some("Error encountered running Starlark code")
        );
        assert!(result.check().is_err());
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let cli = Cli::new("/nonexistent/kurtosis");
        assert!(matches!(
            cli.create_enclave("test").await,
            Err(Error::Spawn { .. })
        ));
    }
}
