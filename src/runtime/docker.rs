//! Docker host runtime
//!
//! Control-plane components run as host-networked containers. The runtime
//! talks to the hypervisor's Docker engine through `docker -H <endpoint>`.

use std::process::Command;

use tracing::{debug, info, warn};

use super::{ContainerSpec, HostRuntime, RuntimeError, SPEC_HASH_LABEL};

/// Restart policy applied to every control-plane container
const RESTART_POLICY: &str = "unless-stopped";

/// Runtime backed by the `docker` CLI
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    binary: String,
}

impl DockerRuntime {
    pub fn new() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }

    fn run(&self, args: &[String]) -> Result<String, RuntimeError> {
        debug!("{} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|e| RuntimeError::NotAvailable(format!("{}: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(RuntimeError::CommandFailed {
                command: format!("{} {}", self.binary, args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn inspect(&self, endpoint: Option<&str>, name: &str) -> Option<ContainerState> {
        self.run(&generate_inspect_args(endpoint, name))
            .ok()
            .map(|output| parse_inspect_output(&output))
    }
}

/// What `docker inspect` reports about an existing container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerState {
    pub running: bool,
    pub spec_hash: Option<String>,
}

impl ContainerState {
    /// Whether the container runs and was started from `container`
    pub fn is_current(&self, container: &ContainerSpec) -> bool {
        self.running && self.spec_hash.as_deref() == Some(container.digest().as_str())
    }
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRuntime for DockerRuntime {
    fn ensure_container(
        &self,
        endpoint: Option<&str>,
        container: &ContainerSpec,
    ) -> Result<(), RuntimeError> {
        container.validate()?;

        match self.inspect(endpoint, &container.name) {
            Some(state) if state.is_current(container) => {
                debug!("Container {} already running", container.name);
                return Ok(());
            }
            // Stopped or started from an older specification
            Some(state) => {
                info!(
                    "Replacing container {} (running: {}, spec: {})",
                    container.name,
                    state.running,
                    state.spec_hash.as_deref().unwrap_or("none")
                );
                self.run(&generate_rm_args(endpoint, &container.name))?;
            }
            None => {}
        }

        info!("Starting container {} ({})", container.name, container.image);
        self.run(&generate_run_args(endpoint, container))
            .map(|id| debug!("Started {} as {}", container.name, id))
            .inspect_err(|e| warn!("Failed to start {}: {}", container.name, e))
    }
}

// ============================================================================
// SBIO: Pure argument builders (no I/O)
// ============================================================================

fn host_args(endpoint: Option<&str>) -> Vec<String> {
    match endpoint {
        Some(endpoint) => vec!["-H".to_string(), endpoint.to_string()],
        None => vec![],
    }
}

/// Generate Docker inspect arguments printing the running state and the
/// specification digest label, separated by a space
pub fn generate_inspect_args(endpoint: Option<&str>, container_name: &str) -> Vec<String> {
    let mut args = host_args(endpoint);
    args.extend([
        "inspect".to_string(),
        "-f".to_string(),
        format!(
            "{{{{.State.Running}}}} {{{{index .Config.Labels \"{}\"}}}}",
            SPEC_HASH_LABEL
        ),
        container_name.to_string(),
    ]);
    args
}

/// Parse the output of [`generate_inspect_args`]
pub fn parse_inspect_output(output: &str) -> ContainerState {
    let mut fields = output.split_whitespace();
    let running = fields.next() == Some("true");
    let spec_hash = fields
        .next()
        .filter(|hash| *hash != "<no value>")
        .map(str::to_string);
    ContainerState { running, spec_hash }
}

/// Generate Docker rm arguments
pub fn generate_rm_args(endpoint: Option<&str>, container_name: &str) -> Vec<String> {
    let mut args = host_args(endpoint);
    args.extend([
        "rm".to_string(),
        "-f".to_string(),
        container_name.to_string(),
    ]);
    args
}

/// Generate Docker run arguments
///
/// Creates a complete detached `docker run` command for a control-plane
/// container.
pub fn generate_run_args(endpoint: Option<&str>, container: &ContainerSpec) -> Vec<String> {
    let mut args = host_args(endpoint);
    args.push("run".to_string());
    args.push("-d".to_string());

    args.push("--name".to_string());
    args.push(container.name.clone());

    args.push("--network".to_string());
    args.push("host".to_string());

    args.push("--restart".to_string());
    args.push(RESTART_POLICY.to_string());

    for (key, value) in &container.labels {
        args.push("--label".to_string());
        args.push(format!("{}={}", key, value));
    }
    args.push("--label".to_string());
    args.push(format!("{}={}", SPEC_HASH_LABEL, container.digest()));

    args.push(container.image.clone());
    args.extend(container.command.iter().cloned());

    args
}
