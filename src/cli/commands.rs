//! Command implementations for the CLI
//!
//! SBIO pattern: Commands return Results, printing is handled by the caller

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use super::Cli;
use crate::config::{self, Config, ConfigError};
use crate::infra::{HypervisorList, InfraError};
use crate::node::{Node, NodeError, NodeList};
use crate::runtime::HostRuntime;
use crate::versioned::{HypervisorManifest, VersionedError, DOCUMENT_SEPARATOR};

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Node(#[from] NodeError),

    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Node '{0}' not found")]
    NodeNotFound(String),

    #[error("Node '{0}' already exists in cluster '{1}'")]
    NodeExists(String, String),

    #[error("Config file {0} already exists (use --force to overwrite)")]
    ConfigExists(PathBuf),

    #[error("Manifest error: {0}")]
    Manifest(#[from] VersionedError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} node(s) failed to reconcile")]
    ReconcileFailed(usize),

    #[error("Reconcile task failed: {0}")]
    Task(#[from] anyhow::Error),
}

/// Result type for commands
pub type CommandResult<T> = Result<T, CommandError>;

/// Hypervisor pool and nodes loaded from the configured files
#[derive(Debug)]
pub struct ClusterState {
    pub config: Config,
    pub hypervisors: HypervisorList,
    pub nodes: NodeList,
}

/// Apply command-line overrides to the loaded config
pub fn effective_config(cli: &Cli) -> CommandResult<Config> {
    let mut config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };
    if let Some(path) = &cli.hypervisors {
        config.hypervisors = config::expand_path(path);
    }
    if let Some(path) = &cli.nodes {
        config.nodes = config::expand_path(path);
    }
    if let Some(runtime) = cli.runtime {
        config.runtime = runtime;
    }
    Ok(config)
}

/// Load the hypervisor pool and the persisted nodes
pub fn load_state(config: Config) -> CommandResult<ClusterState> {
    let runtime = config.runtime.build();
    load_state_with(config, runtime)
}

/// Load the hypervisor pool and the persisted nodes using a given runtime
pub fn load_state_with(
    config: Config,
    runtime: Arc<dyn HostRuntime>,
) -> CommandResult<ClusterState> {
    let hypervisors = config::load_hypervisors(&config.hypervisors, runtime)?;
    let nodes = config::load_nodes(&config.nodes, &hypervisors)?;
    info!(
        "Loaded {} hypervisors and {} nodes",
        hypervisors.len(),
        nodes.len()
    );
    Ok(ClusterState {
        config,
        hypervisors,
        nodes,
    })
}

// ============================================================================
// Node Commands
// ============================================================================

/// Create a node on a random hypervisor. Names are unique within a cluster.
pub fn node_new(state: &ClusterState, name: &str, cluster: &str) -> CommandResult<Node> {
    let exists = state
        .nodes
        .iter()
        .any(|n| n.name() == name && n.cluster_name() == cluster);
    if exists {
        return Err(CommandError::NodeExists(name.to_string(), cluster.to_string()));
    }
    Ok(Node::with_random_hypervisor(name, cluster, &state.hypervisors)?)
}

/// Append a node's manifest to a node manifest stream
pub fn append_node(path: &Path, node: &Node) -> CommandResult<()> {
    append_document(path, &node.specs()?)
}

fn append_document(path: &Path, document: &str) -> CommandResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(DOCUMENT_SEPARATOR.as_bytes())?;
    file.write_all(document.as_bytes())?;
    Ok(())
}

// ============================================================================
// Hypervisor Commands
// ============================================================================

/// Build the manifest of a new hypervisor. Names are unique in the pool.
pub fn hypervisor_new(
    state: &ClusterState,
    name: &str,
    ip_address: &str,
    endpoint: Option<&str>,
    public: bool,
) -> CommandResult<HypervisorManifest> {
    if state.hypervisors.get(name).is_some() {
        return Err(InfraError::DuplicateHypervisor(name.to_string()).into());
    }

    let mut manifest = HypervisorManifest::new(name, ip_address);
    if let Some(endpoint) = endpoint {
        manifest = manifest.with_endpoint(endpoint);
    }
    if public {
        manifest = manifest.public();
    }
    Ok(manifest)
}

/// Append a hypervisor's manifest to the hypervisor manifest stream
pub fn append_hypervisor(path: &Path, manifest: &HypervisorManifest) -> CommandResult<()> {
    append_document(path, &manifest.to_yaml()?)
}

// ============================================================================
// Config Commands
// ============================================================================

/// Write `config` to `path`, refusing to replace an existing file unless forced
pub fn config_init(config: &Config, path: &Path, force: bool) -> CommandResult<()> {
    if path.exists() && !force {
        return Err(CommandError::ConfigExists(path.to_path_buf()));
    }
    config::save_config_to(config, path)?;
    Ok(())
}

/// Effective config as YAML
pub fn config_view(config: &Config) -> CommandResult<String> {
    Ok(config::serialize_config(config)?)
}

/// Nodes to reconcile: all of them, or only the named one
pub fn select_nodes(state: &ClusterState, name: Option<&str>) -> CommandResult<NodeList> {
    match name {
        None => Ok(state.nodes.clone()),
        Some(name) => state
            .nodes
            .get(name)
            .map(|node| vec![node.clone()].into())
            .ok_or_else(|| CommandError::NodeNotFound(name.to_string())),
    }
}
