//! Configuration file (`~/.cpnode/config`)
//!
//! ```yaml
//! hypervisors: ~/.cpnode/hypervisors.yaml
//! nodes: ~/.cpnode/nodes.yaml
//! runtime: docker
//! reconcileIntervalSecs: 30
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::controller::DEFAULT_RECONCILE_INTERVAL_SECS;
use crate::infra::{HypervisorList, InfraError};
use crate::node::NodeList;
use crate::runtime::{HostRuntime, RuntimeKind};
use crate::versioned::{decode_hypervisor_stream, decode_node_stream, VersionedError};

/// Default config file location: ~/.cpnode/config
pub fn default_config_path() -> PathBuf {
    config_dir().join("config")
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cpnode")
}

/// Errors for config and manifest file operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to write config: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid manifest in {0}: {1}")]
    Manifest(PathBuf, VersionedError),

    #[error("Invalid hypervisor pool: {0}")]
    Infra(#[from] InfraError),
}

/// The complete configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Stream of hypervisor manifests
    #[serde(default = "default_hypervisors_path")]
    pub hypervisors: PathBuf,

    /// Stream of node manifests
    #[serde(default = "default_nodes_path")]
    pub nodes: PathBuf,

    /// Host runtime used to reach hypervisors
    #[serde(default)]
    pub runtime: RuntimeKind,

    /// Seconds between two reconciliation passes in watch mode
    #[serde(rename = "reconcileIntervalSecs")]
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hypervisors: default_hypervisors_path(),
            nodes: default_nodes_path(),
            runtime: RuntimeKind::default(),
            reconcile_interval_secs: DEFAULT_RECONCILE_INTERVAL_SECS,
        }
    }
}

fn default_hypervisors_path() -> PathBuf {
    config_dir().join("hypervisors.yaml")
}

fn default_nodes_path() -> PathBuf {
    config_dir().join("nodes.yaml")
}

fn default_reconcile_interval() -> u64 {
    DEFAULT_RECONCILE_INTERVAL_SECS
}

/// Expand a leading `~` in a configured path
pub fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

// ============================================================================
// SBIO: Pure business logic (no I/O)
// ============================================================================

/// Parse config from YAML string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let mut config: Config =
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    config.hypervisors = expand_path(&config.hypervisors);
    config.nodes = expand_path(&config.nodes);
    Ok(config)
}

/// Serialize config to YAML string
pub fn serialize_config(config: &Config) -> Result<String, ConfigError> {
    serde_yaml::to_string(config).map_err(|e| ConfigError::Write(e.to_string()))
}

// ============================================================================
// I/O boundary functions
// ============================================================================

/// Load config from the default location
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&default_config_path())
}

/// Load config from a specific path, falling back to defaults if absent
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.into(), e))?;
    parse_config(&content)
}

/// Save config to a specific path
pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serialize_config(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load the hypervisor pool. A missing file is an empty pool.
pub fn load_hypervisors(
    path: &Path,
    runtime: Arc<dyn HostRuntime>,
) -> Result<HypervisorList, ConfigError> {
    let content = read_optional(path)?;
    let manifests =
        decode_hypervisor_stream(&content).map_err(|e| ConfigError::Manifest(path.into(), e))?;
    Ok(HypervisorList::from_manifests(&manifests, runtime)?)
}

/// Load the persisted nodes, resolving their hypervisors in the pool.
/// A missing file is an empty list.
pub fn load_nodes(path: &Path, hypervisors: &HypervisorList) -> Result<NodeList, ConfigError> {
    let content = read_optional(path)?;
    let manifests =
        decode_node_stream(&content).map_err(|e| ConfigError::Manifest(path.into(), e))?;
    Ok(NodeList::from_manifests(&manifests, hypervisors))
}

fn read_optional(path: &Path) -> Result<String, ConfigError> {
    if !path.exists() {
        debug!("{} does not exist", path.display());
        return Ok(String::new());
    }
    std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.into(), e))
}
