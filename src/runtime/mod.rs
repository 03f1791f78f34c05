//! Host runtimes - how components reach the container engine of a hypervisor
//!
//! A runtime only knows how to make sure a container is running with a given
//! specification. Which containers a node needs, and in which order, is
//! decided by the node and its components.

pub mod docker;

use std::collections::BTreeMap;
use std::fmt;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

pub use docker::DockerRuntime;

/// Label carrying the digest of the specification a container was started from
pub const SPEC_HASH_LABEL: &str = "cpnode.dev/spec-hash";

/// Errors that can occur while driving a host runtime
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Runtime not available: {0}")]
    NotAvailable(String),

    #[error("Command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Invalid container specification: {0}")]
    InvalidSpec(String),
}

/// A container a component wants running on a hypervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container name, unique per hypervisor
    pub name: String,

    /// Image reference
    pub image: String,

    /// Command and arguments
    pub command: Vec<String>,

    /// Labels attached to the container
    pub labels: BTreeMap<String, String>,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            command: vec![],
            labels: BTreeMap::new(),
        }
    }

    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Digest of image, command and labels
    ///
    /// Two specifications with the same digest start identical containers.
    /// The name is not part of it.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.image.as_bytes());
        for part in &self.command {
            hasher.update([0u8]);
            hasher.update(part.as_bytes());
        }
        for (key, value) in &self.labels {
            hasher.update([1u8]);
            hasher.update(key.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.as_bytes());
        }
        let hash = format!("{:x}", hasher.finalize());
        hash[..16].to_string()
    }

    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.name.is_empty() {
            return Err(RuntimeError::InvalidSpec(
                "container name must not be empty".to_string(),
            ));
        }
        if self.image.is_empty() {
            return Err(RuntimeError::InvalidSpec(format!(
                "container {:?} has no image",
                self.name
            )));
        }
        Ok(())
    }
}

/// Container engine reachable through a hypervisor
///
/// Implementations block until the container is running or the attempt
/// failed. `endpoint` is the hypervisor's runtime endpoint, `None` meaning the
/// engine local to this process.
pub trait HostRuntime: Send + Sync + fmt::Debug {
    fn ensure_container(
        &self,
        endpoint: Option<&str>,
        container: &ContainerSpec,
    ) -> Result<(), RuntimeError>;
}

/// Runtime that only logs the containers it would start
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunRuntime;

impl HostRuntime for DryRunRuntime {
    fn ensure_container(
        &self,
        endpoint: Option<&str>,
        container: &ContainerSpec,
    ) -> Result<(), RuntimeError> {
        container.validate()?;
        info!(
            "[dry-run] would ensure container {} ({}) on {}",
            container.name,
            container.image,
            endpoint.unwrap_or("local runtime")
        );
        Ok(())
    }
}

/// Runtime selected on the command line or in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeKind {
    #[default]
    Docker,
    DryRun,
}

impl RuntimeKind {
    pub fn build(self) -> std::sync::Arc<dyn HostRuntime> {
        match self {
            RuntimeKind::Docker => std::sync::Arc::new(DockerRuntime::new()),
            RuntimeKind::DryRun => std::sync::Arc::new(DryRunRuntime),
        }
    }
}

impl std::str::FromStr for RuntimeKind {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "docker" => Ok(RuntimeKind::Docker),
            "dry-run" => Ok(RuntimeKind::DryRun),
            other => Err(RuntimeError::NotAvailable(format!(
                "unknown runtime {:?}",
                other
            ))),
        }
    }
}
