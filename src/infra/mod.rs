//! Hypervisors - execution hosts that run control-plane components
//!
//! The pool owns its hypervisors; nodes only keep a shared handle to the one
//! they are bound to.

use std::fmt;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::runtime::{ContainerSpec, HostRuntime, RuntimeError};
use crate::versioned::HypervisorManifest;

/// Errors raised by the hypervisor pool
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InfraError {
    #[error("Hypervisor pool is empty")]
    EmptyPool,

    #[error("Hypervisor '{0}' not found")]
    HypervisorNotFound(String),

    #[error("Hypervisor '{0}' defined more than once")]
    DuplicateHypervisor(String),
}

/// An execution host with a container runtime
pub struct Hypervisor {
    name: String,
    ip_address: String,
    public: bool,
    endpoint: Option<String>,
    runtime: Arc<dyn HostRuntime>,
}

impl Hypervisor {
    pub fn new(
        name: impl Into<String>,
        ip_address: impl Into<String>,
        runtime: Arc<dyn HostRuntime>,
    ) -> Self {
        Self {
            name: name.into(),
            ip_address: ip_address.into(),
            public: false,
            endpoint: None,
            runtime,
        }
    }

    /// Build a hypervisor from its versioned manifest
    pub fn from_manifest(manifest: &HypervisorManifest, runtime: Arc<dyn HostRuntime>) -> Self {
        Self {
            name: manifest.metadata.name.clone(),
            ip_address: manifest.spec.ip_address.clone(),
            public: manifest.spec.public,
            endpoint: manifest.spec.endpoint.clone(),
            runtime,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ip_address(&self) -> &str {
        &self.ip_address
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Make sure a container is running on this hypervisor
    pub fn ensure_container(&self, container: &ContainerSpec) -> Result<(), RuntimeError> {
        self.runtime
            .ensure_container(self.endpoint.as_deref(), container)
    }

    pub fn export(&self) -> HypervisorManifest {
        let mut manifest = HypervisorManifest::new(&self.name, &self.ip_address);
        manifest.spec.public = self.public;
        manifest.spec.endpoint = self.endpoint.clone();
        manifest
    }
}

impl fmt::Debug for Hypervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hypervisor")
            .field("name", &self.name)
            .field("ip_address", &self.ip_address)
            .field("public", &self.public)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Ordered pool of hypervisors available for placement
#[derive(Debug, Clone, Default)]
pub struct HypervisorList {
    hypervisors: Vec<Arc<Hypervisor>>,
}

impl HypervisorList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from versioned manifests, sharing one runtime
    pub fn from_manifests(
        manifests: &[HypervisorManifest],
        runtime: Arc<dyn HostRuntime>,
    ) -> Result<Self, InfraError> {
        let mut list = Self::new();
        for manifest in manifests {
            list.add(Hypervisor::from_manifest(manifest, runtime.clone()))?;
        }
        Ok(list)
    }

    /// Add a hypervisor; names are unique within a pool
    pub fn add(&mut self, hypervisor: Hypervisor) -> Result<Arc<Hypervisor>, InfraError> {
        if self.get(hypervisor.name()).is_some() {
            return Err(InfraError::DuplicateHypervisor(hypervisor.name().to_string()));
        }
        let hypervisor = Arc::new(hypervisor);
        self.hypervisors.push(hypervisor.clone());
        Ok(hypervisor)
    }

    /// Look a hypervisor up by name
    pub fn get(&self, name: &str) -> Option<Arc<Hypervisor>> {
        self.hypervisors.iter().find(|h| h.name() == name).cloned()
    }

    /// Look a hypervisor up by name, failing if it is not in the pool
    pub fn require(&self, name: &str) -> Result<Arc<Hypervisor>, InfraError> {
        self.get(name)
            .ok_or_else(|| InfraError::HypervisorNotFound(name.to_string()))
    }

    /// Pick a hypervisor uniformly at random
    pub fn sample(&self) -> Result<Arc<Hypervisor>, InfraError> {
        self.sample_with(&mut rand::thread_rng())
    }

    /// Pick a hypervisor uniformly at random using the given generator
    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Arc<Hypervisor>, InfraError> {
        self.hypervisors
            .choose(rng)
            .cloned()
            .ok_or(InfraError::EmptyPool)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Hypervisor>> {
        self.hypervisors.iter()
    }

    pub fn len(&self) -> usize {
        self.hypervisors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hypervisors.is_empty()
    }
}
