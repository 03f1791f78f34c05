//! Control-plane components and their fixed reconciliation order

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use super::NodeError;
use crate::infra::Hypervisor;
use crate::runtime::{ContainerSpec, RuntimeError};

/// Kubernetes version of every control-plane image
pub const KUBERNETES_VERSION: &str = "v1.18.0";

const IMAGE_REGISTRY: &str = "k8s.gcr.io";

/// Port the API server listens on
pub const API_SERVER_PORT: u16 = 6443;

/// Types of control-plane components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    KubeApiServer = 0,
    KubeControllerManager = 1,
    KubeScheduler = 2,
}

impl ComponentType {
    /// Every component in reconciliation order. The controller manager and
    /// the scheduler need a reachable API server.
    pub const ALL: [ComponentType; 3] = [
        ComponentType::KubeApiServer,
        ComponentType::KubeControllerManager,
        ComponentType::KubeScheduler,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::KubeApiServer => "kube-apiserver",
            ComponentType::KubeControllerManager => "kube-controller-manager",
            ComponentType::KubeScheduler => "kube-scheduler",
        }
    }

    /// Image reference for this component
    pub fn image(&self) -> String {
        format!("{}/{}:{}", IMAGE_REGISTRY, self.as_str(), KUBERNETES_VERSION)
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentType {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| NodeError::UnknownComponent(s.to_string()))
    }
}

impl TryFrom<u8> for ComponentType {
    type Error = NodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ComponentType::ALL
            .into_iter()
            .find(|t| *t as u8 == value)
            .ok_or_else(|| NodeError::UnknownComponent(value.to_string()))
    }
}

/// Failure of a single component while reconciling on a hypervisor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{component} failed on hypervisor '{hypervisor}': {source}")]
pub struct ComponentError {
    pub component: ComponentType,
    pub hypervisor: String,
    #[source]
    pub source: RuntimeError,
}

/// A control-plane component of one node
///
/// Components carry no state of their own; a node builds a fresh one every
/// time it needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    component_type: ComponentType,
    node: String,
    cluster: String,
}

impl Component {
    pub(crate) fn new(
        component_type: ComponentType,
        node: impl Into<String>,
        cluster: impl Into<String>,
    ) -> Self {
        Self {
            component_type,
            node: node.into(),
            cluster: cluster.into(),
        }
    }

    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    /// Name of this component's container, unique per hypervisor
    ///
    /// Cluster and node names may contain `-`, so the readable prefix alone
    /// is ambiguous. The short digest of the (cluster, node) pair is not.
    pub fn container_name(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.cluster,
            self.node,
            owner_digest(&self.cluster, &self.node),
            self.component_type
        )
    }

    /// Container this component needs on the given hypervisor
    pub fn container(&self, hypervisor: &Hypervisor) -> ContainerSpec {
        let command: Vec<String> = match self.component_type {
            ComponentType::KubeApiServer => vec![
                "kube-apiserver".to_string(),
                format!("--advertise-address={}", hypervisor.ip_address()),
                format!("--secure-port={}", API_SERVER_PORT),
                "--insecure-port=0".to_string(),
                "--authorization-mode=Node,RBAC".to_string(),
            ],
            ComponentType::KubeControllerManager => vec![
                "kube-controller-manager".to_string(),
                "--kubeconfig=/etc/kubernetes/controller-manager.conf".to_string(),
                "--leader-elect=true".to_string(),
                "--use-service-account-credentials=true".to_string(),
            ],
            ComponentType::KubeScheduler => vec![
                "kube-scheduler".to_string(),
                "--kubeconfig=/etc/kubernetes/scheduler.conf".to_string(),
                "--leader-elect=true".to_string(),
            ],
        };

        ContainerSpec::new(self.container_name(), self.component_type.image())
            .with_command(command)
            .with_label("cpnode.dev/cluster", &self.cluster)
            .with_label("cpnode.dev/node", &self.node)
            .with_label("cpnode.dev/component", self.component_type.as_str())
    }

    /// Drive this component toward its desired state on the hypervisor
    pub fn reconcile(&self, hypervisor: &Hypervisor) -> Result<(), ComponentError> {
        debug!(
            "Reconciling {} of node {} on {}",
            self.component_type,
            self.node,
            hypervisor.name()
        );
        hypervisor
            .ensure_container(&self.container(hypervisor))
            .map_err(|source| ComponentError {
                component: self.component_type,
                hypervisor: hypervisor.name().to_string(),
                source,
            })
    }
}

fn owner_digest(cluster: &str, node: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(cluster.as_bytes());
    hasher.update([0u8]);
    hasher.update(node.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    hash[..8].to_string()
}
