use serde::{Deserialize, Serialize};

use super::{check_type_meta, ObjectMeta, VersionedError};

/// API version of cluster resources
pub const CLUSTER_API_VERSION: &str = "cluster.cpnode.dev/v1alpha1";

const NODE_KIND: &str = "Node";

/// Versioned representation of a control-plane node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeManifest {
    /// API version
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Kind is always "Node"
    pub kind: String,

    /// Metadata about the node
    pub metadata: ObjectMeta,

    /// Desired placement and role
    pub spec: NodeSpec,
}

/// Node specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Name of the hypervisor running this node's components
    pub hypervisor: String,

    /// Name of the cluster this node belongs to
    pub cluster: String,

    /// Role of the node within its cluster
    pub role: Role,
}

/// Role of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Runs the API server, controller manager and scheduler
    #[default]
    ControlPlane,
}

impl NodeManifest {
    /// Create a control-plane node manifest
    pub fn new(
        name: impl Into<String>,
        hypervisor: impl Into<String>,
        cluster: impl Into<String>,
    ) -> Self {
        Self {
            api_version: CLUSTER_API_VERSION.to_string(),
            kind: NODE_KIND.to_string(),
            metadata: ObjectMeta::named(name),
            spec: NodeSpec {
                hypervisor: hypervisor.into(),
                cluster: cluster.into(),
                role: Role::ControlPlane,
            },
        }
    }

    /// Check the type metadata of a decoded manifest
    pub fn validate(&self) -> Result<(), VersionedError> {
        check_type_meta(&self.api_version, &self.kind, CLUSTER_API_VERSION, NODE_KIND)
    }
}
