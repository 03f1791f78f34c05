use serde::{Deserialize, Serialize};

use super::{check_type_meta, ObjectMeta, VersionedError};

/// API version of infrastructure resources
pub const INFRA_API_VERSION: &str = "infra.cpnode.dev/v1alpha1";

const HYPERVISOR_KIND: &str = "Hypervisor";

/// Versioned representation of a hypervisor in the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HypervisorManifest {
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    pub kind: String,

    pub metadata: ObjectMeta,

    pub spec: HypervisorSpec,
}

/// Hypervisor specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HypervisorSpec {
    /// Address where the hypervisor can be reached
    #[serde(rename = "ipAddress")]
    pub ip_address: String,

    /// Whether the hypervisor is reachable from outside the private network
    #[serde(default)]
    pub public: bool,

    /// Container runtime endpoint (e.g. "tcp://10.0.0.1:2375").
    /// The local runtime is used when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl HypervisorManifest {
    pub fn new(name: impl Into<String>, ip_address: impl Into<String>) -> Self {
        Self {
            api_version: INFRA_API_VERSION.to_string(),
            kind: HYPERVISOR_KIND.to_string(),
            metadata: ObjectMeta::named(name),
            spec: HypervisorSpec {
                ip_address: ip_address.into(),
                public: false,
                endpoint: None,
            },
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.spec.endpoint = Some(endpoint.into());
        self
    }

    pub fn public(mut self) -> Self {
        self.spec.public = true;
        self
    }

    /// Encode as a YAML document
    pub fn to_yaml(&self) -> Result<String, VersionedError> {
        serde_yaml::to_string(self).map_err(|e| VersionedError::Encode(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), VersionedError> {
        check_type_meta(
            &self.api_version,
            &self.kind,
            INFRA_API_VERSION,
            HYPERVISOR_KIND,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versioned::decode_hypervisor_stream;

    #[test]
    fn test_decode_hypervisors() {
        let yaml = r#"
apiVersion: infra.cpnode.dev/v1alpha1
kind: Hypervisor
metadata:
  name: hv-a
spec:
  ipAddress: 10.0.0.1
  endpoint: tcp://10.0.0.1:2375
---
apiVersion: infra.cpnode.dev/v1alpha1
kind: Hypervisor
metadata:
  name: hv-b
spec:
  ipAddress: 10.0.0.2
  public: true
"#;
        let manifests = decode_hypervisor_stream(yaml).unwrap();

        assert_eq!(manifests.len(), 2);
        assert_eq!(
            manifests[0],
            HypervisorManifest::new("hv-a", "10.0.0.1").with_endpoint("tcp://10.0.0.1:2375")
        );
        assert_eq!(manifests[1], HypervisorManifest::new("hv-b", "10.0.0.2").public());
    }

    #[test]
    fn test_decode_rejects_node_kind() {
        let yaml = r#"
apiVersion: infra.cpnode.dev/v1alpha1
kind: Node
metadata:
  name: hv-a
spec:
  ipAddress: 10.0.0.1
"#;
        assert!(matches!(
            decode_hypervisor_stream(yaml),
            Err(VersionedError::UnexpectedKind { .. })
        ));
    }
}
