//! Node resource - a control-plane node bound to a hypervisor
//!
//! A Node:
//! - Belongs to exactly one cluster
//! - Is placed on a hypervisor, either sampled from a pool or restored from
//!   its persisted manifest
//! - Reconciles the API server, controller manager and scheduler on that
//!   hypervisor, in that order, stopping at the first failure
//! - Exports itself back to its versioned manifest

pub mod component;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

pub use component::{Component, ComponentError, ComponentType};

use crate::infra::{Hypervisor, HypervisorList, InfraError};
use crate::versioned::{Encoding, ManifestEncoder, NodeManifest, VersionedError, DOCUMENT_SEPARATOR};

/// Errors that can occur while handling a node
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("node {0:?} is missing an hypervisor")]
    MissingHypervisor(String),

    #[error("unknown component: {0}")]
    UnknownComponent(String),

    #[error(transparent)]
    Component(#[from] ComponentError),

    #[error("could not encode node {node:?}: {source}")]
    EncodingFailed {
        node: String,
        #[source]
        source: VersionedError,
    },

    #[error("node {node:?} expects hypervisor {expected:?}, got {actual:?}")]
    HypervisorMismatch {
        node: String,
        expected: String,
        actual: String,
    },
}

/// A control-plane node
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    hypervisor_name: String,
    cluster_name: String,
    hypervisor: Option<Arc<Hypervisor>>,
}

impl Node {
    /// Create a node placed on a hypervisor sampled from the pool
    pub fn with_random_hypervisor(
        name: impl Into<String>,
        cluster_name: impl Into<String>,
        hypervisors: &HypervisorList,
    ) -> Result<Self, InfraError> {
        let hypervisor = hypervisors.sample()?;
        Ok(Self::bound(name, cluster_name, hypervisor))
    }

    /// Create a node placed on the given hypervisor
    pub fn bound(
        name: impl Into<String>,
        cluster_name: impl Into<String>,
        hypervisor: Arc<Hypervisor>,
    ) -> Self {
        Self {
            name: name.into(),
            hypervisor_name: hypervisor.name().to_string(),
            cluster_name: cluster_name.into(),
            hypervisor: Some(hypervisor),
        }
    }

    /// Restore a node from its manifest without resolving the hypervisor.
    /// The node cannot be reconciled until it is restored with one.
    pub fn from_manifest(manifest: &NodeManifest) -> Self {
        Self {
            name: manifest.metadata.name.clone(),
            hypervisor_name: manifest.spec.hypervisor.clone(),
            cluster_name: manifest.spec.cluster.clone(),
            hypervisor: None,
        }
    }

    /// Restore a node from its manifest, bound to its hypervisor
    pub fn from_manifest_with_hypervisor(
        manifest: &NodeManifest,
        hypervisor: Arc<Hypervisor>,
    ) -> Result<Self, NodeError> {
        if hypervisor.name() != manifest.spec.hypervisor {
            return Err(NodeError::HypervisorMismatch {
                node: manifest.metadata.name.clone(),
                expected: manifest.spec.hypervisor.clone(),
                actual: hypervisor.name().to_string(),
            });
        }
        let mut node = Self::from_manifest(manifest);
        node.hypervisor = Some(hypervisor);
        Ok(node)
    }

    /// Restore a node from its manifest, resolving the hypervisor in the pool
    /// when it is there
    pub fn from_manifest_in(manifest: &NodeManifest, hypervisors: &HypervisorList) -> Self {
        match hypervisors.get(&manifest.spec.hypervisor) {
            Some(hypervisor) => {
                let mut node = Self::from_manifest(manifest);
                node.hypervisor = Some(hypervisor);
                node
            }
            None => {
                warn!(
                    "Hypervisor {} of node {} is not in the pool",
                    manifest.spec.hypervisor, manifest.metadata.name
                );
                Self::from_manifest(manifest)
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hypervisor_name(&self) -> &str {
        &self.hypervisor_name
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// Bound hypervisor, if resolved
    pub fn hypervisor(&self) -> Option<&Arc<Hypervisor>> {
        self.hypervisor.as_ref()
    }

    /// Check if the node can be reconciled
    pub fn is_ready(&self) -> bool {
        self.hypervisor.is_some()
    }

    /// Build the component of the given type for this node
    pub fn component(&self, component_type: ComponentType) -> Component {
        Component::new(component_type, &self.name, &self.cluster_name)
    }

    /// Build a component by its name (e.g. "kube-scheduler")
    pub fn component_named(&self, name: &str) -> Result<Component, NodeError> {
        let component_type: ComponentType = name.parse()?;
        Ok(self.component(component_type))
    }

    /// Reconcile every component on the bound hypervisor
    ///
    /// Components run in [`ComponentType::ALL`] order. The first failing
    /// component aborts the reconciliation and its error is returned as is;
    /// components reconciled before it are left in place.
    pub fn reconcile(&self) -> Result<(), NodeError> {
        let hypervisor = self
            .hypervisor
            .as_ref()
            .ok_or_else(|| NodeError::MissingHypervisor(self.name.clone()))?;

        for component_type in ComponentType::ALL {
            let component = self.component(component_type);
            component.reconcile(hypervisor)?;
            debug!("Node {}: {} reconciled", self.name, component_type);
        }

        info!("Node {} reconciled on {}", self.name, hypervisor.name());
        Ok(())
    }

    /// Export the node to its versioned manifest
    pub fn export(&self) -> NodeManifest {
        NodeManifest::new(&self.name, &self.hypervisor_name, &self.cluster_name)
    }

    /// Versioned YAML document of this node
    pub fn specs(&self) -> Result<String, NodeError> {
        self.specs_with(&Encoding::Yaml)
    }

    /// Versioned document of this node using the given encoder
    pub fn specs_with(&self, encoder: &dyn ManifestEncoder) -> Result<String, NodeError> {
        encoder
            .encode(&self.export())
            .map_err(|source| NodeError::EncodingFailed {
                node: self.name.clone(),
                source,
            })
    }
}

/// An ordered list of nodes
#[derive(Debug, Clone, Default)]
pub struct NodeList(Vec<Node>);

impl NodeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: Node) {
        self.0.push(node);
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.0.iter().find(|n| n.name() == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Restore every manifest, resolving hypervisors in the pool
    pub fn from_manifests(manifests: &[NodeManifest], hypervisors: &HypervisorList) -> Self {
        manifests
            .iter()
            .map(|m| Node::from_manifest_in(m, hypervisors))
            .collect()
    }

    /// Export every node
    pub fn export(&self) -> Vec<NodeManifest> {
        self.0.iter().map(Node::export).collect()
    }

    /// Versioned YAML stream of every node
    pub fn specs(&self) -> Result<String, NodeError> {
        self.specs_with(&Encoding::Yaml)
    }

    /// Versioned stream of every node using the given encoder
    ///
    /// Each document is preceded by `---`. A node that fails to encode is
    /// left out of the stream and does not fail the call.
    pub fn specs_with(&self, encoder: &dyn ManifestEncoder) -> Result<String, NodeError> {
        let mut res = String::new();
        for node in &self.0 {
            match node.specs_with(encoder) {
                Ok(spec) => {
                    res.push_str(DOCUMENT_SEPARATOR);
                    res.push_str(&spec);
                }
                Err(e) => warn!("Skipping node {} in specs: {}", node.name(), e),
            }
        }
        Ok(res)
    }
}

impl From<Vec<Node>> for NodeList {
    fn from(nodes: Vec<Node>) -> Self {
        Self(nodes)
    }
}

impl FromIterator<Node> for NodeList {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a NodeList {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::runtime::{ContainerSpec, DryRunRuntime, HostRuntime, RuntimeError};
    use crate::versioned::{decode_node, Role};

    /// Records every container it is asked for and fails the ones listed
    #[derive(Debug, Default)]
    struct RecordingRuntime {
        calls: Mutex<Vec<String>>,
        failing: Vec<String>,
    }

    impl RecordingRuntime {
        fn failing_on(component: ComponentType) -> Self {
            Self {
                calls: Mutex::new(vec![]),
                failing: vec![component.as_str().to_string()],
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl HostRuntime for RecordingRuntime {
        fn ensure_container(
            &self,
            _endpoint: Option<&str>,
            container: &ContainerSpec,
        ) -> Result<(), RuntimeError> {
            let component = container.labels["cpnode.dev/component"].clone();
            self.calls.lock().unwrap().push(component.clone());
            if self.failing.contains(&component) {
                return Err(RuntimeError::CommandFailed {
                    command: format!("start {}", component),
                    stderr: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    fn hypervisor(runtime: Arc<dyn HostRuntime>) -> Arc<Hypervisor> {
        Arc::new(Hypervisor::new("hv-a", "10.0.0.1", runtime))
    }

    #[test]
    fn test_component_for_every_type() {
        let node = Node::from_manifest(&NodeManifest::new("cp-1", "hv-a", "demo"));
        for t in ComponentType::ALL {
            let component = node.component(t);
            assert_eq!(component.component_type(), t);
            assert_eq!(component, node.component(t));
        }
    }

    #[test]
    fn test_component_named_unknown() {
        let node = Node::from_manifest(&NodeManifest::new("cp-1", "hv-a", "demo"));
        assert!(node.component_named("kube-scheduler").is_ok());
        assert_eq!(
            node.component_named("etcd").unwrap_err(),
            NodeError::UnknownComponent("etcd".to_string())
        );
    }

    #[test]
    fn test_reconcile_without_hypervisor() {
        let node = Node::from_manifest(&NodeManifest::new("cp-1", "hv-a", "demo"));
        assert!(!node.is_ready());
        assert_eq!(
            node.reconcile().unwrap_err(),
            NodeError::MissingHypervisor("cp-1".to_string())
        );
    }

    #[test]
    fn test_reconcile_order() {
        let runtime = Arc::new(RecordingRuntime::default());
        let node = Node::bound("cp-1", "demo", hypervisor(runtime.clone()));

        node.reconcile().unwrap();
        assert_eq!(
            runtime.calls(),
            vec!["kube-apiserver", "kube-controller-manager", "kube-scheduler"]
        );
    }

    #[test]
    fn test_reconcile_stops_at_first_failure() {
        let runtime = Arc::new(RecordingRuntime::failing_on(
            ComponentType::KubeControllerManager,
        ));
        let node = Node::bound("cp-1", "demo", hypervisor(runtime.clone()));

        let err = node.reconcile().unwrap_err();
        assert_eq!(
            runtime.calls(),
            vec!["kube-apiserver", "kube-controller-manager"]
        );
        match err {
            NodeError::Component(e) => {
                assert_eq!(e.component, ComponentType::KubeControllerManager);
                assert_eq!(e.hypervisor, "hv-a");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_restore_with_mismatched_hypervisor() {
        let manifest = NodeManifest::new("cp-1", "hv-b", "demo");
        let result =
            Node::from_manifest_with_hypervisor(&manifest, hypervisor(Arc::new(DryRunRuntime)));
        assert!(matches!(result, Err(NodeError::HypervisorMismatch { .. })));
    }

    #[test]
    fn test_restore_in_pool() {
        let mut pool = HypervisorList::new();
        pool.add(Hypervisor::new("hv-a", "10.0.0.1", Arc::new(DryRunRuntime)))
            .unwrap();

        let bound = Node::from_manifest_in(&NodeManifest::new("cp-1", "hv-a", "demo"), &pool);
        assert!(bound.is_ready());

        let unbound = Node::from_manifest_in(&NodeManifest::new("cp-2", "hv-z", "demo"), &pool);
        assert!(!unbound.is_ready());
        assert_eq!(unbound.hypervisor_name(), "hv-z");
    }

    #[test]
    fn test_random_hypervisor_binding() {
        let mut pool = HypervisorList::new();
        pool.add(Hypervisor::new("hv-a", "10.0.0.1", Arc::new(DryRunRuntime)))
            .unwrap();
        pool.add(Hypervisor::new("hv-b", "10.0.0.2", Arc::new(DryRunRuntime)))
            .unwrap();

        let node = Node::with_random_hypervisor("cp-1", "demo", &pool).unwrap();
        let bound = node.hypervisor().unwrap();
        assert_eq!(bound.name(), node.hypervisor_name());
        assert!(pool.get(node.hypervisor_name()).is_some());
    }

    #[test]
    fn test_random_hypervisor_empty_pool() {
        let result = Node::with_random_hypervisor("cp-1", "demo", &HypervisorList::new());
        assert!(matches!(result, Err(InfraError::EmptyPool)));
    }

    #[test]
    fn test_export() {
        let node = Node::from_manifest(&NodeManifest::new("cp-1", "hv-a", "demo"));
        let manifest = node.export();

        assert_eq!(manifest.metadata.name, "cp-1");
        assert_eq!(manifest.spec.hypervisor, "hv-a");
        assert_eq!(manifest.spec.cluster, "demo");
        assert_eq!(manifest.spec.role, Role::ControlPlane);
    }

    #[test]
    fn test_specs_document() {
        let node = Node::bound("cp-1", "demo", hypervisor(Arc::new(DryRunRuntime)));
        let yaml = node.specs().unwrap();

        assert_eq!(
            yaml,
            "apiVersion: cluster.cpnode.dev/v1alpha1\n\
             kind: Node\n\
             metadata:\n  name: cp-1\n\
             spec:\n  hypervisor: hv-a\n  cluster: demo\n  role: control-plane\n"
        );
        assert_eq!(decode_node(&yaml).unwrap(), node.export());
    }

    struct FailingEncoder;

    impl ManifestEncoder for FailingEncoder {
        fn encode(&self, _manifest: &NodeManifest) -> Result<String, VersionedError> {
            Err(VersionedError::Encode("scheme not registered".to_string()))
        }
    }

    #[test]
    fn test_specs_encoding_failure() {
        let node = Node::from_manifest(&NodeManifest::new("cp-1", "hv-a", "demo"));
        let err = node.specs_with(&FailingEncoder).unwrap_err();
        assert!(matches!(err, NodeError::EncodingFailed { ref node, .. } if node == "cp-1"));
    }

    #[test]
    fn test_list_specs_empty() {
        assert_eq!(NodeList::new().specs().unwrap(), "");
    }

    #[test]
    fn test_list_specs_all_failing() {
        let list: NodeList = vec![Node::from_manifest(&NodeManifest::new(
            "cp-1", "hv-a", "demo",
        ))]
        .into();
        assert_eq!(list.specs_with(&FailingEncoder).unwrap(), "");
    }
}
