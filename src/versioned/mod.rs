//! Versioned manifests - the persisted/transported form of cluster resources
//!
//! Documents follow the Kubernetes shape (`apiVersion`, `kind`, `metadata`,
//! `spec`). A list of resources is written as a YAML stream where every
//! document is preceded by a `---` line.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod hypervisor;
mod node;

pub use hypervisor::{HypervisorManifest, HypervisorSpec, INFRA_API_VERSION};
pub use node::{NodeManifest, NodeSpec, Role, CLUSTER_API_VERSION};

/// Separator written before every document of a stream
pub const DOCUMENT_SEPARATOR: &str = "---\n";

/// Errors raised while encoding or decoding manifests
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionedError {
    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Decoding failed: {0}")]
    Decode(String),

    #[error("Unsupported apiVersion {found:?}, expected {expected:?}")]
    UnsupportedApiVersion { found: String, expected: String },

    #[error("Unexpected kind {found:?}, expected {expected:?}")]
    UnexpectedKind { found: String, expected: String },
}

/// Object metadata shared by every manifest kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Resource name
    pub name: String,
}

impl ObjectMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Turns a node manifest into its textual document
pub trait ManifestEncoder {
    fn encode(&self, manifest: &NodeManifest) -> Result<String, VersionedError>;
}

/// Built-in textual encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Yaml,
    Json,
}

impl ManifestEncoder for Encoding {
    fn encode(&self, manifest: &NodeManifest) -> Result<String, VersionedError> {
        match self {
            Encoding::Yaml => {
                serde_yaml::to_string(manifest).map_err(|e| VersionedError::Encode(e.to_string()))
            }
            Encoding::Json => serde_json::to_string_pretty(manifest)
                .map(|mut json| {
                    json.push('\n');
                    json
                })
                .map_err(|e| VersionedError::Encode(e.to_string())),
        }
    }
}

impl std::str::FromStr for Encoding {
    type Err = VersionedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yaml" | "yml" => Ok(Encoding::Yaml),
            "json" => Ok(Encoding::Json),
            other => Err(VersionedError::Encode(format!(
                "unknown output format {:?}",
                other
            ))),
        }
    }
}

// ============================================================================
// SBIO: Pure decoding helpers
// ============================================================================

/// Decode a single node document, checking its apiVersion and kind
pub fn decode_node(content: &str) -> Result<NodeManifest, VersionedError> {
    let manifest: NodeManifest =
        serde_yaml::from_str(content).map_err(|e| VersionedError::Decode(e.to_string()))?;
    manifest.validate()?;
    Ok(manifest)
}

/// Decode every document of a YAML stream, skipping empty documents
pub fn decode_stream<T: DeserializeOwned>(content: &str) -> Result<Vec<T>, VersionedError> {
    let mut items = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|e| VersionedError::Decode(e.to_string()))?;
        if value.is_null() {
            continue;
        }
        let item = serde_yaml::from_value(value).map_err(|e| VersionedError::Decode(e.to_string()))?;
        items.push(item);
    }
    Ok(items)
}

/// Decode a stream of node documents
pub fn decode_node_stream(content: &str) -> Result<Vec<NodeManifest>, VersionedError> {
    let manifests: Vec<NodeManifest> = decode_stream(content)?;
    for manifest in &manifests {
        manifest.validate()?;
    }
    Ok(manifests)
}

/// Decode a stream of hypervisor documents
pub fn decode_hypervisor_stream(content: &str) -> Result<Vec<HypervisorManifest>, VersionedError> {
    let manifests: Vec<HypervisorManifest> = decode_stream(content)?;
    for manifest in &manifests {
        manifest.validate()?;
    }
    Ok(manifests)
}

pub(crate) fn check_type_meta(
    api_version: &str,
    kind: &str,
    expected_api_version: &str,
    expected_kind: &str,
) -> Result<(), VersionedError> {
    if api_version != expected_api_version {
        return Err(VersionedError::UnsupportedApiVersion {
            found: api_version.to_string(),
            expected: expected_api_version.to_string(),
        });
    }
    if kind != expected_kind {
        return Err(VersionedError::UnexpectedKind {
            found: kind.to_string(),
            expected: expected_kind.to_string(),
        });
    }
    Ok(())
}
