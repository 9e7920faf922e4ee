//! Mesh identity and provider variants.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a declarative object: `(name, namespace)`.
///
/// Used as the key for every topology map so that entities fetched by
/// independent list calls compare equal by identity, never by address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Object name.
    pub name: String,
    /// Object namespace.
    pub namespace: String,
}

impl ObjectRef {
    /// Creates a new object reference.
    #[must_use]
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// One mesh control-plane instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mesh {
    /// Identity of the mesh object.
    pub metadata: ObjectRef,
    /// Provider type and provider-specific configuration.
    pub mesh_type: MeshType,
}

/// The provider behind a mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MeshType {
    /// AWS App Mesh.
    AppMesh(AppMeshSpec),
    /// Istio.
    Istio,
    /// Linkerd.
    Linkerd,
    /// Consul Connect.
    ConsulConnect,
    /// Any provider this build does not recognize.
    #[serde(other)]
    Unsupported,
}

/// App Mesh specific configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMeshSpec {
    /// Name of the mesh in App Mesh.
    pub name: String,
    /// AWS account owning the mesh.
    pub aws_account_id: String,
    /// AWS region hosting the mesh.
    pub region: String,
}

impl Mesh {
    /// Returns the App Mesh configuration if this is an App Mesh mesh.
    #[must_use]
    pub const fn app_mesh(&self) -> Option<&AppMeshSpec> {
        match &self.mesh_type {
            MeshType::AppMesh(spec) => Some(spec),
            _ => None,
        }
    }
}

impl fmt::Display for MeshType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::AppMesh(_) => "appmesh",
            Self::Istio => "istio",
            Self::Linkerd => "linkerd",
            Self::ConsulConnect => "consul-connect",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{kind}")
    }
}
